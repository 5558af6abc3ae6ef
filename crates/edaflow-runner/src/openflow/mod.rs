//! Yosys and OpenROAD tool families.
//!
//! Neither tool saves checkpoints between stages, so a family is a fixed
//! list of supervised invocations ("units") run in order. Each unit is
//! skipped when its artifact already exists. Metrics are read from the
//! console log of the family's last unit.

mod manager;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use manager::OpenToolManager;

const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenFamily {
    /// Yosys synthesis, reported through OpenROAD.
    Yosys,
    /// OpenROAD place and route.
    Openroad,
}

impl OpenFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yosys => "yosys",
            Self::Openroad => "openroad",
        }
    }

    pub const fn manager_name(self) -> &'static str {
        match self {
            Self::Yosys => "yosys_manager",
            Self::Openroad => "openroad_manager",
        }
    }

    pub(crate) const fn units(self) -> &'static [Unit] {
        match self {
            Self::Yosys => YOSYS_UNITS,
            Self::Openroad => OPENROAD_UNITS,
        }
    }

    /// Unit names, in execution order.
    pub fn unit_names(self) -> Vec<&'static str> {
        self.units().iter().map(|u| u.name).collect()
    }
}

impl fmt::Display for OpenFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yosys" => Ok(Self::Yosys),
            "openroad" => Ok(Self::Openroad),
            other => Err(format!("unknown tool family `{other}`")),
        }
    }
}

/// Executable a unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Program {
    Yosys,
    Openroad,
}

impl Program {
    pub(crate) const fn binary_key(self) -> &'static str {
        match self {
            Self::Yosys => "yosys_bin",
            Self::Openroad => "openroad_bin",
        }
    }

    pub(crate) const fn default_binary(self) -> &'static str {
        match self {
            Self::Yosys => "yosys",
            Self::Openroad => "openroad",
        }
    }
}

/// What marks a unit as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Artifact {
    /// `data/<top>-mapped.v`.
    MappedNetlist,
    /// The unit's console log.
    Log,
}

/// One supervised tool invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Unit {
    pub name: &'static str,
    pub program: Program,
    /// File name under `scripts/`.
    pub script: &'static str,
    /// File name under `log/`.
    pub log: &'static str,
    pub artifact: Artifact,
    pub default_timeout: Duration,
}

const YOSYS_UNITS: &[Unit] = &[
    Unit {
        name: "syn",
        program: Program::Yosys,
        script: "syn.ys",
        log: "syn.log",
        artifact: Artifact::MappedNetlist,
        default_timeout: HOUR,
    },
    Unit {
        name: "report",
        program: Program::Openroad,
        script: "report.tcl",
        log: "report.log",
        artifact: Artifact::Log,
        default_timeout: HOUR,
    },
];

const OPENROAD_UNITS: &[Unit] = &[Unit {
    name: "pnr",
    program: Program::Openroad,
    script: "pnr.tcl",
    log: "report.log",
    artifact: Artifact::Log,
    default_timeout: Duration::from_secs(10 * 3600),
}];
