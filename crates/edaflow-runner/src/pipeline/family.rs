//! Tool families and their stage tables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const HOUR: Duration = Duration::from_secs(3600);

const GENUS_STAGES: &[&str] = &["syn", "report"];
const INNOVUS_STAGES: &[&str] = &[
    "init",
    "floorplan",
    "powerplan",
    "placement",
    "cts",
    "routing",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    /// Logic synthesis.
    Genus,
    /// Place and route.
    Innovus,
}

impl ToolFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Genus => "genus",
            Self::Innovus => "innovus",
        }
    }

    /// Prefix of the manifest files this family's manager writes.
    pub const fn manager_name(self) -> &'static str {
        match self {
            Self::Genus => "genus_manager",
            Self::Innovus => "innovus_manager",
        }
    }

    /// Every stage the family knows, in execution order.
    pub const fn stages(self) -> &'static [&'static str] {
        match self {
            Self::Genus => GENUS_STAGES,
            Self::Innovus => INNOVUS_STAGES,
        }
    }

    pub fn is_valid_stage(self, stage: &str) -> bool {
        self.stages().contains(&stage)
    }

    /// Executable looked up on `PATH` when no binary is configured.
    pub const fn default_binary(self) -> &'static str {
        self.as_str()
    }

    /// Pass-through key older configurations use for the binary.
    pub const fn legacy_binary_key(self) -> &'static str {
        match self {
            Self::Genus => "genus_bin",
            Self::Innovus => "innovus_bin",
        }
    }

    pub const fn checkpoint_extension(self) -> &'static str {
        match self {
            Self::Genus => "db",
            Self::Innovus => "enc",
        }
    }

    pub fn default_stage_timeout(self, stage: &str) -> Duration {
        match (self, stage) {
            (Self::Genus, "report") => HOUR,
            _ => HOUR * 10,
        }
    }

    pub const fn default_fused_timeout(self) -> Duration {
        match self {
            Self::Genus => Duration::from_secs(10 * 3600),
            Self::Innovus => Duration::from_secs(24 * 3600),
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "genus" => Ok(Self::Genus),
            "innovus" => Ok(Self::Innovus),
            other => Err(format!("unknown tool family `{other}`")),
        }
    }
}
