//! Stage selection and execution mode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use edaflow_core::ToolOptions;

use super::{PipelineError, ToolFamily};
use crate::supervisor::SupervisorPolicy;

/// How the stages of one family are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// All stage bodies in one tool process, gated by the final checkpoint.
    Fused,
    /// One process per stage, each loading its predecessor's checkpoint.
    Incremental,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fused => "fused",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = PipelineError;

    /// `fast` and `normal` are accepted as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fused" | "fast" => Ok(Self::Fused),
            "incremental" | "normal" => Ok(Self::Incremental),
            other => Err(PipelineError::UnknownMode(other.to_string())),
        }
    }
}

/// Validated stage list, mode and deadlines for one invocation.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub family: ToolFamily,
    pub stages: Vec<String>,
    pub mode: ExecutionMode,
    timeouts: BTreeMap<String, Duration>,
    fused_timeout: Duration,
    pub poll_interval: Duration,
}

impl StageConfig {
    /// Validate `options` for `family`.
    ///
    /// Stages default to the whole family and the mode to incremental. Any
    /// stage the family does not know, and any unrecognized mode, is
    /// rejected here, before anything runs.
    pub fn from_options(family: ToolFamily, options: &ToolOptions) -> Result<Self, PipelineError> {
        let stages: Vec<String> = match &options.steps {
            Some(steps) => steps.clone(),
            None => family.stages().iter().map(|s| (*s).to_string()).collect(),
        };
        if let Some(unknown) = stages.iter().find(|s| !family.is_valid_stage(s)) {
            return Err(PipelineError::UnknownStage {
                family,
                stage: unknown.clone(),
            });
        }

        let mode = options
            .runmode
            .as_deref()
            .map_or(Ok(ExecutionMode::Incremental), str::parse)?;

        let timeouts = stages
            .iter()
            .map(|stage| {
                let timeout = options.timeouts.get(stage).map_or_else(
                    || family.default_stage_timeout(stage),
                    |secs| Duration::from_secs(*secs),
                );
                (stage.clone(), timeout)
            })
            .collect();
        let fused_timeout = options.timeouts.get("fused").map_or_else(
            || family.default_fused_timeout(),
            |secs| Duration::from_secs(*secs),
        );
        let poll_interval = options.poll_interval_ms.map_or(
            SupervisorPolicy::DEFAULT_POLL_INTERVAL,
            Duration::from_millis,
        );

        Ok(Self {
            family,
            stages,
            mode,
            timeouts,
            fused_timeout,
            poll_interval,
        })
    }

    pub fn timeout(&self, stage: &str) -> Duration {
        self.timeouts
            .get(stage)
            .copied()
            .unwrap_or_else(|| self.family.default_stage_timeout(stage))
    }

    pub const fn fused_timeout(&self) -> Duration {
        self.fused_timeout
    }

    /// Stage run before `stage`, if any.
    pub fn previous(&self, stage: &str) -> Option<&str> {
        let idx = self.stages.iter().position(|s| s == stage)?;
        idx.checked_sub(1).map(|i| self.stages[i].as_str())
    }

    pub fn last(&self) -> Option<&str> {
        self.stages.last().map(String::as_str)
    }
}
