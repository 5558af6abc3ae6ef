//! Stage Pipeline Controller.
//!
//! Sequences the named stages of one tool family in either fused or
//! incremental mode, delegating every tool process to the
//! [`Supervisor`](crate::supervisor::Supervisor).

mod family;
mod layout;
mod manager;
pub mod scripts;
mod stage;
mod step;

use edaflow_core::report::ReportError;

use crate::supervisor::SupervisionError;

pub use family::ToolFamily;
pub use layout::RunLayout;
pub use manager::ToolManager;
pub use scripts::{InlineScripts, ScriptSource, TemplateDir};
pub use stage::{ExecutionMode, StageConfig};
pub use step::{ToolStep, run_step};

/// Errors from configuring or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage `{stage}` is not implemented for {family}")]
    UnknownStage { family: ToolFamily, stage: String },

    #[error("Run mode `{0}` is not implemented")]
    UnknownMode(String),

    #[error("Missing required option `{0}`")]
    MissingOption(&'static str),

    #[error("{step} output has no numeric `{key}`")]
    MissingMetric { step: String, key: String },

    #[error("Script for stage {stage}: {reason}")]
    Script { stage: String, reason: String },

    #[error(transparent)]
    Supervision(#[from] SupervisionError),

    #[error(transparent)]
    Core(#[from] edaflow_core::Error),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stage or mode the pipeline has no implementation for.
    pub const fn is_unimplemented(&self) -> bool {
        matches!(self, Self::UnknownStage { .. } | Self::UnknownMode(_))
    }

    pub const fn is_supervision(&self) -> bool {
        matches!(self, Self::Supervision(_))
    }
}
