//! Stage interface and the manifest scaffolding around it.

use std::future::Future;

use edaflow_core::manifest::write_manifest;
use edaflow_core::{Manifest, ToolOptions};
use tracing::{debug, info};

use super::PipelineError;

/// A unit that runs external tools and derives an output manifest.
pub trait ToolStep {
    /// Used in logs.
    fn name(&self) -> &str;

    /// Full configuration as received; persisted as the input manifest.
    fn options(&self) -> &ToolOptions;

    fn execute(&mut self) -> impl Future<Output = Result<(), PipelineError>> + Send;

    /// Output consumed by the next stage or tool family.
    fn produce_output(&self) -> Result<Manifest, PipelineError>;
}

/// Persist the input manifest, execute, then persist and return the output.
///
/// Either manifest is skipped when its path is not configured.
pub async fn run_step<S: ToolStep + Send>(step: &mut S) -> Result<Manifest, PipelineError> {
    let options = step.options();
    match &options.input_path {
        Some(path) => write_manifest(options, path)?,
        None => debug!(step = step.name(), "No input manifest path, not persisting"),
    }

    step.execute().await?;

    let output = step.produce_output()?;
    match &step.options().output_path {
        Some(path) => write_manifest(&output, path)?,
        None => debug!(step = step.name(), "No output manifest path, not persisting"),
    }
    info!(step = step.name(), keys = output.len(), "Step finished");
    Ok(output)
}
