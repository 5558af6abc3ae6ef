//! Synthesis followed by place-and-route, with PPA extraction.
//!
//! The synthesis manager's output manifest becomes part of the
//! place-and-route manager's input, and the headline timing, power and area
//! after each major step are collected into a [`PpaSummary`]. Two tool
//! pairs are supported, picked by [`FlowConfig::toolchain`].

mod genus_innovus;
mod yosys_openroad;

use std::path::Path;

use edaflow_core::manifest::write_manifest;
use edaflow_core::report::summary::DesignTotals;
use edaflow_core::{FlowConfig, Manifest, Toolchain};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::pipeline::PipelineError;

pub use genus_innovus::SynthesisPnrFlow;
pub use yosys_openroad::YosysOpenroadFlow;

/// Headline figures after each major step; `None` when the step was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PpaSummary {
    pub post_syn: Option<DesignTotals>,
    pub post_place: Option<DesignTotals>,
    pub post_route: Option<DesignTotals>,
}

/// Run whichever flow `config.toolchain` names, reading scripts from each
/// layer's `script_dir`.
pub async fn run_flow(config: FlowConfig) -> Result<PpaSummary, PipelineError> {
    match config.toolchain {
        Toolchain::GenusInnovus => SynthesisPnrFlow::new(config).run().await,
        Toolchain::YosysOpenroad => YosysOpenroadFlow::new(config).run().await,
    }
}

/// Rundir and manifest paths every manager starts from.
fn manager_defaults(rundir: &Path, manager: &str) -> Manifest {
    let mut m = Manifest::new();
    m.insert("rundir".into(), json!(rundir));
    m.insert(
        "input_path".into(),
        json!(rundir.join(format!("{manager}-input.yml"))),
    );
    m.insert(
        "output_path".into(),
        json!(rundir.join(format!("{manager}-output.yml"))),
    );
    m
}

fn pnr_skipped(config: &FlowConfig) -> bool {
    config.pnr.get("runmode").and_then(Value::as_str) == Some("skip")
}

/// Persist the summary as `<rundir>/ppa.json`.
fn finish(config: &FlowConfig, summary: PpaSummary) -> Result<PpaSummary, PipelineError> {
    let ppa_path = config.rundir.join("ppa.json");
    write_manifest(&summary, &ppa_path)?;
    info!(path = %ppa_path.display(), ?summary, "Flow finished");
    Ok(summary)
}
