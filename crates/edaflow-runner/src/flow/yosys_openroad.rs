//! Yosys synthesis followed by OpenROAD place-and-route.
//!
//! Only delay and area are reported by this pair; power stays `None` and
//! there is no separate post-placement figure.

use std::path::PathBuf;

use edaflow_core::report::summary::DesignTotals;
use edaflow_core::{FlowConfig, Manifest, ToolOptions};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{PpaSummary, finish, manager_defaults, pnr_skipped};
use crate::openflow::{OpenFamily, OpenToolManager};
use crate::pipeline::{PipelineError, ScriptSource, run_step};

pub struct YosysOpenroadFlow {
    config: FlowConfig,
    synthesis_scripts: Option<Box<dyn ScriptSource>>,
    pnr_scripts: Option<Box<dyn ScriptSource>>,
}

impl YosysOpenroadFlow {
    pub const fn new(config: FlowConfig) -> Self {
        Self {
            config,
            synthesis_scripts: None,
            pnr_scripts: None,
        }
    }

    #[must_use]
    pub fn with_script_sources(
        mut self,
        synthesis: impl ScriptSource + 'static,
        pnr: impl ScriptSource + 'static,
    ) -> Self {
        self.synthesis_scripts = Some(Box::new(synthesis));
        self.pnr_scripts = Some(Box::new(pnr));
        self
    }

    fn family_rundir(&self, family: OpenFamily) -> PathBuf {
        self.config.rundir.join(format!("{family}-rundir"))
    }

    fn defaults(&self, family: OpenFamily) -> Manifest {
        manager_defaults(&self.family_rundir(family), family.manager_name())
    }

    pub fn synthesis_options(&self) -> Result<ToolOptions, PipelineError> {
        let mut defaults = self.defaults(OpenFamily::Yosys);
        defaults.insert("clk_period_ns".into(), json!(0.0));
        Ok(ToolOptions::layered([
            &defaults,
            &self.config.design,
            &self.config.tech,
            &self.config.synthesis,
        ])?)
    }

    /// Design and tech layers apply again here, so the netlist is the only
    /// value taken from synthesis.
    pub fn pnr_options(&self, synthesis_output: &Manifest) -> Result<ToolOptions, PipelineError> {
        let mut defaults = self.defaults(OpenFamily::Openroad);
        defaults.insert("runmode".into(), json!("default"));
        if let Some(netlist) = synthesis_output.get("verilog_file") {
            defaults.insert("verilog_file".into(), netlist.clone());
        }
        Ok(ToolOptions::layered([
            &defaults,
            &self.config.design,
            &self.config.tech,
            &self.config.pnr,
        ])?)
    }

    fn manager(
        family: OpenFamily,
        options: ToolOptions,
        scripts: &mut Option<Box<dyn ScriptSource>>,
    ) -> Result<OpenToolManager, PipelineError> {
        match scripts.take() {
            Some(source) => OpenToolManager::with_scripts(family, options, source),
            None => OpenToolManager::new(family, options),
        }
    }

    /// Run synthesis, then place-and-route unless its runmode is `skip`, then
    /// delete the mapped netlist unless `remove_netlist` is off.
    pub async fn run(&mut self) -> Result<PpaSummary, PipelineError> {
        if self.config.top_module().is_none() {
            return Err(PipelineError::MissingOption("top_module"));
        }

        let synthesis_options = self.synthesis_options()?;
        let mut yosys = Self::manager(
            OpenFamily::Yosys,
            synthesis_options,
            &mut self.synthesis_scripts,
        )?;
        let synthesis_output = run_step(&mut yosys).await?;
        let mut summary = PpaSummary {
            post_syn: Some(totals(&synthesis_output, yosys.family(), "delay", "area")?),
            ..PpaSummary::default()
        };

        if pnr_skipped(&self.config) {
            info!("Place and route skipped");
        } else {
            let pnr_options = self.pnr_options(&synthesis_output)?;
            let mut openroad =
                Self::manager(OpenFamily::Openroad, pnr_options, &mut self.pnr_scripts)?;
            let pnr_output = run_step(&mut openroad).await?;
            summary.post_route = Some(totals(
                &pnr_output,
                openroad.family(),
                "worst_delay",
                "design_area",
            )?);
        }

        if self.config.remove_netlist {
            let netlist = yosys.mapped_netlist();
            std::fs::remove_file(&netlist)?;
            debug!(path = %netlist.display(), "Removed mapped netlist");
        }

        finish(&self.config, summary)
    }
}

fn totals(
    output: &Manifest,
    family: OpenFamily,
    delay_key: &str,
    area_key: &str,
) -> Result<DesignTotals, PipelineError> {
    let metric = |key: &str| {
        output
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| PipelineError::MissingMetric {
                step: family.manager_name().to_string(),
                key: key.to_string(),
            })
    };
    Ok(DesignTotals {
        arrival_time: metric(delay_key)?,
        power: None,
        area: Some(metric(area_key)?),
    })
}
