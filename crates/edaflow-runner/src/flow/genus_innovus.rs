//! Genus synthesis followed by Innovus place-and-route.

use std::path::{Path, PathBuf};

use edaflow_core::report::summary::{AreaMetric, DesignTotals, design_totals};
use edaflow_core::report::{self, ReportFormat};
use edaflow_core::{FlowConfig, Manifest, ToolOptions};
use serde_json::json;
use tracing::info;

use super::{PpaSummary, finish, manager_defaults, pnr_skipped};
use crate::pipeline::{PipelineError, ScriptSource, ToolFamily, ToolManager, run_step};

/// Report set written by one step.
struct ReportSet {
    format: ReportFormat,
    timing: PathBuf,
    power: PathBuf,
    area: PathBuf,
    metric: AreaMetric,
}

impl ReportSet {
    fn post_syn(rundir: &Path) -> Self {
        let reports = rundir.join("reports");
        Self {
            format: ReportFormat::Genus,
            timing: reports.join("timing.rpt"),
            power: reports.join("power.rpt"),
            area: reports.join("area.rpt"),
            metric: AreaMetric::Cell,
        }
    }

    /// `prefix` is `preCTS` (after placement) or `postRoute`.
    fn innovus(rundir: &Path, prefix: &str) -> Self {
        let reports = rundir.join("reports");
        Self {
            format: ReportFormat::Innovus,
            timing: reports.join(format!("{prefix}_timing")).join("timing.rpt"),
            power: reports.join(format!("{prefix}_power.rpt")),
            area: reports.join(format!("{prefix}_area.rpt")),
            metric: AreaMetric::Total,
        }
    }

    fn collect(&self, top: &str) -> Result<DesignTotals, PipelineError> {
        let timing = report::timing_paths(self.format, &self.timing, Some(1))?;
        let power = report::power_entries(self.format, &self.power)?;
        let area = report::area_entries(self.format, &self.area)?;
        Ok(design_totals(&timing, &power, &area, top, self.metric))
    }
}

pub struct SynthesisPnrFlow {
    config: FlowConfig,
    synthesis_scripts: Option<Box<dyn ScriptSource>>,
    pnr_scripts: Option<Box<dyn ScriptSource>>,
}

impl SynthesisPnrFlow {
    pub const fn new(config: FlowConfig) -> Self {
        Self {
            config,
            synthesis_scripts: None,
            pnr_scripts: None,
        }
    }

    /// Use these stage bodies instead of each family's `script_dir`.
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

    fn family_rundir(&self, family: ToolFamily) -> PathBuf {
        self.config.rundir.join(format!("{family}-rundir"))
    }

    /// Defaults every family starts from, before user layers.
    fn defaults(&self, family: ToolFamily) -> Manifest {
        let mut m = manager_defaults(&self.family_rundir(family), family.manager_name());
        m.insert("steps".into(), json!(family.stages()));
        m.insert("runmode".into(), json!("fast"));
        if family == ToolFamily::Genus {
            m.insert("clk_period_ns".into(), json!(0.0));
        }
        m
    }

    pub fn synthesis_options(&self) -> Result<ToolOptions, PipelineError> {
        let defaults = self.defaults(ToolFamily::Genus);
        Ok(ToolOptions::layered([
            &defaults,
            &self.config.design,
            &self.config.tech,
            &self.config.synthesis,
        ])?)
    }

    pub fn pnr_options(&self, synthesis_output: &Manifest) -> Result<ToolOptions, PipelineError> {
        let defaults = self.defaults(ToolFamily::Innovus);
        Ok(ToolOptions::layered([
            &defaults,
            synthesis_output,
            &self.config.tech,
            &self.config.pnr,
        ])?)
    }

    fn manager(
        family: ToolFamily,
        options: ToolOptions,
        scripts: &mut Option<Box<dyn ScriptSource>>,
    ) -> Result<ToolManager, PipelineError> {
        match scripts.take() {
            Some(source) => ToolManager::with_scripts(family, options, source),
            None => ToolManager::new(family, options),
        }
    }

    /// Run synthesis, then place-and-route unless its runmode is `skip`.
    pub async fn run(&mut self) -> Result<PpaSummary, PipelineError> {
        let top = self
            .config
            .top_module()
            .ok_or(PipelineError::MissingOption("top_module"))?
            .to_string();

        let synthesis_options = self.synthesis_options()?;
        let mut genus = Self::manager(
            ToolFamily::Genus,
            synthesis_options,
            &mut self.synthesis_scripts,
        )?;
        let synthesis_output = run_step(&mut genus).await?;

        let post_syn = ReportSet::post_syn(&self.family_rundir(ToolFamily::Genus)).collect(&top)?;
        let mut summary = PpaSummary {
            post_syn: Some(post_syn),
            ..PpaSummary::default()
        };

        if pnr_skipped(&self.config) {
            info!("Place and route skipped");
        } else {
            let pnr_options = self.pnr_options(&synthesis_output)?;
            let mut innovus =
                Self::manager(ToolFamily::Innovus, pnr_options, &mut self.pnr_scripts)?;
            run_step(&mut innovus).await?;

            let rundir = self.family_rundir(ToolFamily::Innovus);
            summary.post_place = Some(ReportSet::innovus(&rundir, "preCTS").collect(&top)?);
            summary.post_route = Some(ReportSet::innovus(&rundir, "postRoute").collect(&top)?);
        }

        finish(&self.config, summary)
    }
}
