//! Tool-family manager: the Stage Pipeline Controller for one family.

use std::path::{Path, PathBuf};
use std::time::Duration;

use edaflow_core::{Manifest, ToolOptions};
use serde_json::{Value, json};
use tracing::info;

use super::scripts::{self, ScriptSource, TemplateDir};
use super::{ExecutionMode, PipelineError, RunLayout, StageConfig, ToolFamily, ToolStep};
use crate::checkpoint::CheckpointStore;
use crate::supervisor::{ArtifactExists, Supervisor, SupervisorPolicy, ToolCommand};

/// Runs the configured stages of one tool family, one process at a time.
pub struct ToolManager {
    family: ToolFamily,
    options: ToolOptions,
    config: StageConfig,
    layout: RunLayout,
    checkpoints: CheckpointStore,
    scripts: Box<dyn ScriptSource>,
    binary: PathBuf,
    top_module: String,
    terminate_grace: Duration,
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("family", &self.family)
            .field("config", &self.config)
            .field("rundir", &self.layout.rundir)
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

impl ToolManager {
    /// Manager reading stage bodies from `options.script_dir`.
    pub fn new(family: ToolFamily, options: ToolOptions) -> Result<Self, PipelineError> {
        let dir = options
            .script_dir
            .clone()
            .ok_or(PipelineError::MissingOption("script_dir"))?;
        Self::with_scripts(family, options, TemplateDir::new(dir))
    }

    /// Validate `options` and prepare the run directory.
    ///
    /// Unknown stages, unknown modes and missing required options are all
    /// rejected here, so nothing is spawned for a bad configuration.
    pub fn with_scripts(
        family: ToolFamily,
        options: ToolOptions,
        scripts: impl ScriptSource + 'static,
    ) -> Result<Self, PipelineError> {
        let config = StageConfig::from_options(family, &options)?;
        let rundir = options
            .rundir
            .clone()
            .ok_or(PipelineError::MissingOption("rundir"))?;
        let top_module = options
            .top_module
            .clone()
            .ok_or(PipelineError::MissingOption("top_module"))?;
        let binary = options
            .binary
            .clone()
            .or_else(|| options.extra_str(family.legacy_binary_key()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(family.default_binary()));

        let layout = RunLayout::create(&rundir)?;
        let checkpoints = CheckpointStore::new(&layout.rundir, &layout.data, family);
        Ok(Self {
            family,
            options,
            config,
            layout,
            checkpoints,
            scripts: Box::new(scripts),
            binary,
            top_module,
            terminate_grace: SupervisorPolicy::DEFAULT_TERMINATE_GRACE,
        })
    }

    #[must_use]
    pub const fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    pub const fn family(&self) -> ToolFamily {
        self.family
    }

    pub const fn config(&self) -> &StageConfig {
        &self.config
    }

    pub const fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub const fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Values available to `{{ key }}` placeholders in stage bodies.
    fn render_context(&self) -> Result<Manifest, PipelineError> {
        let mut context = self.options.to_manifest()?;
        let dirs = [
            ("rundir", &self.layout.rundir),
            ("data_dir", &self.layout.data),
            ("log_dir", &self.layout.log),
            ("report_dir", &self.layout.reports),
            ("generated_script_dir", &self.layout.scripts),
        ];
        for (key, dir) in dirs {
            context.insert(key.to_string(), json!(dir.display().to_string()));
        }
        context.insert("top_module".into(), json!(self.top_module));
        Ok(context)
    }

    fn body(&self, stage: &str, context: &Manifest) -> Result<String, PipelineError> {
        let raw = self.scripts.stage_body(self.family.as_str(), stage)?;
        scripts::render(stage, &raw, context)
    }

    fn command(&self, script: &Path, name: &str) -> ToolCommand {
        ToolCommand::new(&self.binary, &self.layout.rundir)
            .args(["-no_gui", "-abort_on_error", "-overwrite", "-file"])
            .arg(script)
            .arg("-log")
            .arg(self.layout.log_prefix(name))
            .envs(&self.options.license_env)
            .log_file(self.layout.console_log(name))
    }

    fn policy(&self, deadline: Duration) -> SupervisorPolicy {
        SupervisorPolicy::new(deadline)
            .with_poll_interval(self.config.poll_interval)
            .with_terminate_grace(self.terminate_grace)
    }

    /// Render every configured stage body. Runs before anything is spawned
    /// so a bad template fails the whole invocation up front.
    fn bodies(&self) -> Result<Vec<(String, String)>, PipelineError> {
        let context = self.render_context()?;
        self.config
            .stages
            .iter()
            .map(|stage| self.body(stage, &context).map(|body| (stage.clone(), body)))
            .collect()
    }

    /// Each stage is skipped when its own checkpoint exists. Rerunning an
    /// earlier stage does not invalidate checkpoints of later ones.
    async fn run_incremental(&self) -> Result<(), PipelineError> {
        let bodies = self.bodies()?;
        if let Some(stage) = self.checkpoints.last_completed(&self.config.stages) {
            info!(family = %self.family, resume_after = stage, "Resuming from checkpoint");
        }

        for (stage, body) in &bodies {
            let previous = self.config.previous(stage);
            let script = scripts::stage_script(&self.checkpoints, previous, stage, body);
            let script_path = self.layout.script(stage);
            std::fs::write(&script_path, script)?;

            let command = self.command(&script_path, stage);
            let check = ArtifactExists(self.checkpoints.path(stage));
            Supervisor::new(stage.as_str(), self.policy(self.config.timeout(stage)))
                .run(&command, &check)
                .await?;
        }
        Ok(())
    }

    async fn run_fused(&self) -> Result<(), PipelineError> {
        let Some(last) = self.config.last() else {
            return Ok(());
        };
        let bodies = self.bodies()?;

        let script_path = self.layout.script("fused");
        std::fs::write(&script_path, scripts::fused_script(&self.checkpoints, &bodies))?;

        let command = self.command(&script_path, "fused");
        let check = ArtifactExists(self.checkpoints.path(last));
        Supervisor::new("fused", self.policy(self.config.fused_timeout()))
            .run(&command, &check)
            .await?;
        Ok(())
    }

    fn genus_output(&self) -> Manifest {
        let mut out = Manifest::new();
        let data = &self.layout.data;
        let path = |p: PathBuf| json!(p.display().to_string());
        out.insert(
            "verilog_file".into(),
            path(data.join(format!("{}-mapped.v", self.top_module))),
        );
        out.insert("top_module".into(), json!(self.top_module));
        out.insert("setup_sdc_file".into(), path(data.join("constraint_setup.sdc")));
        out.insert("hold_sdc_file".into(), path(data.join("constraint_hold.sdc")));
        out.insert("report_dir".into(), path(self.layout.reports.clone()));
        for key in [
            "setup_lib_files",
            "hold_lib_files",
            "lef_files",
            "qrc_techfiles",
        ] {
            out.insert(
                key.into(),
                self.options.extra.get(key).cloned().unwrap_or(Value::Null),
            );
        }
        for key in ["cts_inv_cells", "path_groups"] {
            out.insert(
                key.into(),
                self.options.extra.get(key).cloned().unwrap_or_else(|| json!([])),
            );
        }
        out
    }

    fn innovus_output(&self) -> Manifest {
        let mut out = Manifest::new();
        let path = |p: PathBuf| json!(p.display().to_string());
        out.insert("top_module".into(), json!(self.top_module));
        if let Some(last) = self.config.last() {
            out.insert("checkpoint".into(), path(self.checkpoints.path(last)));
        }
        out.insert("report_dir".into(), path(self.layout.reports.clone()));
        out
    }
}

impl ToolStep for ToolManager {
    fn name(&self) -> &str {
        self.family.manager_name()
    }

    fn options(&self) -> &ToolOptions {
        &self.options
    }

    async fn execute(&mut self) -> Result<(), PipelineError> {
        info!(
            family = %self.family,
            mode = %self.config.mode,
            stages = ?self.config.stages,
            rundir = %self.layout.rundir.display(),
            "Running tool"
        );
        match self.config.mode {
            ExecutionMode::Fused => self.run_fused().await,
            ExecutionMode::Incremental => self.run_incremental().await,
        }
    }

    fn produce_output(&self) -> Result<Manifest, PipelineError> {
        Ok(match self.family {
            ToolFamily::Genus => self.genus_output(),
            ToolFamily::Innovus => self.innovus_output(),
        })
    }
}
