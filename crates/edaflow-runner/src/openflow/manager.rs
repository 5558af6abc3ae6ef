//! Manager for one open-source tool family.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use edaflow_core::report;
use edaflow_core::{Manifest, ToolOptions};
use serde_json::json;
use tracing::info;

use super::{Artifact, OpenFamily, Program, Unit};
use crate::pipeline::scripts::{self, ScriptSource, TemplateDir};
use crate::pipeline::{PipelineError, RunLayout, ToolStep};
use crate::supervisor::{ArtifactExists, Supervisor, SupervisorPolicy, ToolCommand};

/// Runs the units of a Yosys or OpenROAD family and reads back its metrics.
pub struct OpenToolManager {
    family: OpenFamily,
    options: ToolOptions,
    layout: RunLayout,
    scripts: Box<dyn ScriptSource>,
    top_module: String,
    /// License variables plus the extended `PATH`, if any.
    env: BTreeMap<String, String>,
    poll_interval: Duration,
    terminate_grace: Duration,
}

impl std::fmt::Debug for OpenToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenToolManager")
            .field("family", &self.family)
            .field("rundir", &self.layout.rundir)
            .finish_non_exhaustive()
    }
}

impl OpenToolManager {
    /// Manager reading unit scripts from `options.script_dir`.
    pub fn new(family: OpenFamily, options: ToolOptions) -> Result<Self, PipelineError> {
        let dir = options
            .script_dir
            .clone()
            .ok_or(PipelineError::MissingOption("script_dir"))?;
        Self::with_scripts(family, options, TemplateDir::new(dir))
    }

    pub fn with_scripts(
        family: OpenFamily,
        options: ToolOptions,
        scripts: impl ScriptSource + 'static,
    ) -> Result<Self, PipelineError> {
        let rundir = options
            .rundir
            .clone()
            .ok_or(PipelineError::MissingOption("rundir"))?;
        let top_module = options
            .top_module
            .clone()
            .ok_or(PipelineError::MissingOption("top_module"))?;

        let mut env = options.license_env.clone();
        if let Some(dir) = options.extra_str("openroad_dir") {
            env.insert("PATH".into(), extended_path(std::env::var_os("PATH"), Path::new(dir))?);
        }
        let poll_interval = options.poll_interval_ms.map_or(
            SupervisorPolicy::DEFAULT_POLL_INTERVAL,
            Duration::from_millis,
        );

        let layout = RunLayout::create(&rundir)?;
        Ok(Self {
            family,
            options,
            layout,
            scripts: Box::new(scripts),
            top_module,
            env,
            poll_interval,
            terminate_grace: SupervisorPolicy::DEFAULT_TERMINATE_GRACE,
        })
    }

    pub const fn family(&self) -> OpenFamily {
        self.family
    }

    pub const fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn mapped_netlist(&self) -> PathBuf {
        self.layout
            .data
            .join(format!("{}-mapped.v", self.top_module))
    }

    /// Console log the family's metrics are read from.
    pub fn report_log(&self) -> PathBuf {
        self.family
            .units()
            .last()
            .map_or_else(|| self.layout.log.clone(), |u| self.layout.log.join(u.log))
    }

    fn binary(&self, program: Program) -> PathBuf {
        self.options
            .extra_str(program.binary_key())
            .map_or_else(|| PathBuf::from(program.default_binary()), PathBuf::from)
    }

    fn artifact(&self, unit: &Unit) -> PathBuf {
        match unit.artifact {
            Artifact::MappedNetlist => self.mapped_netlist(),
            Artifact::Log => self.layout.log.join(unit.log),
        }
    }

    fn timeout(&self, unit: &Unit) -> Duration {
        self.options
            .timeouts
            .get(unit.name)
            .map_or(unit.default_timeout, |secs| Duration::from_secs(*secs))
    }

    fn render_context(&self) -> Result<Manifest, PipelineError> {
        let mut context = self.options.to_manifest()?;
        let paths = [
            ("rundir", self.layout.rundir.clone()),
            ("data_dir", self.layout.data.clone()),
            ("log_dir", self.layout.log.clone()),
            ("report_dir", self.layout.reports.clone()),
            ("generated_script_dir", self.layout.scripts.clone()),
            ("mapped_netlist", self.mapped_netlist()),
        ];
        for (key, path) in paths {
            context.insert(key.to_string(), json!(path.display().to_string()));
        }
        context.insert("top_module".into(), json!(self.top_module));
        Ok(context)
    }

    /// Render every unit script before the first spawn.
    fn bodies(&self) -> Result<Vec<(&'static Unit, String)>, PipelineError> {
        let context = self.render_context()?;
        self.family
            .units()
            .iter()
            .map(|unit| {
                let raw = self.scripts.stage_body(self.family.as_str(), unit.name)?;
                scripts::render(unit.name, &raw, &context).map(|body| (unit, body))
            })
            .collect()
    }

    fn command(&self, unit: &Unit, script: &Path) -> ToolCommand {
        let command = ToolCommand::new(self.binary(unit.program), &self.layout.rundir);
        let command = match unit.program {
            Program::Yosys => command.arg("-s").arg(script),
            Program::Openroad => command.arg(script),
        };
        command
            .envs(&self.env)
            .log_file(self.layout.log.join(unit.log))
    }

    fn policy(&self, deadline: Duration) -> SupervisorPolicy {
        SupervisorPolicy::new(deadline)
            .with_poll_interval(self.poll_interval)
            .with_terminate_grace(self.terminate_grace)
    }

    fn yosys_output(&self) -> Result<Manifest, PipelineError> {
        let metrics = report::synthesis_metrics(&self.report_log())?;
        let mut out = Manifest::new();
        out.insert(
            "verilog_file".into(),
            json!(self.mapped_netlist().display().to_string()),
        );
        out.insert("delay".into(), json!(metrics.delay));
        out.insert("area".into(), json!(metrics.area));
        Ok(out)
    }

    fn openroad_output(&self) -> Result<Manifest, PipelineError> {
        let results = report::openroad_results(&self.report_log())?;
        Ok(results
            .into_iter()
            .map(|(name, value)| (name, json!(value)))
            .collect())
    }
}

/// `PATH` with `<openroad_dir>/test` appended, where OpenROAD's flow
/// helpers live.
fn extended_path(current: Option<OsString>, openroad_dir: &Path) -> Result<String, PipelineError> {
    let mut dirs: Vec<PathBuf> = current
        .as_deref()
        .map(|p| std::env::split_paths(p).collect())
        .unwrap_or_default();
    dirs.push(openroad_dir.join("test"));
    let joined = std::env::join_paths(dirs).map_err(std::io::Error::other)?;
    Ok(joined.to_string_lossy().into_owned())
}

impl ToolStep for OpenToolManager {
    fn name(&self) -> &str {
        self.family.manager_name()
    }

    fn options(&self) -> &ToolOptions {
        &self.options
    }

    async fn execute(&mut self) -> Result<(), PipelineError> {
        info!(
            family = %self.family,
            units = ?self.family.unit_names(),
            rundir = %self.layout.rundir.display(),
            "Running tool"
        );
        for (unit, body) in self.bodies()? {
            let script_path = self.layout.scripts.join(unit.script);
            std::fs::write(&script_path, body)?;

            let command = self.command(unit, &script_path);
            let check = ArtifactExists(self.artifact(unit));
            Supervisor::new(unit.name, self.policy(self.timeout(unit)))
                .run(&command, &check)
                .await?;
        }
        Ok(())
    }

    fn produce_output(&self) -> Result<Manifest, PipelineError> {
        match self.family {
            OpenFamily::Yosys => self.yosys_output(),
            OpenFamily::Openroad => self.openroad_output(),
        }
    }
}
