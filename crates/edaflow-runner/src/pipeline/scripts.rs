//! Stage script bodies and their assembly.
//!
//! What each stage actually asks the tool to do comes from a
//! [`ScriptSource`]. The pipeline only wraps those bodies with checkpoint
//! load/save statements and a trailing `exit 0`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use edaflow_core::Manifest;
use regex::{Captures, Regex};
use serde_json::Value;

use super::PipelineError;
use crate::checkpoint::CheckpointStore;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("static regex is valid")
});

/// Supplies the tool commands of one stage.
pub trait ScriptSource: Send + Sync {
    /// Raw body for `stage` of `tool` (`genus`, `yosys`, ...), before
    /// placeholder substitution.
    fn stage_body(&self, tool: &str, stage: &str) -> Result<String, PipelineError>;
}

impl<T: ScriptSource + ?Sized> ScriptSource for Box<T> {
    fn stage_body(&self, tool: &str, stage: &str) -> Result<String, PipelineError> {
        (**self).stage_body(tool, stage)
    }
}

/// Reads `<dir>/<stage>.tcl`, or `<dir>/<stage>.ys` for Yosys scripts.
#[derive(Debug, Clone)]
pub struct TemplateDir {
    dir: PathBuf,
}

impl TemplateDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScriptSource for TemplateDir {
    fn stage_body(&self, _tool: &str, stage: &str) -> Result<String, PipelineError> {
        let tcl = self.dir.join(format!("{stage}.tcl"));
        let ys = self.dir.join(format!("{stage}.ys"));
        let path = if !tcl.exists() && ys.exists() { ys } else { tcl };
        std::fs::read_to_string(&path).map_err(|e| PipelineError::Script {
            stage: stage.to_string(),
            reason: format!("cannot read template {}: {e}", path.display()),
        })
    }
}

/// Bodies held in memory, keyed by stage.
#[derive(Debug, Clone, Default)]
pub struct InlineScripts {
    bodies: BTreeMap<String, String>,
}

impl InlineScripts {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, stage: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(stage.into(), body.into());
        self
    }
}

impl ScriptSource for InlineScripts {
    fn stage_body(&self, _tool: &str, stage: &str) -> Result<String, PipelineError> {
        self.bodies
            .get(stage)
            .cloned()
            .ok_or_else(|| PipelineError::Script {
                stage: stage.to_string(),
                reason: "no script body".to_string(),
            })
    }
}

/// Replace every `{{ key }}` with the matching context value.
///
/// Lists are joined with spaces; a key missing from the context is an error.
pub fn render(stage: &str, body: &str, context: &Manifest) -> Result<String, PipelineError> {
    let mut missing: Option<String> = None;
    let rendered = PLACEHOLDER_RE.replace_all(body, |caps: &Captures<'_>| {
        let key = &caps[1];
        context.get(key).map_or_else(
            || {
                missing.get_or_insert_with(|| key.to_string());
                String::new()
            },
            value_text,
        )
    });
    match missing {
        Some(key) => Err(PipelineError::Script {
            stage: stage.to_string(),
            reason: format!("no value for placeholder `{key}`"),
        }),
        None => Ok(rendered.into_owned()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Full script of one incremental stage.
pub fn stage_script(
    checkpoints: &CheckpointStore,
    previous: Option<&str>,
    stage: &str,
    body: &str,
) -> String {
    let mut script = format!("# stage: {stage}\n");
    if let Some(prev) = previous {
        script.push_str(&checkpoints.load_statement(prev));
        script.push('\n');
    }
    push_body(&mut script, body);
    script.push_str(&checkpoints.save_statement(stage));
    script.push_str("\nexit 0\n");
    script
}

/// One script running every stage body in order; only the final
/// checkpoint is saved.
pub fn fused_script(checkpoints: &CheckpointStore, bodies: &[(String, String)]) -> String {
    let mut script = String::from("# fused run\n");
    for (stage, body) in bodies {
        script.push_str(&format!("# stage: {stage}\n"));
        push_body(&mut script, body);
    }
    if let Some((last, _)) = bodies.last() {
        script.push_str(&checkpoints.save_statement(last));
        script.push('\n');
    }
    script.push_str("exit 0\n");
    script
}

fn push_body(script: &mut String, body: &str) {
    script.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        script.push('\n');
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pipeline::ToolFamily;
    use serde_json::json;

    fn context() -> Manifest {
        let mut m = Manifest::new();
        m.insert("top_module".into(), json!("gcd"));
        m.insert("lib_files".into(), json!(["a.lib", "b.lib"]));
        m.insert("clk_period_ns".into(), json!(1.5));
        m
    }

    #[test]
    fn render_substitutes_scalars_and_lists() {
        let out = render(
            "syn",
            "read_libs {{ lib_files }}\nelaborate {{top_module}}\n# {{clk_period_ns}}",
            &context(),
        )
        .unwrap();
        assert_eq!(out, "read_libs a.lib b.lib\nelaborate gcd\n# 1.5");
    }

    #[test]
    fn render_reports_missing_key() {
        let err = render("syn", "read_hdl {{ hdl_files }}", &context()).unwrap_err();
        assert!(err.to_string().contains("hdl_files"));
    }

    #[test]
    fn incremental_script_loads_previous_and_saves_own() {
        let store = CheckpointStore::new("/r", "/r/data", ToolFamily::Genus);
        let script = stage_script(&store, Some("syn"), "report", "report_timing");
        assert_eq!(
            script,
            "# stage: report\nread_db data/syn.db\nreport_timing\nwrite_db data/report.db\nexit 0\n"
        );
        let first = stage_script(&store, None, "syn", "syn_generic\n");
        assert!(!first.contains("read_db"));
    }

    #[test]
    fn fused_script_saves_only_last_checkpoint() {
        let store = CheckpointStore::new("/r", "/r/data", ToolFamily::Innovus);
        let bodies = vec![
            ("init".to_string(), "init_design".to_string()),
            ("floorplan".to_string(), "floorPlan -r 1.0".to_string()),
        ];
        let script = fused_script(&store, &bodies);
        assert!(!script.contains("saveDesign data/init.enc"));
        assert!(script.contains("init_design\n# stage: floorplan\nfloorPlan -r 1.0\n"));
        assert!(script.ends_with("saveDesign data/floorplan.enc\nexit 0\n"));
    }

    #[test]
    fn template_dir_missing_file_is_script_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = TemplateDir::new(dir.path());
        assert!(matches!(
            src.stage_body("genus", "syn").unwrap_err(),
            PipelineError::Script { .. }
        ));
    }

    #[test]
    fn template_dir_falls_back_to_yosys_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("syn.ys"), "read -sv {{ verilog_files }}").unwrap();
        std::fs::write(dir.path().join("report.tcl"), "report_design_area").unwrap();
        let src = TemplateDir::new(dir.path());
        assert_eq!(
            src.stage_body("yosys", "syn").unwrap(),
            "read -sv {{ verilog_files }}"
        );
        assert_eq!(
            src.stage_body("yosys", "report").unwrap(),
            "report_design_area"
        );
    }
}
