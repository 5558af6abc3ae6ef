//! Integration tests for the stage pipeline and the synthesis + PnR flows.
//!
//! A small shell script stands in for every EDA tool. It reads the script
//! given by `-file` (Cadence), `-s` (Yosys) or as the first existing-file
//! argument (OpenROAD), line by line:
//!
//! - `write_db <p>` / `saveDesign <p>` / `write_verilog <p>` create `<p>`
//! - `copy <a> <b>` copies a file, creating `<b>`'s parent
//! - `say <words>` prints the words to stdout (the console log)
//! - `fail` exits 1, `hang` sleeps far past any test deadline
//!
//! Every invocation appends the script's file name to `invocations.log` in
//! the working directory (the tool's run directory).

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use edaflow_core::config::{FlowConfig, Toolchain};
use edaflow_core::manifest::read_manifest;
use edaflow_core::{Manifest, ToolOptions};
use edaflow_runner::flow::{PpaSummary, SynthesisPnrFlow, YosysOpenroadFlow};
use edaflow_runner::openflow::{OpenFamily, OpenToolManager};
use edaflow_runner::pipeline::{
    InlineScripts, PipelineError, ToolFamily, ToolManager, run_step,
};
use edaflow_runner::supervisor::SupervisionError;
use serde_json::json;

const FAKE_TOOL: &str = r#"#!/bin/sh
set -f
script=""
while [ $# -gt 0 ]; do
  case "$1" in
    -file|-s) script="$2"; shift 2 ;;
    *) if [ -z "$script" ] && [ -f "$1" ]; then script="$1"; fi; shift ;;
  esac
done
basename "$script" >> invocations.log
while IFS= read -r line || [ -n "$line" ]; do
  set -- $line
  case "$1" in
    fail) exit 1 ;;
    hang) exec sleep 30 ;;
    write_db|saveDesign|write_verilog) mkdir -p "$(dirname "$2")"; : > "$2" ;;
    say) shift; echo "$*" ;;
    copy) mkdir -p "$(dirname "$3")"; cp "$2" "$3" ;;
  esac
done < "$script"
exit 0
"#;

fn fake_tool(dir: &Path) -> PathBuf {
    let path = dir.join("fake-tool.sh");
    std::fs::write(&path, FAKE_TOOL).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn invocations(rundir: &Path) -> Vec<String> {
    std::fs::read_to_string(rundir.join("invocations.log"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn innovus_options(root: &Path, steps: &[&str], runmode: &str) -> ToolOptions {
    ToolOptions {
        rundir: Some(root.join("innovus-rundir")),
        input_path: Some(root.join("innovus-rundir/innovus_manager-input.yml")),
        output_path: Some(root.join("innovus-rundir/innovus_manager-output.yml")),
        top_module: Some("gcd".into()),
        binary: Some(fake_tool(root)),
        steps: Some(steps.iter().map(|s| (*s).to_string()).collect()),
        runmode: Some(runmode.into()),
        poll_interval_ms: Some(20),
        ..ToolOptions::default()
    }
}

fn innovus_scripts() -> InlineScripts {
    InlineScripts::new()
        .with("init", "init_design")
        .with("floorplan", "floorPlan -r 1.0")
        .with("powerplan", "addRing")
        .with("placement", "place_opt_design")
        .with("cts", "ccopt_design")
        .with("routing", "routeDesign")
}

#[tokio::test]
async fn failed_stage_stops_incremental_run() {
    let dir = tempfile::tempdir().unwrap();
    let options = innovus_options(dir.path(), &["init", "floorplan", "powerplan"], "normal");
    let output_path = options.output_path.clone().unwrap();
    let input_path = options.input_path.clone().unwrap();
    let scripts = innovus_scripts().with("floorplan", "fail");

    let mut manager = ToolManager::with_scripts(ToolFamily::Innovus, options, scripts).unwrap();
    let err = run_step(&mut manager).await.unwrap_err();

    assert!(err.is_supervision(), "unexpected error: {err}");
    assert!(!err.is_unimplemented());
    assert!(matches!(
        err,
        PipelineError::Supervision(SupervisionError::ExitedWithoutArtifact { ref stage, .. })
            if stage == "floorplan"
    ));

    let rundir = dir.path().join("innovus-rundir");
    assert_eq!(invocations(&rundir), vec!["init.tcl", "floorplan.tcl"]);
    assert!(rundir.join("data/init.enc").exists());
    assert!(!rundir.join("data/floorplan.enc").exists());
    assert!(input_path.exists());
    assert!(!output_path.exists());
}

#[tokio::test]
async fn unknown_stage_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = innovus_options(dir.path(), &["init", "signoff"], "normal");
    let input_path = options.input_path.clone().unwrap();

    let err = ToolManager::with_scripts(ToolFamily::Innovus, options, innovus_scripts())
        .unwrap_err();
    assert!(err.is_unimplemented());
    assert!(matches!(err, PipelineError::UnknownStage { ref stage, .. } if stage == "signoff"));
    assert!(!input_path.exists());
    assert!(invocations(&dir.path().join("innovus-rundir")).is_empty());
}

#[tokio::test]
async fn unknown_mode_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let options = innovus_options(dir.path(), &["init"], "turbo");
    let input_path = options.input_path.clone().unwrap();

    let err = ToolManager::with_scripts(ToolFamily::Innovus, options, innovus_scripts())
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownMode(ref m) if m == "turbo"));
    assert!(!input_path.exists());
}

#[tokio::test]
async fn incremental_run_chains_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let options = innovus_options(dir.path(), &["init", "floorplan", "powerplan"], "incremental");
    let output_path = options.output_path.clone().unwrap();

    let mut manager =
        ToolManager::with_scripts(ToolFamily::Innovus, options, innovus_scripts()).unwrap();
    let output = run_step(&mut manager).await.unwrap();

    let rundir = dir.path().join("innovus-rundir");
    assert_eq!(
        invocations(&rundir),
        vec!["init.tcl", "floorplan.tcl", "powerplan.tcl"]
    );
    let powerplan = std::fs::read_to_string(rundir.join("scripts/powerplan.tcl")).unwrap();
    assert!(powerplan.contains("source data/floorplan.enc"));
    assert!(powerplan.contains("saveDesign data/powerplan.enc"));

    let written: Manifest = read_manifest(&output_path).unwrap();
    assert_eq!(written, output);
    assert_eq!(output.get("top_module"), Some(&json!("gcd")));
    assert!(
        output["checkpoint"]
            .as_str()
            .unwrap()
            .ends_with("data/powerplan.enc")
    );
}

#[tokio::test]
async fn resume_skips_completed_stages() {
    let dir = tempfile::tempdir().unwrap();
    let rundir = dir.path().join("innovus-rundir");
    std::fs::create_dir_all(rundir.join("data")).unwrap();
    std::fs::write(rundir.join("data/init.enc"), "").unwrap();

    let options = innovus_options(dir.path(), &["init", "floorplan"], "normal");
    let mut manager =
        ToolManager::with_scripts(ToolFamily::Innovus, options, innovus_scripts()).unwrap();
    assert_eq!(
        manager.checkpoints().last_completed(&manager.config().stages),
        Some("init")
    );
    run_step(&mut manager).await.unwrap();

    assert_eq!(invocations(&rundir), vec!["floorplan.tcl"]);
    assert!(rundir.join("data/floorplan.enc").exists());
}

#[tokio::test]
async fn rerun_stage_keeps_later_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let rundir = dir.path().join("innovus-rundir");
    std::fs::create_dir_all(rundir.join("data")).unwrap();
    std::fs::write(rundir.join("data/floorplan.enc"), "stale").unwrap();

    let options = innovus_options(dir.path(), &["init", "floorplan"], "normal");
    let mut manager =
        ToolManager::with_scripts(ToolFamily::Innovus, options, innovus_scripts()).unwrap();
    assert_eq!(
        manager.checkpoints().last_completed(&manager.config().stages),
        None
    );
    run_step(&mut manager).await.unwrap();

    assert_eq!(invocations(&rundir), vec!["init.tcl"]);
    assert_eq!(
        std::fs::read_to_string(rundir.join("data/floorplan.enc")).unwrap(),
        "stale"
    );
}

#[tokio::test]
async fn fused_run_saves_only_final_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let rundir = dir.path().join("genus-rundir");
    let mut options = ToolOptions {
        rundir: Some(rundir.clone()),
        output_path: Some(rundir.join("genus_manager-output.yml")),
        top_module: Some("gcd".into()),
        binary: Some(fake_tool(dir.path())),
        runmode: Some("fast".into()),
        poll_interval_ms: Some(20),
        ..ToolOptions::default()
    };
    options.extra.insert("lef_files".into(), json!(["tech.lef"]));
    let scripts = InlineScripts::new()
        .with("syn", "elaborate {{ top_module }}")
        .with("report", "report_timing");

    let mut manager = ToolManager::with_scripts(ToolFamily::Genus, options, scripts).unwrap();
    let output = run_step(&mut manager).await.unwrap();

    assert_eq!(invocations(&rundir), vec!["fused.tcl"]);
    let script = std::fs::read_to_string(rundir.join("scripts/fused.tcl")).unwrap();
    assert!(script.contains("elaborate gcd"));
    assert!(rundir.join("data/report.db").exists());
    assert!(!rundir.join("data/syn.db").exists());

    assert!(
        output["verilog_file"]
            .as_str()
            .unwrap()
            .ends_with("data/gcd-mapped.v")
    );
    assert_eq!(output.get("lef_files"), Some(&json!(["tech.lef"])));
    assert_eq!(output.get("qrc_techfiles"), Some(&serde_json::Value::Null));
    assert_eq!(output.get("path_groups"), Some(&json!([])));
}

#[tokio::test]
async fn stage_past_deadline_is_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = innovus_options(dir.path(), &["init", "floorplan"], "normal");
    options.timeouts.insert("init".into(), 1);
    let scripts = innovus_scripts().with("init", "hang");

    let mut manager = ToolManager::with_scripts(ToolFamily::Innovus, options, scripts)
        .unwrap()
        .with_terminate_grace(Duration::from_millis(500));
    let start = Instant::now();
    let err = run_step(&mut manager).await.unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        err,
        PipelineError::Supervision(SupervisionError::Timeout { ref stage, .. }) if stage == "init"
    ));
    assert_eq!(
        invocations(&dir.path().join("innovus-rundir")),
        vec!["init.tcl"]
    );
}

fn flow_config(root: &Path, pnr_runmode: &str) -> FlowConfig {
    let tool = fake_tool(root);
    let mut config = FlowConfig {
        rundir: root.join("run"),
        ..FlowConfig::default()
    };
    config.design.insert("top_module".into(), json!("gcd"));
    config.design.insert("clk_period_ns".into(), json!(1.0));
    config
        .tech
        .insert("fixture_dir".into(), json!(fixture_dir().display().to_string()));
    config.tech.insert("lef_files".into(), json!(["tech.lef"]));
    for layer in [&mut config.synthesis, &mut config.pnr] {
        layer.insert("binary".into(), json!(tool.display().to_string()));
        layer.insert("poll_interval_ms".into(), json!(20));
    }
    config.synthesis.insert("runmode".into(), json!("normal"));
    config.pnr.insert("runmode".into(), json!(pnr_runmode));
    config
}

fn genus_scripts() -> InlineScripts {
    InlineScripts::new().with("syn", "syn_generic").with(
        "report",
        "copy {{ fixture_dir }}/genus_timing.rpt {{ report_dir }}/timing.rpt\n\
         copy {{ fixture_dir }}/genus_power.rpt {{ report_dir }}/power.rpt\n\
         copy {{ fixture_dir }}/genus_area.rpt {{ report_dir }}/area.rpt",
    )
}

fn pnr_scripts() -> InlineScripts {
    let copy_set = |prefix: &str| {
        format!(
            "copy {{{{ fixture_dir }}}}/innovus_timing.rpt {{{{ report_dir }}}}/{prefix}_timing/timing.rpt\n\
             copy {{{{ fixture_dir }}}}/innovus_power.rpt {{{{ report_dir }}}}/{prefix}_power.rpt\n\
             copy {{{{ fixture_dir }}}}/innovus_area.rpt {{{{ report_dir }}}}/{prefix}_area.rpt"
        )
    };
    innovus_scripts()
        .with("placement", copy_set("preCTS"))
        .with("routing", copy_set("postRoute"))
}

#[tokio::test]
async fn flow_collects_ppa_after_each_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = flow_config(dir.path(), "fast");
    let run = config.rundir.clone();

    let summary = SynthesisPnrFlow::new(config)
        .with_script_sources(genus_scripts(), pnr_scripts())
        .run()
        .await
        .unwrap();

    let syn = summary.post_syn.unwrap();
    assert!((syn.arrival_time - 901.0).abs() < 1e-9);
    assert!((syn.power.unwrap() - 0.301e-3).abs() < 1e-12);
    assert!((syn.area.unwrap() - 500.0).abs() < 1e-9);

    for totals in [summary.post_place.unwrap(), summary.post_route.unwrap()] {
        assert!((totals.arrival_time - 1.5).abs() < 1e-9);
        assert!((totals.power.unwrap() - 0.61e-3).abs() < 1e-12);
        assert!((totals.area.unwrap() - 600.0).abs() < 1e-9);
    }

    assert_eq!(invocations(&run.join("genus-rundir")), vec!["syn.tcl", "report.tcl"]);
    assert_eq!(invocations(&run.join("innovus-rundir")), vec!["fused.tcl"]);

    let pnr_input: Manifest =
        read_manifest(&run.join("innovus-rundir/innovus_manager-input.yml")).unwrap();
    assert!(
        pnr_input["verilog_file"]
            .as_str()
            .unwrap()
            .ends_with("genus-rundir/data/gcd-mapped.v")
    );

    let written: PpaSummary = read_manifest(&run.join("ppa.json")).unwrap();
    assert_eq!(written, summary);
}

#[tokio::test]
async fn flow_skips_pnr_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let config = flow_config(dir.path(), "skip");
    let run = config.rundir.clone();

    let summary = SynthesisPnrFlow::new(config)
        .with_script_sources(genus_scripts(), pnr_scripts())
        .run()
        .await
        .unwrap();

    assert!(summary.post_syn.is_some());
    assert!(summary.post_place.is_none());
    assert!(summary.post_route.is_none());
    assert!(!run.join("innovus-rundir").exists());
    assert!(run.join("ppa.json").exists());
}

#[tokio::test]
async fn flow_without_top_module_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = flow_config(dir.path(), "fast");
    config.design.remove("top_module");
    let run = config.rundir.clone();

    let err = SynthesisPnrFlow::new(config)
        .with_script_sources(genus_scripts(), pnr_scripts())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingOption("top_module")));
    assert!(!run.join("genus-rundir").exists());
}

fn open_flow_config(root: &Path, pnr_runmode: &str) -> FlowConfig {
    let tool = fake_tool(root).display().to_string();
    let mut config = FlowConfig {
        toolchain: Toolchain::YosysOpenroad,
        rundir: root.join("run"),
        ..FlowConfig::default()
    };
    config.design.insert("top_module".into(), json!("gcd"));
    config.design.insert("verilog_files".into(), json!(["gcd.v"]));
    config.tech.insert("yosys_bin".into(), json!(tool));
    config.tech.insert("openroad_bin".into(), json!(tool));
    config.tech.insert("poll_interval_ms".into(), json!(20));
    config.pnr.insert("runmode".into(), json!(pnr_runmode));
    config
}

fn yosys_scripts() -> InlineScripts {
    InlineScripts::new()
        .with("syn", "read -sv {{ verilog_files }}\nwrite_verilog {{ mapped_netlist }}")
        .with(
            "report",
            "read_verilog {{ mapped_netlist }}\n\
             say result: worst_delay = 0.4821\n\
             say Design area 412 u^2 100% utilization.",
        )
}

fn openroad_scripts() -> InlineScripts {
    InlineScripts::new().with(
        "pnr",
        "read_verilog {{ verilog_file }}\n\
         say result: worst_delay = 0.7312\n\
         say result: design_area = 1530.5",
    )
}

#[tokio::test]
async fn open_flow_reports_delay_and_area() {
    let dir = tempfile::tempdir().unwrap();
    let config = open_flow_config(dir.path(), "default");
    let run = config.rundir.clone();

    let summary = YosysOpenroadFlow::new(config)
        .with_script_sources(yosys_scripts(), openroad_scripts())
        .run()
        .await
        .unwrap();

    let syn = summary.post_syn.unwrap();
    assert!((syn.arrival_time - 0.4821).abs() < 1e-12);
    assert!((syn.area.unwrap() - 412.0).abs() < 1e-12);
    assert!(syn.power.is_none());
    assert!(summary.post_place.is_none());
    let route = summary.post_route.unwrap();
    assert!((route.arrival_time - 0.7312).abs() < 1e-12);
    assert!((route.area.unwrap() - 1530.5).abs() < 1e-12);

    let yosys = run.join("yosys-rundir");
    assert_eq!(invocations(&yosys), vec!["syn.ys", "report.tcl"]);
    let syn_script = std::fs::read_to_string(yosys.join("scripts/syn.ys")).unwrap();
    assert!(syn_script.starts_with("read -sv gcd.v\n"));
    assert_eq!(invocations(&run.join("openroad-rundir")), vec!["pnr.tcl"]);
    assert!(!yosys.join("data/gcd-mapped.v").exists());

    let pnr_input: Manifest =
        read_manifest(&run.join("openroad-rundir/openroad_manager-input.yml")).unwrap();
    assert!(
        pnr_input["verilog_file"]
            .as_str()
            .unwrap()
            .ends_with("yosys-rundir/data/gcd-mapped.v")
    );
    let written: PpaSummary = read_manifest(&run.join("ppa.json")).unwrap();
    assert_eq!(written, summary);
}

#[tokio::test]
async fn open_flow_can_keep_netlist_and_skip_pnr() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = open_flow_config(dir.path(), "skip");
    config.remove_netlist = false;
    let run = config.rundir.clone();

    let summary = YosysOpenroadFlow::new(config)
        .with_script_sources(yosys_scripts(), openroad_scripts())
        .run()
        .await
        .unwrap();

    assert!(summary.post_syn.is_some());
    assert!(summary.post_route.is_none());
    assert!(run.join("yosys-rundir/data/gcd-mapped.v").exists());
    assert!(!run.join("openroad-rundir").exists());
}

#[tokio::test]
async fn yosys_without_netlist_stops_before_report() {
    let dir = tempfile::tempdir().unwrap();
    let rundir = dir.path().join("yosys-rundir");
    let tool = fake_tool(dir.path()).display().to_string();
    let mut options = ToolOptions {
        rundir: Some(rundir.clone()),
        top_module: Some("gcd".into()),
        poll_interval_ms: Some(20),
        ..ToolOptions::default()
    };
    options.extra.insert("yosys_bin".into(), json!(tool));
    options.extra.insert("openroad_bin".into(), json!(tool));
    let scripts = yosys_scripts().with("syn", "read -sv gcd.v");

    let mut manager = OpenToolManager::with_scripts(OpenFamily::Yosys, options, scripts).unwrap();
    let err = run_step(&mut manager).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Supervision(SupervisionError::ExitedWithoutArtifact { ref stage, .. })
            if stage == "syn"
    ));
    assert_eq!(invocations(&rundir), vec!["syn.ys"]);
}
