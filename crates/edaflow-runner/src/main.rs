//! `edaflow`
//!
//! Runs synthesis and place-and-route flows, single tool families, or the
//! report extractors on their own.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use edaflow_core::config::{load_flow_config, load_tool_options};
use edaflow_core::report::{self, ParseOptions, ReportFormat, ReportKind, parse_report};
use edaflow_runner::flow;
use edaflow_runner::openflow::{OpenFamily, OpenToolManager};
use edaflow_runner::pipeline::{ToolFamily, ToolManager, run_step};

#[derive(Parser, Debug)]
#[command(name = "edaflow")]
#[command(version, about = "edaflow - staged EDA tool runner")]
struct Args {
    /// Log level filter (e.g. "info", "debug"). Defaults to the flow
    /// config's `log_level`, then "info".
    #[arg(long, global = true, env = "EDAFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "EDAFLOW_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run synthesis followed by place-and-route and write `ppa.json`.
    ///
    /// The config's `toolchain` picks Genus/Innovus or Yosys/OpenROAD.
    Flow {
        /// Flow configuration (YAML, JSON or TOML).
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Run the stages of a single tool family.
    Stage {
        #[arg(long, value_parser = ["genus", "innovus", "yosys", "openroad"])]
        family: String,

        /// Tool options file (YAML, JSON or TOML).
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Extract records from one report and print them as JSON.
    Parse {
        #[arg(long, value_parser = ["genus", "innovus"])]
        format: String,

        #[arg(long, value_parser = ["timing", "power", "area"])]
        kind: String,

        /// Stop after this many timing paths.
        #[arg(long)]
        max_paths: Option<usize>,

        report: PathBuf,
    },
    /// Read the metrics a Yosys or OpenROAD run printed into its log.
    Metrics {
        #[arg(long, value_parser = ["yosys", "openroad"])]
        format: String,

        log: PathBuf,
    },
}

fn init_logging(level: &str, log_json: bool) {
    let filter = format!("edaflow_runner={level},edaflow_core={level},edaflow={level}");
    edaflow_core::tracing_init::init_tracing(&filter, log_json);
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

async fn run_flow(config_path: &Path, args: &Args) -> anyhow::Result<()> {
    let config = load_flow_config(config_path)
        .with_context(|| format!("loading flow config {}", config_path.display()))?;
    init_logging(
        args.log_level.as_deref().unwrap_or(&config.log_level),
        args.log_json,
    );
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        rundir = %config.rundir.display(),
        "Starting flow"
    );

    let summary = flow::run_flow(config).await.context("flow failed")?;
    print_json(&summary)
}

async fn run_family(family: &str, config_path: &Path) -> anyhow::Result<()> {
    let options = load_tool_options(config_path)
        .with_context(|| format!("loading tool options {}", config_path.display()))?;
    let result = if let Ok(open) = family.parse::<OpenFamily>() {
        run_step(&mut OpenToolManager::new(open, options)?).await
    } else {
        let family: ToolFamily = family.parse().map_err(anyhow::Error::msg)?;
        run_step(&mut ToolManager::new(family, options)?).await
    };
    let output = result.with_context(|| format!("{family} run failed"))?;
    print_json(&output)
}

fn run_parse(
    format: &str,
    kind: &str,
    max_paths: Option<usize>,
    report: &Path,
) -> anyhow::Result<()> {
    let format: ReportFormat = format.parse().map_err(anyhow::Error::msg)?;
    let kind: ReportKind = kind.parse().map_err(anyhow::Error::msg)?;
    let records = parse_report(format, kind, report, &ParseOptions { max_paths })
        .with_context(|| format!("parsing {}", report.display()))?;
    print_json(&records)
}

fn run_metrics(format: &str, log: &Path) -> anyhow::Result<()> {
    let context = || format!("reading {}", log.display());
    match format.parse::<OpenFamily>().map_err(anyhow::Error::msg)? {
        OpenFamily::Yosys => print_json(&report::synthesis_metrics(log).with_context(context)?),
        OpenFamily::Openroad => print_json(&report::openroad_results(log).with_context(context)?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.command {
        Command::Flow { config } => run_flow(config, &args).await,
        Command::Stage { family, config } => {
            init_logging(args.log_level.as_deref().unwrap_or("info"), args.log_json);
            run_family(family, config).await
        }
        Command::Parse {
            format,
            kind,
            max_paths,
            report,
        } => {
            init_logging(args.log_level.as_deref().unwrap_or("warn"), args.log_json);
            run_parse(format, kind, *max_paths, report)
        }
        Command::Metrics { format, log } => {
            init_logging(args.log_level.as_deref().unwrap_or("warn"), args.log_json);
            run_metrics(format, log)
        }
    }
}
