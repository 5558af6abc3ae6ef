//! Report Extraction Engine.
//!
//! Turns the free-text reports of the supported tool families into ordered,
//! normalized [`ReportRecord`]s. Every dialect is a set of plain functions
//! over a [`scan::LineScanner`]; [`parse_report`] picks one by
//! [`ReportFormat`] and [`ReportKind`].
//!
//! The Yosys/OpenROAD flow prints scalar metrics into tool logs instead of
//! writing reports; [`synthesis_metrics`] and [`openroad_results`] read those.

pub mod genus;
pub mod hierarchy;
pub mod innovus;
pub mod openroad;
pub mod scan;
pub mod summary;
mod types;
pub mod yosys;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use hierarchy::{HierarchyFrame, HierarchyStack};
pub use scan::LineScanner;
pub use types::{
    AreaBreakdown, AreaEntry, ParseOptions, PowerEntry, ReportFormat, ReportKind, ReportRecord,
    TimingPath,
};
pub use yosys::SynthesisMetrics;

/// Errors raised while reading a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report file does not exist.
    #[error("Report file {} does not exist", .path.display())]
    MissingReport { path: PathBuf },

    /// The stream ended before a required anchor was seen.
    #[error("End of report reached while looking for `{anchor}`")]
    EndOfStream { anchor: String },

    /// A block was opened but its end anchor never appeared.
    #[error("Block starting at `{start}` was never closed by `{end}`")]
    Unterminated { start: String, end: String },

    /// A line had the wrong shape for the record being read.
    #[error("Malformed report line {line_no}: {reason}: {line:?}")]
    Malformed {
        line_no: usize,
        reason: String,
        line: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// True when the report simply ran out of records.
    pub const fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream { .. })
    }
}

/// Open a report for scanning. A missing file is fatal.
pub fn open_report(path: &Path) -> Result<LineScanner<BufReader<File>>, ReportError> {
    if !path.is_file() {
        return Err(ReportError::MissingReport {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;
    Ok(LineScanner::new(BufReader::new(file)))
}

/// Parse one report into records, in report order.
pub fn parse_report(
    format: ReportFormat,
    kind: ReportKind,
    path: &Path,
    options: &ParseOptions,
) -> Result<Vec<ReportRecord>, ReportError> {
    let records: Vec<ReportRecord> = match kind {
        ReportKind::Timing => timing_paths(format, path, options.max_paths)?
            .into_iter()
            .map(ReportRecord::Timing)
            .collect(),
        ReportKind::Power => power_entries(format, path)?
            .into_iter()
            .map(ReportRecord::Power)
            .collect(),
        ReportKind::Area => area_entries(format, path)?
            .into_iter()
            .map(ReportRecord::Area)
            .collect(),
    };
    debug!(
        path = %path.display(),
        %format,
        %kind,
        records = records.len(),
        "Parsed report"
    );
    Ok(records)
}

pub fn timing_paths(
    format: ReportFormat,
    path: &Path,
    max_paths: Option<usize>,
) -> Result<Vec<TimingPath>, ReportError> {
    let mut scanner = open_report(path)?;
    match format {
        ReportFormat::Genus => genus::timing(&mut scanner, max_paths),
        ReportFormat::Innovus => innovus::timing(&mut scanner, max_paths),
    }
}

pub fn power_entries(format: ReportFormat, path: &Path) -> Result<Vec<PowerEntry>, ReportError> {
    let mut scanner = open_report(path)?;
    match format {
        ReportFormat::Genus => genus::power(&mut scanner),
        ReportFormat::Innovus => innovus::power(&mut scanner),
    }
}

pub fn area_entries(format: ReportFormat, path: &Path) -> Result<Vec<AreaEntry>, ReportError> {
    let mut scanner = open_report(path)?;
    match format {
        ReportFormat::Genus => genus::area(&mut scanner),
        ReportFormat::Innovus => innovus::area(&mut scanner),
    }
}

/// Delay and area from the Yosys flow's report log.
pub fn synthesis_metrics(path: &Path) -> Result<SynthesisMetrics, ReportError> {
    let mut scanner = open_report(path)?;
    yosys::synthesis_metrics(&mut scanner)
}

/// `result:` figures from an OpenROAD log.
pub fn openroad_results(path: &Path) -> Result<BTreeMap<String, f64>, ReportError> {
    let mut scanner = open_report(path)?;
    openroad::results(&mut scanner)
}
