//! Genus report dialect.
//!
//! Plain-text output of `report_timing`, `report_power -by_hierarchy` and
//! `report_area`.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use super::hierarchy::{HierarchyStack, indent_depth};
use super::scan::LineScanner;
use super::{AreaEntry, PowerEntry, ReportError, TimingPath};

static PATH_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Path (\d+):").expect("static regex is valid"));
static STARTPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+Startpoint:\s+\([A-Z]\)\s+(\S+)$").expect("static regex is valid")
});
static ENDPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+Endpoint:\s+\([A-Z]\)\s+(\S+)$").expect("static regex is valid")
});
static DATA_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+Data Path:-\s+(-?\d+(?:\.\d+)?)").expect("static regex is valid")
});
static SLACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+Slack:=\s+(-?\d+(?:\.\d+)?)").expect("static regex is valid")
});
static TRAILER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#-+$").expect("static regex is valid"));
static POWER_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Power\s+Unit:\s+(\S+)$").expect("static regex is valid"));
static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-+$").expect("static regex is valid"));

/// Timing paths in report order, at most `max_paths` of them.
pub fn timing<R: BufRead>(
    scanner: &mut LineScanner<R>,
    max_paths: Option<usize>,
) -> Result<Vec<TimingPath>, ReportError> {
    let mut paths = Vec::new();
    while max_paths.is_none_or(|max| paths.len() < max) {
        match timing_path(scanner) {
            Ok(path) => paths.push(path),
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(paths)
}

fn timing_path<R: BufRead>(scanner: &mut LineScanner<R>) -> Result<TimingPath, ReportError> {
    let header = scanner.scan_capture(&PATH_HEADER_RE)?;
    let line = scanner.line_no();
    let path_index = header[0]
        .parse()
        .map_err(|_| ReportError::Malformed {
            line_no: line,
            reason: "path index out of range".into(),
            line: header[0].clone(),
        })?;

    let begin_point = scanner.scan_capture(&STARTPOINT_RE)?.swap_remove(0);
    let end_point = scanner.scan_capture(&ENDPOINT_RE)?.swap_remove(0);

    let arrival = scanner.scan_capture(&DATA_PATH_RE)?.swap_remove(0);
    let arrival_time = scanner.field(&arrival, &arrival, "arrival time")?;

    let slack = scanner.scan_capture(&SLACK_RE)?.swap_remove(0);
    let slack_time = scanner.field(&slack, &slack, "slack")?;

    for _ in 0..3 {
        scanner.scan_forward(&TRAILER_RE)?;
    }

    Ok(TimingPath {
        path_index,
        begin_point,
        end_point,
        arrival_time,
        slack_time,
    })
}

/// Watts per unit printed in the `Power Unit:` header.
fn unit_scale(unit: &str) -> Option<f64> {
    match unit {
        "W" => Some(1.0),
        "mW" => Some(1e-3),
        "uW" => Some(1e-6),
        "nW" => Some(1e-9),
        "pW" => Some(1e-12),
        _ => None,
    }
}

/// Per-instance power; the first row is the design total.
///
/// The first line that is not a data row (normally the closing dash rule)
/// ends the table, as does the end of the report.
pub fn power<R: BufRead>(scanner: &mut LineScanner<R>) -> Result<Vec<PowerEntry>, ReportError> {
    let unit = scanner.scan_capture(&POWER_UNIT_RE)?.swap_remove(0);
    let scale = unit_scale(&unit)
        .ok_or_else(|| scanner.malformed(&unit, format!("unsupported power unit `{unit}`")))?;

    scanner.scan_forward(&RULE_RE)?;
    scanner.scan_forward(&RULE_RE)?;

    let mut entries = Vec::new();
    while let Some(line) = scanner.next_line()? {
        let Some(entry) = power_row(&line, scale) else {
            break;
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// `cells %cells leakage internal switching total lvl /path`; `None` for
/// anything else, which ends the table.
fn power_row(line: &str, scale: f64) -> Option<PowerEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [cells, _pct, leakage, internal, switching, total, _lvl, instance] = fields[..] else {
        return None;
    };
    let value = |v: &str| v.parse::<f64>().ok().map(|v| v * scale);
    Some(PowerEntry {
        instance_path: instance.trim_start_matches('/').to_string(),
        cell_count: Some(cells.parse().ok()?),
        internal: value(internal)?,
        switching: value(switching)?,
        leakage: value(leakage)?,
        total: value(total)?,
    })
}

/// Root (whole design) row followed by every child instance.
///
/// Child rows print only their local label; the full path is rebuilt from
/// indentation. A blank line or the end of the report closes the listing.
pub fn area<R: BufRead>(scanner: &mut LineScanner<R>) -> Result<Vec<AreaEntry>, ReportError> {
    scanner.scan_forward(&RULE_RE)?;

    let Some(line) = scanner.next_line()?.filter(|l| !l.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [root, cells, cell_area, net_area, total_area] = fields[..] else {
        return Err(scanner.malformed(
            &line,
            format!("expected 5 fields in root row, got {}", fields.len()),
        ));
    };
    let root = root.to_string();
    let mut entries = vec![AreaEntry {
        instance_path: root.clone(),
        module_name: Some(root.clone()),
        cell_count: scanner.field(&line, cells, "cell count")?,
        cell_area: Some(scanner.field(&line, cell_area, "cell area")?),
        net_area: Some(scanner.field(&line, net_area, "net area")?),
        total_area: scanner.field(&line, total_area, "total area")?,
        breakdown: None,
    }];

    let mut stack = HierarchyStack::new();
    while let Some(line) = scanner.next_line()? {
        if line.trim().is_empty() {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [label, module, cells, cell_area, net_area, total_area] = fields[..] else {
            return Err(scanner.malformed(
                &line,
                format!("expected 6 fields in child row, got {}", fields.len()),
            ));
        };
        stack.enter(indent_depth(&line), label);
        entries.push(AreaEntry {
            instance_path: stack.path(&root),
            module_name: Some(module.to_string()),
            cell_count: scanner.field(&line, cells, "cell count")?,
            cell_area: Some(scanner.field(&line, cell_area, "cell area")?),
            net_area: Some(scanner.field(&line, net_area, "net area")?),
            total_area: scanner.field(&line, total_area, "total area")?,
            breakdown: None,
        });
    }
    Ok(entries)
}
