//! Innovus report dialect.
//!
//! Timing comes from the machine-readable `report_timing -output_format text`
//! blocks (`PATH n` ... `END_PATH n`), power from `report_power -hierarchy`
//! and area from `report_area -detail`.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use super::hierarchy::{HierarchyStack, indent_depth};
use super::scan::{LineScanner, bracketed_values};
use super::{AreaBreakdown, AreaEntry, PowerEntry, ReportError, TimingPath};

/// Innovus prints power in milliwatts.
const POWER_SCALE: f64 = 1e-3;

static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PATH (\d+)$").expect("static regex is valid"));
static END_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^END_PATH (\d+)$").expect("static regex is valid"));
static ENDPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+ENDPT").expect("static regex is valid"));
static BEGINPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+BEGINPT").expect("static regex is valid"));
static SLK_CLC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+SLK_CLC").expect("static regex is valid"));
static END_SLK_CLC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+END_SLK_CLC").expect("static regex is valid"));
static DESIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\s+Design:\s*(\S+)").expect("static regex is valid"));
static GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Group").expect("static regex is valid"));
static HIERARCHY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Hierarchy").expect("static regex is valid"));
static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-+$").expect("static regex is valid"));

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
    let index = scanner.scan_capture(&PATH_RE)?.swap_remove(0);
    let path_index = scanner.field(&index, &index, "path index")?;

    let end_point = point(scanner, &ENDPT_RE, "ENDPT")?;
    let begin_point = point(scanner, &BEGINPT_RE, "BEGINPT")?;

    let block = scanner.scan_between(&SLK_CLC_RE, &END_SLK_CLC_RE)?;
    let [arrival_line, slack_line, ..] = block.as_slice() else {
        return Err(scanner.malformed(
            block.first().map_or("", String::as_str),
            "slack calculation needs arrival and slack rows",
        ));
    };
    let arrival_time = slack_value(scanner, arrival_line, "arrival time")?;
    let slack_time = slack_value(scanner, slack_line, "slack")?;

    scanner.scan_forward(&END_PATH_RE)?;

    Ok(TimingPath {
        path_index,
        begin_point,
        end_point,
        arrival_time,
        slack_time,
    })
}

/// Second `{...}` group of an ENDPT/BEGINPT line is the pin name.
fn point<R: BufRead>(
    scanner: &mut LineScanner<R>,
    anchor: &Regex,
    what: &str,
) -> Result<String, ReportError> {
    let line = scanner.scan_forward(anchor)?;
    match bracketed_values(&line).get(1) {
        Some(pin) => Ok((*pin).to_string()),
        None => Err(scanner.malformed(&line, format!("{what} without a pin"))),
    }
}

/// Third `{...}` group of a slack-calculation row is the value.
fn slack_value<R: BufRead>(
    scanner: &LineScanner<R>,
    line: &str,
    what: &str,
) -> Result<f64, ReportError> {
    match bracketed_values(line).get(2) {
        Some(value) => scanner.field(line, value, what),
        None => Err(scanner.malformed(line, format!("{what} row without a value"))),
    }
}

/// Design total followed by one entry per hierarchy row.
///
/// The hierarchy table has no closing marker: the first row that does not
/// look like `name internal switching leakage total percent` ends it.
pub fn power<R: BufRead>(scanner: &mut LineScanner<R>) -> Result<Vec<PowerEntry>, ReportError> {
    let design = scanner.scan_capture(&DESIGN_RE)?.swap_remove(0);

    scanner.scan_forward(&GROUP_RE)?;
    scanner.scan_forward(&RULE_RE)?;
    scanner.scan_forward(&RULE_RE)?;

    let total_line = scanner.next_line()?.ok_or_else(|| ReportError::EndOfStream {
        anchor: "total power row".into(),
    })?;
    let fields: Vec<&str> = total_line.split_whitespace().collect();
    let [_, internal, switching, leakage, total, ..] = fields[..] else {
        return Err(scanner.malformed(&total_line, "total power row is too short"));
    };
    let mut entries = vec![PowerEntry {
        instance_path: design.clone(),
        cell_count: None,
        internal: scanner.field::<f64>(&total_line, internal, "internal power")? * POWER_SCALE,
        switching: scanner.field::<f64>(&total_line, switching, "switching power")? * POWER_SCALE,
        leakage: scanner.field::<f64>(&total_line, leakage, "leakage power")? * POWER_SCALE,
        total: scanner.field::<f64>(&total_line, total, "total power")? * POWER_SCALE,
    }];

    scanner.scan_forward(&HIERARCHY_RE)?;
    scanner.scan_forward(&RULE_RE)?;

    while let Some(line) = scanner.next_line()? {
        let Some(entry) = hierarchy_row(&design, &line) else {
            break;
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn hierarchy_row(design: &str, line: &str) -> Option<PowerEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    let value = |i: usize| fields[i].parse::<f64>().ok().map(|v| v * POWER_SCALE);
    Some(PowerEntry {
        instance_path: format!("{design}/{}", fields[0]),
        cell_count: None,
        internal: value(1)?,
        switching: value(2)?,
        leakage: value(3)?,
        total: value(4)?,
    })
}

/// Detailed area listing: root row, then indented child rows.
///
/// Root rows carry 11 columns (no module), child rows 12. Paths are rebuilt
/// from indentation; the printed instance text is used as a local label.
pub fn area<R: BufRead>(scanner: &mut LineScanner<R>) -> Result<Vec<AreaEntry>, ReportError> {
    scanner.scan_forward(&RULE_RE)?;

    let Some(line) = scanner.next_line()?.filter(|l| !l.trim().is_empty()) else {
        return Ok(Vec::new());
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [root, counts @ ..] = fields.as_slice() else {
        return Err(scanner.malformed(&line, "empty root row"));
    };
    if counts.len() != 10 {
        return Err(scanner.malformed(
            &line,
            format!("expected 11 fields in root row, got {}", fields.len()),
        ));
    }
    let root = root.to_string();
    let mut entries = vec![area_entry(scanner, &line, root.clone(), None, counts)?];

    let mut stack = HierarchyStack::new();
    while let Some(line) = scanner.next_line()? {
        if line.trim().is_empty() {
            break;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [label, module, counts @ ..] = fields.as_slice() else {
            return Err(scanner.malformed(&line, "child row is too short"));
        };
        if counts.len() != 10 {
            return Err(scanner.malformed(
                &line,
                format!("expected 12 fields in child row, got {}", fields.len()),
            ));
        }
        stack.enter(indent_depth(&line), *label);
        let entry = area_entry(
            scanner,
            &line,
            stack.path(&root),
            Some(module.to_string()),
            counts,
        )?;
        entries.push(entry);
    }
    Ok(entries)
}

/// `counts` is `inst_count total buffer inverter comb flop latch icg macro physical`.
fn area_entry<R: BufRead>(
    scanner: &LineScanner<R>,
    line: &str,
    instance_path: String,
    module_name: Option<String>,
    counts: &[&str],
) -> Result<AreaEntry, ReportError> {
    let f = |i: usize, what: &str| scanner.field::<f64>(line, counts[i], what);
    Ok(AreaEntry {
        instance_path,
        module_name,
        cell_count: scanner.field(line, counts[0], "instance count")?,
        cell_area: None,
        net_area: None,
        total_area: f(1, "total area")?,
        breakdown: Some(AreaBreakdown {
            buffer: f(2, "buffer area")?,
            inverter: f(3, "inverter area")?,
            combinational: f(4, "combinational area")?,
            flop: f(5, "flop area")?,
            latch: f(6, "latch area")?,
            clock_gate: f(7, "clock gate area")?,
            macro_area: f(8, "macro area")?,
            physical: f(9, "physical area")?,
        }),
    })
}
