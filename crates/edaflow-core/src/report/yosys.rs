//! Post-synthesis metrics of the Yosys flow.
//!
//! Yosys itself reports nothing useful; the mapped netlist is loaded into
//! OpenROAD, whose console log carries a `result: worst_delay = <ns>` line
//! and the `report_design_area` line (`Design area <um^2> u^2 ...`).

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use super::ReportError;
use super::scan::LineScanner;

const DELAY_MARKER: &str = "worst_delay";
const AREA_MARKER: &str = "Design area";

/// Critical-path delay and cell area of a mapped netlist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthesisMetrics {
    pub delay: f64,
    pub area: f64,
}

/// Scan the whole log; when a marker repeats, the last line wins.
pub fn synthesis_metrics<R: BufRead>(
    scanner: &mut LineScanner<R>,
) -> Result<SynthesisMetrics, ReportError> {
    let mut delay = None;
    let mut area = None;
    while let Some(line) = scanner.next_line()? {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if line.contains(DELAY_MARKER) {
            let value = fields
                .last()
                .ok_or_else(|| scanner.malformed(&line, "missing delay value"))?;
            delay = Some(scanner.field(&line, value, "delay")?);
        } else if line.contains(AREA_MARKER) {
            let value = fields
                .get(2)
                .ok_or_else(|| scanner.malformed(&line, "missing area value"))?;
            area = Some(scanner.field(&line, value, "area")?);
        }
    }

    let missing = |marker: &str| ReportError::EndOfStream {
        anchor: marker.to_string(),
    };
    Ok(SynthesisMetrics {
        delay: delay.ok_or_else(|| missing(DELAY_MARKER))?,
        area: area.ok_or_else(|| missing(AREA_MARKER))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(text: &str) -> LineScanner<Cursor<Vec<u8>>> {
        LineScanner::new(Cursor::new(text.as_bytes().to_vec()))
    }

    const LOG: &str = "\
OpenROAD v2.0
[INFO ODB-0227] LEF file: tech.lef, created 10 layers
result: worst_delay = 0.4821
Design area 412 u^2 100% utilization.
";

    #[test]
    fn reads_delay_and_area() {
        let metrics = synthesis_metrics(&mut scanner(LOG)).unwrap();
        assert!((metrics.delay - 0.4821).abs() < 1e-12);
        assert!((metrics.area - 412.0).abs() < 1e-12);
    }

    #[test]
    fn later_lines_override_earlier_ones() {
        let text = format!("{LOG}result: worst_delay = 0.5000\n");
        let metrics = synthesis_metrics(&mut scanner(&text)).unwrap();
        assert!((metrics.delay - 0.5).abs() < 1e-12);
    }

    #[test]
    fn missing_area_is_end_of_stream() {
        let err = synthesis_metrics(&mut scanner("result: worst_delay = 1.0\n")).unwrap_err();
        assert!(
            matches!(err, ReportError::EndOfStream { ref anchor } if anchor == "Design area")
        );
    }

    #[test]
    fn non_numeric_area_is_malformed() {
        let err =
            synthesis_metrics(&mut scanner("result: worst_delay = 1.0\nDesign area n/a\n"))
                .unwrap_err();
        assert!(matches!(err, ReportError::Malformed { line_no: 2, .. }));
    }
}
