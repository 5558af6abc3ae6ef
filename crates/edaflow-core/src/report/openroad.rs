//! OpenROAD flow results.
//!
//! The place-and-route script prints each figure of merit as
//! `result: <name> = <number>`; everything else in the log is noise.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use super::ReportError;
use super::scan::LineScanner;

static RESULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^result:").expect("static regex is valid"));
static RESULT_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^result:\s+(\w+)\s+=\s+(-?\d+\.\d*)").expect("static regex is valid")
});

/// Every `result:` line, keyed by name. A repeated name keeps its last value.
pub fn results<R: BufRead>(
    scanner: &mut LineScanner<R>,
) -> Result<BTreeMap<String, f64>, ReportError> {
    let mut results = BTreeMap::new();
    loop {
        let line = match scanner.scan_forward(&RESULT_RE) {
            Ok(line) => line,
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e),
        };
        let caps = RESULT_VALUE_RE
            .captures(&line)
            .ok_or_else(|| scanner.malformed(&line, "expected `result: <name> = <number>`"))?;
        let value = scanner.field(&line, &caps[2], "result value")?;
        results.insert(caps[1].to_string(), value);
    }
    Ok(results)
}
