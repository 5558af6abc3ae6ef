//! Line scanning primitives shared by every report dialect.
//!
//! Reports are consumed strictly forward, one line at a time. Two searches
//! cover every dialect: [`LineScanner::scan_forward`] skips to the next line
//! matching an anchor, and [`LineScanner::scan_between`] collects a block
//! delimited by a start and an end anchor.

use std::io::BufRead;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::ReportError;

static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(.*?)\}").expect("static regex is valid"));

/// Forward-only line reader over a report stream.
#[derive(Debug)]
pub struct LineScanner<R> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> LineScanner<R> {
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// 1-based number of the last line returned (0 before the first read).
    pub const fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next line without its terminator, or `None` at end of stream.
    pub fn next_line(&mut self) -> Result<Option<String>, ReportError> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    /// Read until a line matches `anchor` and return that line.
    ///
    /// Running out of input first yields [`ReportError::EndOfStream`]; callers
    /// iterating over records treat that as "no more records".
    pub fn scan_forward(&mut self, anchor: &Regex) -> Result<String, ReportError> {
        while let Some(line) = self.next_line()? {
            if anchor.is_match(&line) {
                return Ok(line);
            }
        }
        Err(ReportError::EndOfStream {
            anchor: anchor.as_str().to_string(),
        })
    }

    /// Like [`scan_forward`](Self::scan_forward) but returns the capture
    /// groups of the matching line (group 1 onwards; unmatched optional
    /// groups are empty strings).
    pub fn scan_capture(&mut self, anchor: &Regex) -> Result<Vec<String>, ReportError> {
        let line = self.scan_forward(anchor)?;
        let caps = anchor
            .captures(&line)
            .ok_or_else(|| self.malformed(&line, "anchor stopped matching"))?;
        Ok(caps
            .iter()
            .skip(1)
            .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
            .collect())
    }

    /// Collect the lines strictly between `start` and `end`.
    ///
    /// End of stream before `start` is an ordinary
    /// [`ReportError::EndOfStream`]. End of stream after `start` but before
    /// `end` means the block was cut short and is reported as
    /// [`ReportError::Unterminated`].
    pub fn scan_between(&mut self, start: &Regex, end: &Regex) -> Result<Vec<String>, ReportError> {
        self.scan_forward(start)?;
        let mut lines = Vec::new();
        while let Some(line) = self.next_line()? {
            if end.is_match(&line) {
                return Ok(lines);
            }
            lines.push(line);
        }
        Err(ReportError::Unterminated {
            start: start.as_str().to_string(),
            end: end.as_str().to_string(),
        })
    }

    /// Build a [`ReportError::Malformed`] pointing at the current line.
    pub fn malformed(&self, line: &str, reason: impl Into<String>) -> ReportError {
        ReportError::Malformed {
            line_no: self.line_no,
            reason: reason.into(),
            line: line.to_string(),
        }
    }

    /// Parse one whitespace-separated field, reporting the line on failure.
    pub fn field<T: FromStr>(&self, line: &str, value: &str, what: &str) -> Result<T, ReportError> {
        value
            .parse()
            .map_err(|_| self.malformed(line, format!("invalid {what} `{value}`")))
    }
}

/// Every `{...}` group on a line, in order of appearance.
pub fn bracketed_values(line: &str) -> Vec<&str> {
    BRACKETED_RE
        .captures_iter(line)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}
