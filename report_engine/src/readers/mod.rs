//! Streaming readers for solver output files.
//!
//! One module per file family. Every reader makes a single forward pass
//! over its file with a `BufReader`, keeps bounded state, counts
//! malformed records instead of failing, and polls the cancel token
//! between records.

pub mod bndout;
pub mod d3hsp;
pub mod glstat;
pub mod matsum;
pub mod messag;
pub mod nodout;
pub mod profile;
pub mod status;

use crate::cancel::CancelToken;
use crate::error::{EngineError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Lines between cancellation polls.
const CANCEL_POLL_INTERVAL: u64 = 1024;

/// Line iterator over a solver text file with periodic cancel checks.
pub(crate) struct LineStream {
    lines: Lines<BufReader<File>>,
    cancel: CancelToken,
    count: u64,
}

impl LineStream {
    pub fn open(path: &Path, cancel: &CancelToken) -> Result<LineStream> {
        let file = File::open(path)?;
        Ok(LineStream {
            lines: BufReader::new(file).lines(),
            cancel: cancel.clone(),
            count: 0,
        })
    }

    /// Next line, or `None` at end of file. Undecodable bytes are
    /// replaced rather than treated as errors.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        self.count += 1;
        if self.count % CANCEL_POLL_INTERVAL == 0 && self.cancel.is_cancelled() {
            return Err(EngineError::Aborted);
        }
        match self.lines.next() {
            Some(Ok(line)) => Ok(Some(line)),
            // Solver logs occasionally hold stray non-UTF8 bytes; skip
            // the line rather than kill the pass.
            Some(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => Ok(Some(String::new())),
            Some(Err(e)) => Err(EngineError::Io(e)),
            None => Ok(None),
        }
    }
}

/// Fortran-style float parse; returns `None` on anything unparseable.
pub(crate) fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

pub(crate) fn parse_int(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_float__scientific_notation__then_parses() {
        assert_eq!(parse_float(" 1.234E-05 "), Some(1.234e-5));
        assert_eq!(parse_float("bogus"), None);
    }

    #[test]
    fn test_line_stream__cancelled__then_aborts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        for i in 0..5000 {
            writeln!(f, "line {i}").unwrap();
        }
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut stream = LineStream::open(&path, &cancel).unwrap();
        let mut aborted = false;
        loop {
            match stream.next_line() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(EngineError::Aborted) => {
                    aborted = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(aborted);
    }
}
