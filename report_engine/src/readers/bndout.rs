//! Streaming reader for the boundary force/energy file (bndout).
//!
//! Spaced `n o d a l   f o r c e ... t= <time>` headers introduce one
//! `nd#` key-value row per constrained node. Same pull model as the
//! nodout reader: one sample out per call, bounded state.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

use super::{parse_float, parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::BoundarySample;

static RE_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"t\s*=\s*([0-9.E+\-]+)").unwrap());
static RE_NODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"nd#\s+(\d+)").unwrap());
static RE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(xforce|yforce|zforce|energy|xmoment|ymoment|zmoment)\s*=\s*(-?[0-9.E+\-]+)").unwrap());

/// One-pass pull reader over a bndout file.
pub struct BndoutReader {
    stream: LineStream,
    current_time: f64,
    tracked: BTreeSet<u64>,
    cap: usize,
    pub skipped: u64,
}

impl BndoutReader {
    pub fn open(path: &Path, cap: usize, cancel: &CancelToken) -> Result<BndoutReader> {
        Ok(BndoutReader {
            stream: LineStream::open(path, cancel)?,
            current_time: 0.0,
            tracked: BTreeSet::new(),
            cap,
            skipped: 0,
        })
    }

    /// Next force row, or `None` at end of file.
    pub fn next_sample(&mut self) -> Result<Option<BoundarySample>> {
        while let Some(raw) = self.stream.next_line()? {
            let line = raw.as_str();
            let lower = line.to_ascii_lowercase();

            if lower.contains("n o d a l   f o r c e") && line.contains(" t=") {
                if let Some(m) = RE_TIME.captures(line) {
                    if let Some(t) = parse_float(&m[1]) {
                        self.current_time = t;
                    }
                }
                continue;
            }

            if !line.trim_start().starts_with("nd#") {
                continue;
            }
            let Some(node_id) = RE_NODE.captures(line).and_then(|m| parse_int(&m[1])) else {
                self.skipped += 1;
                continue;
            };
            if !self.tracked.contains(&node_id) {
                if self.tracked.len() >= self.cap {
                    continue;
                }
                self.tracked.insert(node_id);
            }

            let mut sample = BoundarySample {
                node_id,
                time: self.current_time,
                force: [0.0; 3],
                energy: 0.0,
                moment: [0.0; 3],
            };
            let mut parsed_any = false;
            for m in RE_FIELD.captures_iter(line) {
                let Some(value) = parse_float(&m[2]) else {
                    continue;
                };
                parsed_any = true;
                match &m[1] {
                    "xforce" => sample.force[0] = value,
                    "yforce" => sample.force[1] = value,
                    "zforce" => sample.force[2] = value,
                    "energy" => sample.energy = value,
                    "xmoment" => sample.moment[0] = value,
                    "ymoment" => sample.moment[1] = value,
                    _ => sample.moment[2] = value,
                }
            }
            if !parsed_any {
                self.skipped += 1;
                continue;
            }
            return Ok(Some(sample));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fixture(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bndout");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    #[test]
    fn test_bndout__header_and_row__then_sample_with_fields() {
        let content = "\
 n o d a l   f o r c e/e n e r g y    o u t p u t  t=   2.50000E-03
 nd#    4513  xforce=   1.0000E+00   yforce=   0.0000E+00  zforce=  -2.0000E+00   energy=   2.1673E-08 xmoment=   0.0000E+00 ymoment=   3.0000E-01 zmoment=   0.0000E+00
";
        let (_dir, path) = write_fixture(content);
        let mut reader = BndoutReader::open(&path, 100, &CancelToken::new()).unwrap();

        let sample = reader.next_sample().unwrap().unwrap();
        assert_eq!(sample.node_id, 4513);
        assert!((sample.time - 2.5e-3).abs() < 1e-12);
        assert!((sample.force[0] - 1.0).abs() < 1e-9);
        assert!((sample.force[2] + 2.0).abs() < 1e-9);
        assert!((sample.moment[1] - 0.3).abs() < 1e-9);
        assert!((sample.force_magnitude() - 5.0f64.sqrt()).abs() < 1e-9);
        assert!(reader.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_bndout__row_without_fields__then_skip_counted() {
        let content = " nd#    12  no data here\n";
        let (_dir, path) = write_fixture(content);
        let mut reader = BndoutReader::open(&path, 100, &CancelToken::new()).unwrap();
        assert!(reader.next_sample().unwrap().is_none());
        assert_eq!(reader.skipped, 1);
    }
}
