//! Streaming reader for the nodal time-history file (nodout).
//!
//! The file repeats a spaced time header followed by one 13-column row
//! per requested node. Histories can run to gigabytes, so this reader
//! hands out one sample at a time and never materializes a series; the
//! consumer keeps whatever windowed state it needs.
//!
//! A tracked-node cap bounds per-node state downstream: ids first seen
//! after the cap is reached are silently excluded.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{parse_float, parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::NodalSample;

static RE_TIME_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*at time\s+([0-9.E+\-]+)\s*\)").unwrap());
static RE_LEGEND_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s*(.*)$").unwrap());

/// One-pass pull reader over a nodout file.
pub struct NodoutReader {
    stream: LineStream,
    current_time: f64,
    in_legend: bool,
    tracked: BTreeSet<u64>,
    cap: usize,
    /// Node titles from the legend block, when present.
    pub legend: BTreeMap<u64, String>,
    pub skipped: u64,
}

impl NodoutReader {
    pub fn open(path: &Path, cap: usize, cancel: &CancelToken) -> Result<NodoutReader> {
        Ok(NodoutReader {
            stream: LineStream::open(path, cancel)?,
            current_time: 0.0,
            in_legend: false,
            tracked: BTreeSet::new(),
            cap,
            legend: BTreeMap::new(),
            skipped: 0,
        })
    }

    /// Next data row, or `None` at end of file. Malformed rows bump the
    /// skip counter and the pass continues.
    pub fn next_sample(&mut self) -> Result<Option<NodalSample>> {
        while let Some(raw) = self.stream.next_line()? {
            let line = raw.as_str();

            if line.contains("{BEGIN LEGEND}") {
                self.in_legend = true;
                continue;
            }
            if line.contains("{END LEGEND}") {
                self.in_legend = false;
                continue;
            }
            if self.in_legend {
                if let Some(m) = RE_LEGEND_ENTRY.captures(line.trim()) {
                    if let Some(id) = parse_int(&m[1]) {
                        self.legend.insert(id, m[2].trim().to_string());
                    }
                }
                continue;
            }

            let lower = line.to_ascii_lowercase();
            if lower.contains("n o d a l   p r i n t   o u t") {
                if let Some(m) = RE_TIME_HEADER.captures(line) {
                    if let Some(t) = parse_float(&m[1]) {
                        self.current_time = t;
                    }
                }
                continue;
            }
            if lower.contains("nodal point") && lower.contains("x-disp") {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 13 {
                continue;
            }
            let Some(node_id) = parse_int(fields[0]) else {
                self.skipped += 1;
                continue;
            };
            if !self.tracked.contains(&node_id) {
                if self.tracked.len() >= self.cap {
                    continue;
                }
                self.tracked.insert(node_id);
            }
            match parse_row(&fields) {
                Some((disp, vel, accel, coord)) => {
                    return Ok(Some(NodalSample {
                        node_id,
                        time: self.current_time,
                        displacement: disp,
                        velocity: vel,
                        acceleration: accel,
                        coordinate: coord,
                    }));
                }
                None => {
                    self.skipped += 1;
                    continue;
                }
            }
        }
        Ok(None)
    }
}

type Row = ([f64; 3], [f64; 3], [f64; 3], [f64; 3]);

fn parse_row(fields: &[&str]) -> Option<Row> {
    let mut values = [0.0f64; 12];
    for (slot, raw) in values.iter_mut().zip(&fields[1..13]) {
        *slot = parse_float(raw)?;
    }
    Some((
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
        [values[9], values[10], values[11]],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fixture(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodout");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    fn data_row(node: u64, vx: f64) -> String {
        format!(
            " {node}  1.0E-01 0.0E+00 0.0E+00  {vx:.4E} 0.0E+00 0.0E+00  0.0E+00 0.0E+00 0.0E+00  1.0E+00 2.0E+00 3.0E+00\n"
        )
    }

    #[test]
    fn test_nodout__legend_and_rows__then_samples_with_time() {
        let content = format!(
            "{{BEGIN LEGEND}}\n 4141 tracking point\n{{END LEGEND}}\n\
             n o d a l   p r i n t   o u t   f o r   t i m e  s t e p       1 ( at time 1.0000000E-03 )\n\
             nodal point  x-disp ...\n{}{}",
            data_row(4141, 10.0),
            data_row(4142, 20.0)
        );
        let (_dir, path) = write_fixture(&content);
        let mut reader = NodoutReader::open(&path, 100, &CancelToken::new()).unwrap();

        let first = reader.next_sample().unwrap().unwrap();
        assert_eq!(first.node_id, 4141);
        assert!((first.time - 1e-3).abs() < 1e-12);
        assert!((first.velocity[0] - 10.0).abs() < 1e-9);
        assert!((first.coordinate[2] - 3.0).abs() < 1e-9);

        let second = reader.next_sample().unwrap().unwrap();
        assert_eq!(second.node_id, 4142);
        assert!(reader.next_sample().unwrap().is_none());
        assert_eq!(reader.legend.get(&4141).unwrap(), "tracking point");
    }

    #[test]
    fn test_nodout__cap_reached__then_excess_nodes_excluded() {
        let content = format!(
            "n o d a l   p r i n t   o u t ( at time 0.0000000E+00 )\n{}{}{}",
            data_row(1, 1.0),
            data_row(2, 1.0),
            data_row(3, 1.0)
        );
        let (_dir, path) = write_fixture(&content);
        let mut reader = NodoutReader::open(&path, 2, &CancelToken::new()).unwrap();

        let mut seen = Vec::new();
        while let Some(sample) = reader.next_sample().unwrap() {
            seen.push(sample.node_id);
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_nodout__malformed_row__then_skipped_and_counted() {
        let content = format!(
            "n o d a l   p r i n t   o u t ( at time 0.0000000E+00 )\n\
             1 bad data x y z a b c d e f g h\n{}",
            data_row(2, 1.0)
        );
        let (_dir, path) = write_fixture(&content);
        let mut reader = NodoutReader::open(&path, 10, &CancelToken::new()).unwrap();

        let sample = reader.next_sample().unwrap().unwrap();
        assert_eq!(sample.node_id, 2);
        assert_eq!(reader.skipped, 1);
    }
}
