//! Reader for per-rank message logs (messag, mes0000, mes0001, ...).
//!
//! Each MPI rank writes its own log. Files are parsed independently;
//! merging across ranks is the aggregator's job. Discovery scans the
//! zero-padded suffixes upward and stops after a configurable run of
//! missing files, so a sparse directory never triggers an unbounded
//! probe.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;

static RE_WARNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\*\*\s+Warning\s+(\d+)").unwrap());
static RE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\*\*\s+Error\s+(\d+)").unwrap());
static RE_INIT_PENETRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s+initial penetrations? (?:were|was) found for interface\s+(\d+)").unwrap()
});
static RE_NORMAL_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"N o r m a l\s+t e r m i n a t i o n").unwrap());
static RE_ERROR_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"E r r o r\s+t e r m i n a t i o n").unwrap());
static RE_MEMORY_EXPAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:expanding|allocating|contracting)\s+memory to\s+(\d+)\s+d\s+(\d+)").unwrap()
});
static RE_INTF_WARN_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Summary of warning messages for interface # =\s+(\d+)").unwrap());
static RE_INTF_WARN_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of warning messages\s+=\s+(\d+)").unwrap());
static RE_FAILED_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)element\s*#?\s*(\d+)").unwrap());
static RE_FAILED_CYCLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"cycle\s+(\d+)").unwrap());

/// Element that dropped out of the stable regime, with where it happened.
#[derive(Debug, Clone)]
pub struct FailedElementEvent {
    pub element_id: u64,
    pub cycle: Option<u64>,
    pub rank: Option<u32>,
    pub line: String,
}

/// Parsed data from one message log.
#[derive(Debug, Default)]
pub struct MessagData {
    /// None for the serial `messag` file.
    pub rank: Option<u32>,
    pub warning_counts: BTreeMap<u32, u64>,
    pub error_counts: BTreeMap<u32, u64>,
    /// interface id -> reported initial penetration count.
    pub initial_penetrations: BTreeMap<u64, u64>,
    /// interface id -> warning total from the solver's own summary.
    pub interface_warning_counts: BTreeMap<u64, u64>,
    pub negative_volume_events: Vec<FailedElementEvent>,
    pub constraint_nan_lines: Vec<String>,
    pub normal_termination: bool,
    pub error_termination: bool,
    pub max_memory_words: u64,
}

/// Find the message logs for a run: `messag` plus zero-padded `mesNNNN`
/// siblings, scanned upward until `gap` consecutive suffixes are absent.
pub fn discover(dir: &Path, gap: u32) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let serial = dir.join("messag");
    if serial.is_file() {
        found.push(serial);
    }
    let mut missing = 0u32;
    let mut suffix = 0u32;
    while missing < gap {
        let candidate = dir.join(format!("mes{suffix:04}"));
        if candidate.is_file() {
            found.push(candidate);
            missing = 0;
        } else {
            missing += 1;
        }
        suffix += 1;
    }
    found
}

/// Parse one message log in a single pass.
pub fn read(path: &Path, cancel: &CancelToken) -> Result<MessagData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = MessagData {
        rank: rank_from_name(path),
        ..Default::default()
    };
    let mut pending_interface: Option<u64> = None;

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim_end();

        if let Some(m) = RE_WARNING.captures(line) {
            let code = parse_int(&m[1]).unwrap_or(0) as u32;
            *data.warning_counts.entry(code).or_insert(0) += 1;
            continue;
        }
        if let Some(m) = RE_ERROR.captures(line) {
            let code = parse_int(&m[1]).unwrap_or(0) as u32;
            *data.error_counts.entry(code).or_insert(0) += 1;
            continue;
        }

        let lower = line.to_ascii_lowercase();
        if lower.contains("negative volume") {
            if let Some(m) = RE_FAILED_ELEMENT.captures(line) {
                data.negative_volume_events.push(FailedElementEvent {
                    element_id: parse_int(&m[1]).unwrap_or(0),
                    cycle: RE_FAILED_CYCLE
                        .captures(line)
                        .and_then(|c| parse_int(&c[1])),
                    rank: data.rank,
                    line: line.trim().to_string(),
                });
            }
            continue;
        }
        if lower.contains("constraint matrix") && lower.contains("nan") {
            data.constraint_nan_lines.push(line.trim().to_string());
            continue;
        }

        if let Some(m) = RE_INIT_PENETRATION.captures(line) {
            let count = parse_int(&m[1]).unwrap_or(0);
            let interface = parse_int(&m[2]).unwrap_or(0);
            data.initial_penetrations.insert(interface, count);
        }

        if let Some(m) = RE_INTF_WARN_SUMMARY.captures(line) {
            pending_interface = parse_int(&m[1]);
            continue;
        }
        if let Some(interface) = pending_interface {
            if let Some(m) = RE_INTF_WARN_COUNT.captures(line) {
                data.interface_warning_counts
                    .insert(interface, parse_int(&m[1]).unwrap_or(0));
                pending_interface = None;
            } else if !line.trim().is_empty() {
                pending_interface = None;
            }
        }

        if RE_NORMAL_TERM.is_match(line) {
            data.normal_termination = true;
        }
        if RE_ERROR_TERM.is_match(line) {
            data.error_termination = true;
        }

        if let Some(m) = RE_MEMORY_EXPAND.captures(line) {
            let words = parse_int(&m[2]).unwrap_or(0);
            data.max_memory_words = data.max_memory_words.max(words);
        }
    }

    Ok(data)
}

fn rank_from_name(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let suffix = name.strip_prefix("mes")?;
    suffix.parse::<u32>().ok()
}
