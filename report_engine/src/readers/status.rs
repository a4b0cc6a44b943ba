//! Reader for status.out progress estimates.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::StatusInfo;

static RE_CPU_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cpu time per zone cycle\.+\s+(\d+)\s+nanoseconds").unwrap());
static RE_AVG_CPU_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"average cpu time per zone cycle\.+\s+(\d+)\s+nanoseconds").unwrap());
static RE_AVG_CLOCK_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"average clock time per zone cycle\.+\s+(\d+)\s+nanoseconds").unwrap());
static RE_EST_TOTAL_CPU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"estimated total cpu time\s+=\s+(\d+)\s+sec").unwrap());
static RE_EST_CPU_REMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"estimated cpu time to complete\s+=\s+(\d+)\s+sec").unwrap());
static RE_EST_TOTAL_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"estimated total clock time\s+=\s+(\d+)\s+sec").unwrap());
static RE_EST_CLOCK_REMAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"estimated clock time to complete\s+=\s+(\d+)\s+sec").unwrap());

/// Parse status.out; later occurrences of a figure overwrite earlier
/// ones, so the result reflects the last progress report.
pub fn read(path: &Path, cancel: &CancelToken) -> Result<StatusInfo> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut info = StatusInfo::default();

    while let Some(raw) = stream.next_line()? {
        let line = raw.to_ascii_lowercase();
        // "average cpu time" also matches the plain "cpu time" pattern;
        // check the specific one first.
        if let Some(m) = RE_AVG_CPU_ZONE.captures(&line) {
            info.avg_cpu_per_zone_ns = parse_int(&m[1]).unwrap_or(0);
        } else if let Some(m) = RE_CPU_ZONE.captures(&line) {
            info.cpu_per_zone_ns = parse_int(&m[1]).unwrap_or(0);
        }
        if let Some(m) = RE_AVG_CLOCK_ZONE.captures(&line) {
            info.avg_clock_per_zone_ns = parse_int(&m[1]).unwrap_or(0);
        }
        if let Some(m) = RE_EST_TOTAL_CPU.captures(&line) {
            info.est_total_cpu_sec = parse_int(&m[1]).unwrap_or(0);
        }
        if let Some(m) = RE_EST_CPU_REMAIN.captures(&line) {
            info.est_cpu_remain_sec = parse_int(&m[1]).unwrap_or(0);
        }
        if let Some(m) = RE_EST_TOTAL_CLOCK.captures(&line) {
            info.est_total_clock_sec = parse_int(&m[1]).unwrap_or(0);
        }
        if let Some(m) = RE_EST_CLOCK_REMAIN.captures(&line) {
            info.est_clock_remain_sec = parse_int(&m[1]).unwrap_or(0);
        }
    }
    Ok(info)
}
