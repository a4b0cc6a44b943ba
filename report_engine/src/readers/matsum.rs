//! Reader for the material summary file (matsum).
//!
//! Per output time the solver prints a four-line block per part:
//! energies, momentum, rigid-body velocity, hourglass energy. The block
//! is keyed `mat.#=` but the ids are part ids.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use super::{parse_float, parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::MatsumRecord;

static RE_LEGEND_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\s+(.+)$").unwrap());
static RE_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"time\s*=\s*([\d.E+\-]+)").unwrap());
static RE_MAT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"mat\.#\s*=\s*(\d+)").unwrap());
static RE_KV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(inten|kinen|eroded_ie|eroded_ke|x-mom|y-mom|z-mom|x-rbv|y-rbv|z-rbv|hgeng|eroded_he)\s*=\s*(-?[\d.E+\-]+)",
    )
    .unwrap()
});

/// Parsed material summary plus part titles from the legend.
#[derive(Debug, Default)]
pub struct MatsumData {
    pub records: Vec<MatsumRecord>,
    pub legend: BTreeMap<u64, String>,
    pub skipped: u64,
}

/// Parse a matsum file in one pass.
pub fn read(path: &Path, cancel: &CancelToken) -> Result<MatsumData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = MatsumData::default();
    let mut in_legend = false;
    let mut current_time = 0.0;
    let mut current: Option<MatsumRecord> = None;

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim_end();
        let stripped = line.trim();

        if line.contains("{BEGIN LEGEND}") {
            in_legend = true;
            continue;
        }
        if line.contains("{END LEGEND}") {
            in_legend = false;
            continue;
        }
        if in_legend {
            if let Some(m) = RE_LEGEND_ENTRY.captures(stripped) {
                if let Some(id) = parse_int(&m[1]) {
                    data.legend.insert(id, m[2].trim().to_string());
                }
            }
            continue;
        }

        if stripped.starts_with("time =") {
            if let Some(m) = RE_TIME.captures(stripped) {
                if let Some(t) = parse_float(&m[1]) {
                    current_time = t;
                }
            }
            continue;
        }

        if stripped.starts_with("mat.#=") {
            if let Some(record) = current.take() {
                data.records.push(record);
            }
            match RE_MAT_ID.captures(stripped).and_then(|m| parse_int(&m[1])) {
                Some(part_id) => {
                    let mut record = MatsumRecord {
                        part_id,
                        time: current_time,
                        ..Default::default()
                    };
                    apply_fields(stripped, &mut record);
                    current = Some(record);
                }
                None => data.skipped += 1,
            }
            continue;
        }

        // Continuation lines of the open block.
        if stripped.is_empty() {
            if let Some(record) = current.take() {
                data.records.push(record);
            }
        } else if let Some(record) = current.as_mut() {
            apply_fields(stripped, record);
        }
    }
    if let Some(record) = current.take() {
        data.records.push(record);
    }
    Ok(data)
}

fn apply_fields(line: &str, record: &mut MatsumRecord) {
    for m in RE_KV.captures_iter(line) {
        let Some(value) = parse_float(&m[2]) else {
            continue;
        };
        match &m[1] {
            "inten" => record.internal_energy = value,
            "kinen" => record.kinetic_energy = value,
            "eroded_ie" => record.eroded_internal_energy = value,
            "eroded_ke" => record.eroded_kinetic_energy = value,
            "x-mom" => record.momentum[0] = value,
            "y-mom" => record.momentum[1] = value,
            "z-mom" => record.momentum[2] = value,
            "x-rbv" => record.rigid_body_velocity[0] = value,
            "y-rbv" => record.rigid_body_velocity[1] = value,
            "z-rbv" => record.rigid_body_velocity[2] = value,
            "hgeng" => record.hourglass_energy = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_matsum__blocks_per_time__then_records_keyed_part_and_time() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matsum");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(
                b"\
{BEGIN LEGEND}
 Entity #        Title
        1     bumper_beam
{END LEGEND}
 time =  1.00000E-03
 mat.#=    1             inten=   2.0000E+03     kinen=   5.0000E+04     eroded_ie=   0.0000E+00     eroded_ke=   0.0000E+00
 x-mom=   1.0000E+01     y-mom=   0.0000E+00     z-mom=   0.0000E+00
 x-rbv=   2.0000E+00     y-rbv=   0.0000E+00     z-rbv=   0.0000E+00
 hgeng=   1.0000E+01                             eroded_he=   0.0000E+00

 time =  2.00000E-03
 mat.#=    1             inten=   2.5000E+03     kinen=   4.5000E+04     eroded_ie=   0.0000E+00     eroded_ke=   0.0000E+00
 x-mom=   9.0000E+00     y-mom=   0.0000E+00     z-mom=   0.0000E+00
 x-rbv=   1.8000E+00     y-rbv=   0.0000E+00     z-rbv=   0.0000E+00
 hgeng=   1.2000E+01                             eroded_he=   0.0000E+00
",
            )
            .unwrap();

        let data = read(&path, &CancelToken::new()).unwrap();
        assert_eq!(data.records.len(), 2);
        assert_eq!(data.legend.get(&1).unwrap(), "bumper_beam");

        let first = &data.records[0];
        assert_eq!(first.part_id, 1);
        assert!((first.time - 1e-3).abs() < 1e-12);
        assert!((first.internal_energy - 2000.0).abs() < 1e-6);
        assert!((first.momentum[0] - 10.0).abs() < 1e-9);
        assert!((first.rigid_body_velocity[0] - 2.0).abs() < 1e-9);
        assert!((first.hourglass_energy - 10.0).abs() < 1e-9);

        let second = &data.records[1];
        assert!((second.time - 2e-3).abs() < 1e-12);
        assert!((second.hourglass_energy - 12.0).abs() < 1e-9);
    }
}
