//! Reader for the global-statistics file (glstat).
//!
//! Cycle blocks open with a `dt of cycle N is controlled by ...` line
//! and carry one dotted `field.... value` line per energy component.
//! Field names overlap as substrings ("total energy" is a prefix of
//! "total energy / initial energy"), so matching walks an ordered list
//! from most specific to least.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

use super::{parse_float, parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::{ElementKind, EnergySample};

static RE_DT_CYCLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"dt of cycle\s+(\d+)\s+is controlled by\s+(\w+)\s+(\d+)\s+of part\s+(\d+)").unwrap()
});
static RE_ENERGY_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([\w\s/().]+?)\.{2,}\s+(-?[\d.E+\-]+)\s*$").unwrap());

/// Most specific first; the first substring hit wins.
const FIELD_MAP_ORDERED: &[(&str, &str)] = &[
    ("total energy / initial energy", "energy_ratio"),
    ("energy ratio w/o eroded energy", "energy_ratio_no_eroded"),
    ("eroded kinetic energy", "eroded_kinetic"),
    ("eroded internal energy", "eroded_internal"),
    ("eroded hourglass energy", "eroded_hourglass"),
    ("spring and damper energy", "spring_damper"),
    ("sliding interface energy", "sliding_interface"),
    ("system damping energy", "system_damping"),
    ("time per zone cycle", "zone_ns"),
    ("kinetic energy", "kinetic"),
    ("internal energy", "internal"),
    ("hourglass energy", "hourglass"),
    ("total energy", "total"),
    ("external work", "external_work"),
    ("global x velocity", "vx"),
    ("global y velocity", "vy"),
    ("global z velocity", "vz"),
    ("time step", "timestep"),
    ("time", "time"),
];

/// Parsed energy history plus the count of dropped blocks.
#[derive(Debug, Default)]
pub struct GlstatData {
    pub samples: Vec<EnergySample>,
    pub skipped: u64,
}

/// Parse the energy-balance history in one streaming pass.
pub fn read(path: &Path, cancel: &CancelToken) -> Result<GlstatData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = GlstatData::default();
    let mut cycle_info: Option<(u64, ElementKind, u64, u64)> = None;
    let mut fields: BTreeMap<&'static str, f64> = BTreeMap::new();
    let mut in_block = false;

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim_end();

        if let Some(m) = RE_DT_CYCLE.captures(line) {
            flush_block(&mut data, &cycle_info, &mut fields);
            cycle_info = Some((
                parse_int(&m[1]).unwrap_or(0),
                ElementKind::parse(&m[2]),
                parse_int(&m[3]).unwrap_or(0),
                parse_int(&m[4]).unwrap_or(0),
            ));
            in_block = true;
            continue;
        }

        if in_block {
            if let Some(m) = RE_ENERGY_FIELD.captures(line) {
                let name = m[1].trim().to_ascii_lowercase();
                if let Some(value) = parse_float(&m[2]) {
                    for &(key, attr) in FIELD_MAP_ORDERED {
                        if name.contains(key) {
                            fields.insert(attr, value);
                            break;
                        }
                    }
                }
            }
        }
    }

    flush_block(&mut data, &cycle_info, &mut fields);
    tracing::debug!(samples = data.samples.len(), skipped = data.skipped, "glstat pass complete");
    Ok(data)
}

fn flush_block(
    data: &mut GlstatData,
    cycle_info: &Option<(u64, ElementKind, u64, u64)>,
    fields: &mut BTreeMap<&'static str, f64>,
) {
    if fields.is_empty() {
        return;
    }
    match build_sample(cycle_info, fields) {
        Some(sample) => data.samples.push(sample),
        None => data.skipped += 1,
    }
    fields.clear();
}

fn build_sample(
    cycle_info: &Option<(u64, ElementKind, u64, u64)>,
    fields: &BTreeMap<&'static str, f64>,
) -> Option<EnergySample> {
    let (cycle, kind, element, part) = (*cycle_info)?;
    let get = |key: &str| fields.get(key).copied().unwrap_or(0.0);
    Some(EnergySample {
        cycle,
        time: get("time"),
        timestep: get("timestep"),
        kinetic: get("kinetic"),
        internal: get("internal"),
        spring_damper: get("spring_damper"),
        hourglass: get("hourglass"),
        system_damping: get("system_damping"),
        sliding_interface: get("sliding_interface"),
        external_work: get("external_work"),
        eroded_kinetic: get("eroded_kinetic"),
        eroded_internal: get("eroded_internal"),
        eroded_hourglass: get("eroded_hourglass"),
        total: get("total"),
        energy_ratio: fields.get("energy_ratio").copied().unwrap_or(1.0),
        energy_ratio_no_eroded: fields.get("energy_ratio_no_eroded").copied().unwrap_or(1.0),
        global_velocity: [get("vx"), get("vy"), get("vz")],
        controlling_element_kind: kind,
        controlling_element: element,
        controlling_part: part,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fixture(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glstat");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    fn block(cycle: u64, time: f64, kinetic: f64, internal: f64, ratio: f64) -> String {
        format!(
            " dt of cycle {cycle} is controlled by shell 7710 of part 5\n\
             \n\
             time...................... {time:.4E}\n\
             time step................. 1.0000E-06\n\
             kinetic energy............ {kinetic:.4E}\n\
             internal energy........... {internal:.4E}\n\
             hourglass energy.......... 1.0000E+02\n\
             sliding interface energy.. 2.0000E+02\n\
             external work............. 0.0000E+00\n\
             total energy.............. {:.4E}\n\
             total energy / initial energy. 0.0000E+00\n\
             total energy / initial energy.. {ratio:.4E}\n\
             global x velocity......... 5.0000E+00\n",
            kinetic + internal
        )
    }

    #[test]
    fn test_glstat__two_blocks__then_two_samples_in_order() {
        let content = format!(
            "{}{}",
            block(100, 1e-3, 5.0e5, 1.0e5, 1.001),
            block(200, 2e-3, 4.8e5, 1.2e5, 1.002)
        );
        let (_dir, path) = write_fixture(&content);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.samples.len(), 2);
        assert_eq!(data.samples[0].cycle, 100);
        assert_eq!(data.samples[1].cycle, 200);
        assert!((data.samples[1].energy_ratio - 1.002).abs() < 1e-9);
        assert_eq!(data.samples[0].controlling_element, 7710);
        assert_eq!(data.samples[0].controlling_element_kind, ElementKind::Shell);
    }

    #[test]
    fn test_glstat__specific_field_wins__then_ratio_not_total() {
        let content = block(1, 0.0, 1.0, 1.0, 1.5);
        let (_dir, path) = write_fixture(&content);
        let data = read(&path, &CancelToken::new()).unwrap();

        let sample = &data.samples[0];
        assert!((sample.energy_ratio - 1.5).abs() < 1e-9);
        assert!((sample.total - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_glstat__block_without_numeric_fields__then_skipped_counted() {
        let content = "\
 dt of cycle 100 is controlled by shell 1 of part 1
 garbage line without dots
 dt of cycle 200 is controlled by shell 1 of part 1
 kinetic energy............ 1.0000E+00
";
        let (_dir, path) = write_fixture(content);
        let data = read(&path, &CancelToken::new()).unwrap();

        // First block had no parseable fields and produces nothing;
        // only the second yields a sample.
        assert_eq!(data.samples.len(), 1);
        assert_eq!(data.samples[0].cycle, 200);
    }

    #[test]
    fn test_glstat__missing_file_handled_by_caller__then_open_errors() {
        let dir = TempDir::new().unwrap();
        let result = read(&dir.path().join("glstat"), &CancelToken::new());
        assert!(result.is_err());
    }
}
