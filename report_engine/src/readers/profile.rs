//! Readers for the per-processor profiling CSVs.
//!
//! load_profile.csv: a quoted section banner, a column header, then one
//! 15-column row per rank; the absolute-seconds section is followed by
//! a percentage section. cont_profile.csv is similar but the header row
//! lists interface ids instead of fixed component names.

use std::path::Path;

use super::{parse_float, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::{ContProfileEntry, LoadProfileEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Absolute,
    Percentage,
}

/// Both sections of load_profile.csv.
#[derive(Debug, Default)]
pub struct LoadProfileData {
    pub absolute: Vec<LoadProfileEntry>,
    pub percentage: Vec<LoadProfileEntry>,
    pub skipped: u64,
}

/// Both sections of cont_profile.csv.
#[derive(Debug, Default)]
pub struct ContProfileData {
    pub absolute: Vec<ContProfileEntry>,
    pub percentage: Vec<ContProfileEntry>,
    pub skipped: u64,
}

/// Parse load_profile.csv.
pub fn read_load_profile(path: &Path, cancel: &CancelToken) -> Result<LoadProfileData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = LoadProfileData::default();
    let mut section = Section::None;
    let mut proc_id = 0u32;

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim();
        if line.is_empty() {
            if section == Section::Absolute && !data.absolute.is_empty() {
                section = Section::None;
                proc_id = 0;
            }
            continue;
        }
        if line.contains("\"Clock (seconds)\"") {
            section = Section::Absolute;
            proc_id = 0;
            continue;
        }
        if line.contains("\"Clock and percentage(%)\"") {
            section = Section::Percentage;
            proc_id = 0;
            continue;
        }
        if line.starts_with('"') || line.starts_with("Solids") {
            continue;
        }
        if section == Section::None {
            continue;
        }

        let values: Vec<&str> = line.split(',').collect();
        if values.len() < 15 {
            data.skipped += 1;
            continue;
        }
        let v = |i: usize| parse_float(values[i]).unwrap_or(0.0);
        let entry = LoadProfileEntry {
            processor_id: proc_id,
            solids: v(0),
            shells: v(1),
            tshells: v(2),
            beams: v(3),
            sph: v(4),
            e_other: v(5),
            force_shr: v(6),
            tstep_shr: v(7),
            swtch_shr: v(8),
            matrl_shr: v(9),
            elmnt_shr: v(10),
            time_step: v(11),
            contact: v(12),
            rigid_bdy: v(13),
            others: v(14),
        };
        match section {
            Section::Absolute => data.absolute.push(entry),
            Section::Percentage => data.percentage.push(entry),
            Section::None => unreachable!(),
        }
        proc_id += 1;
    }
    Ok(data)
}

/// Parse cont_profile.csv.
pub fn read_cont_profile(path: &Path, cancel: &CancelToken) -> Result<ContProfileData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = ContProfileData::default();
    let mut section = Section::None;
    let mut interface_ids: Vec<u64> = Vec::new();
    let mut proc_id = 0u32;

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim();
        if line.is_empty() {
            if section == Section::Absolute && !data.absolute.is_empty() {
                section = Section::None;
                proc_id = 0;
                interface_ids.clear();
            }
            continue;
        }
        if line.contains("\"Clock (seconds)\"") {
            section = Section::Absolute;
            proc_id = 0;
            continue;
        }
        if line.contains("\"Clock percentage(%)\"") {
            section = Section::Percentage;
            proc_id = 0;
            continue;
        }
        if line.starts_with('"') {
            continue;
        }
        if section == Section::None {
            continue;
        }

        if interface_ids.is_empty() {
            interface_ids = line
                .split(',')
                .filter_map(|x| x.trim().parse::<u64>().ok())
                .collect();
            if interface_ids.is_empty() {
                data.skipped += 1;
            }
            continue;
        }

        let values: Vec<&str> = line.split(',').collect();
        let mut entry = ContProfileEntry {
            processor_id: proc_id,
            ..Default::default()
        };
        for (i, &interface) in interface_ids.iter().enumerate() {
            if let Some(raw_value) = values.get(i) {
                entry
                    .interface_timings
                    .insert(interface, parse_float(raw_value).unwrap_or(0.0));
            }
        }
        match section {
            Section::Absolute => data.absolute.push(entry),
            Section::Percentage => data.percentage.push(entry),
            Section::None => unreachable!(),
        }
        proc_id += 1;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fixture(name: &str, content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_profile__both_sections__then_rank_order_preserved() {
        let content = "\
\"Clock (seconds)\"
Solids,Shells,TShells,Beams,SPH,E_Other,Force_Shr,TStep_Shr,Swtch_Shr,Matrl_Shr,Elmnt_Shr,Time_Step,Contact,Rigid_Bdy,Others
10.0,5.0,0,0,0,0,2.0,1.0,0,0,0,3.0,8.0,0,1.0
11.0,4.5,0,0,0,0,2.1,1.1,0,0,0,3.1,8.2,0,1.1

\"Clock and percentage(%)\"
Solids,Shells,TShells,Beams,SPH,E_Other,Force_Shr,TStep_Shr,Swtch_Shr,Matrl_Shr,Elmnt_Shr,Time_Step,Contact,Rigid_Bdy,Others
33.0,16.0,0,0,0,0,6.0,3.0,0,0,0,10.0,27.0,0,5.0
";
        let (_dir, path) = write_fixture("load_profile.csv", content);
        let data = read_load_profile(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.absolute.len(), 2);
        assert_eq!(data.percentage.len(), 1);
        assert_eq!(data.absolute[1].processor_id, 1);
        assert!((data.absolute[0].solids - 10.0).abs() < 1e-9);
        assert!((data.absolute[1].contact - 8.2).abs() < 1e-9);
        assert!((data.percentage[0].contact - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_profile__short_row__then_skip_counted() {
        let content = "\
\"Clock (seconds)\"
1.0,2.0,3.0
";
        let (_dir, path) = write_fixture("load_profile.csv", content);
        let data = read_load_profile(&path, &CancelToken::new()).unwrap();
        assert!(data.absolute.is_empty());
        assert_eq!(data.skipped, 1);
    }

    #[test]
    fn test_cont_profile__interface_header_row__then_timings_keyed_by_id() {
        let content = "\
\"Clock (seconds)\"
0000000010,0000000011
12.5,3.5
11.0,4.0
";
        let (_dir, path) = write_fixture("cont_profile.csv", content);
        let data = read_cont_profile(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.absolute.len(), 2);
        let rank0 = &data.absolute[0];
        assert!((rank0.interface_timings.get(&10).unwrap() - 12.5).abs() < 1e-9);
        assert!((rank0.interface_timings.get(&11).unwrap() - 3.5).abs() < 1e-9);
        assert_eq!(data.absolute[1].processor_id, 1);
    }
}
