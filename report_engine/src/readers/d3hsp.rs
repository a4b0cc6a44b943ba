//! Reader for the high-speed-printer log (d3hsp).
//!
//! The file is one long append-only transcript: banner header, keyword
//! counts, control information, part definitions, contact interfaces,
//! then the bulk of the run (warnings, energy blocks, smallest-timestep
//! tables) and a timing/termination tail. A section state machine walks
//! it in a single pass; the body states gate expensive regexes behind
//! cheap substring checks because that part of the file can run to
//! millions of lines.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{parse_float, parse_int, LineStream};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::model::{
    ContactDefinition, ContactTiming, DecompMetrics, ElementKind, EnergySample, MassProperty,
    ModelSummary, PartDefinition, PhaseTiming, ProcessorTiming, SolverHeader, Termination,
    TerminationStatus, TimestepRecord,
};

// Header banner fields are boxed in `| key : value |` rows.
static RE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Version\s*:\s*(.+?)\s*\|").unwrap());
static RE_REVISION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Revision\s*:\s*(.+?)\s*\|").unwrap());
static RE_PLATFORM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Platform\s+:\s*(.+?)\s*\|").unwrap());
static RE_OS_LEVEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+OS Level\s+:\s*(.+?)\s*\|").unwrap());
static RE_COMPILER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Compiler\s+:\s*(.+?)\s*\|").unwrap());
static RE_HOSTNAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Hostname\s+:\s*(.+?)\s*\|").unwrap());
static RE_PRECISION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Precision\s+:\s*(.+?)\s*\|").unwrap());
static RE_LICENSEE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|\s+Licensed to:\s*(.+?)\s*\|").unwrap());
static RE_RUN_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+Date:\s+(\S+)\s+Time:\s+(\S+)").unwrap());
static RE_INPUT_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Input file:\s*(\S+)").unwrap());
static RE_CMD_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Command line options:\s*i=(\S+)").unwrap());
static RE_MPP_PROCS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:MPP|Parallel)\s+execution with\s+(\d+)\s+(?:MPP\s+)?procs?").unwrap());

static RE_KEYWORD_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"total # of \*([A-Za-z_0-9/,\.\+\-\(\)\s]+?)\.{2,}\s+(\d+)").unwrap());

static RE_NUM_MATERIALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of materials or property sets\.+\s+(\d+)").unwrap());
static RE_NUM_NODES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of nodal\+scalar points\.+\s+(\d+)").unwrap());
static RE_NUM_SOLIDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of solid elements\.+\s+(\d+)").unwrap());
static RE_NUM_SHELLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of shell elements\.+\s+(\d+)").unwrap());
static RE_NUM_BEAMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of beam elements\.+\s+(\d+)").unwrap());
static RE_NUM_TSHELLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of thick shell elements\.+\s+(\d+)").unwrap());
static RE_NUM_SPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of SPH particles\.+\s+(\d+)").unwrap());
static RE_NUM_CONTACTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"number of number of contact definitions\.+\s+(\d+)").unwrap());
static RE_NUM_SPC: Lazy<Regex> = Lazy::new(|| Regex::new(r"number of spc nodes\.+\s+(\d+)").unwrap());

static RE_TERM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"termination time\.+\s+([\d.E+\-]+)").unwrap());
static RE_TSSFAC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time step scale factor\.+\s+([\d.E+\-]+)").unwrap());
static RE_DT2MS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time step size for mass scaled solution.*?\.+\s+([\d.E+\-]+)").unwrap());
static RE_TSMIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"reduction factor for minimum time step.*?\.+\s+([\d.E+\-]+)").unwrap());

static RE_PART_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*{60,}").unwrap());
static RE_PART_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"part\s+id\s*\.+\s*(\d+)").unwrap());
static RE_SECTION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"section\s+id\s*\.+\s*(\d+)").unwrap());
static RE_MATERIAL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"material\s+id\s*\.+\s*(\d+)").unwrap());
static RE_MATERIAL_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"material type\s*\.+\s*(\d+)").unwrap());
static RE_HG_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"hourglass type\s*\.+\s*(\d+)").unwrap());
static RE_DENSITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"density\s*\.+\s*=\s*([\d.E+\-]+)").unwrap());
static RE_HG_COEFF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"hourglass coefficient\s*\.+\s*=\s*([\d.E+\-]+)").unwrap());
static RE_YOUNGS_MOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+e\s+\.+\s*=\s*([\d.E+\-]+)").unwrap());
static RE_POISSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"vnu\s*\.+\s*=\s*([\d.E+\-]+)").unwrap());

static RE_CONTACT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Contact Interface\s+(\d+)").unwrap());
static RE_CONTACT_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"contact type\.+\s+(\d+)").unwrap());
static RE_CONTACT_SUMMARY_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+(\d+)\s+(\d+)\s+([oa]?\s*\d+)\s+(.*?)\s*$").unwrap());

static RE_WARNING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\*\*\s+Warning\s+(\d+)").unwrap());
static RE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\*\*\s+Error\s+(\d+)").unwrap());
static RE_TIED_INTERFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tied interface #\s*=\s*(\d+)").unwrap());

static RE_DT_CYCLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"dt of cycle\s+(\d+)\s+is controlled by\s+(\w+)\s+(\d+)\s+of part\s+(\d+)").unwrap()
});
static RE_ENERGY_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([\w\s/().]+?)\.{2,}\s+(-?[\d.E+\-]+)\s*$").unwrap());

static RE_SMALLEST_TS_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(solid|shell|beam|tshell)\s+(\d+)\s+(\d+)\s+([\d.E+\-]+)").unwrap());

static RE_TIMING_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{1,2}(\S.*?)\s*\.{2,}\s*([\d.E+\-]+)\s+([\d.]+)\s+([\d.E+\-]+)\s+([\d.]+)").unwrap()
});
static RE_INTERF_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s+Interf\.\s+ID\s+(\d+)\s+([\d.E+\-]+)\s+([\d.]+)\s+([\d.E+\-]+)\s+([\d.]+)").unwrap()
});
static RE_CPU_PROC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\s+(\d+)\s+(\S+)\s+([\d.]+)\s+([\d.E+\-]+)").unwrap());

static RE_DECOMP_MIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"Minumum:\s+([\d.E+\-]+)").unwrap());
static RE_DECOMP_MAX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Maximum:\s+([\d.E+\-]+)").unwrap());
static RE_DECOMP_STDDEV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Standard Deviation:\s+([\d.E+\-]+)").unwrap());
static RE_DECOMP_MEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Memory required for decomposition\s+:\s+(\d+)").unwrap());
static RE_DECOMP_DYN_MEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Additional dynamic memory required\s+:\s+(\d+)").unwrap());

static RE_MASS_PART_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"m a s s\s+p r o p e r t i e s\s+o f\s+p a r t\s*#\s*(\d+)").unwrap());
static RE_MASS_TOTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"total mass of part\s+=\s+([\d.E+\-]+)").unwrap());
static RE_MASS_CENTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([xyz])-coordinate of mass center\s*=\s*(-?[\d.E+\-]+)").unwrap());
static RE_MASS_INERTIA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"i(11|22|33)\s*=\s*([\d.E+\-]+)").unwrap());

static RE_PROBLEM_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Problem time\s+=\s+([\d.E+\-]+)").unwrap());
static RE_PROBLEM_CYCLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Problem cycle\s+=\s+(\d+)").unwrap());
static RE_TOTAL_CPU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Total CPU time\s+=\s+(\d+)\s+seconds").unwrap());
static RE_CPU_PER_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CPU time per zone cycle\s*=\s+([\d.]+)\s+nanoseconds").unwrap());
static RE_CLOCK_PER_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Clock time per zone cycle\s*=\s+([\d.]+)\s+nanoseconds").unwrap());
static RE_START_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Start time\s+(\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2})").unwrap());
static RE_END_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"End time\s+(\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2})").unwrap());
static RE_ELAPSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Elapsed time\s+(\d+)\s+seconds").unwrap());

/// Everything one pass over the printer log yields.
#[derive(Debug, Default)]
pub struct D3hspData {
    pub header: SolverHeader,
    pub model: ModelSummary,
    pub termination: Termination,
    pub parts: Vec<PartDefinition>,
    pub contact_definitions: Vec<ContactDefinition>,
    pub contact_types: BTreeMap<u64, u32>,
    pub warning_counts: BTreeMap<u32, u64>,
    pub warning_messages: BTreeMap<u32, String>,
    pub warning_interfaces: BTreeMap<u32, BTreeSet<u64>>,
    pub error_counts: BTreeMap<u32, u64>,
    pub energy_samples: Vec<EnergySample>,
    pub smallest_timesteps: Vec<TimestepRecord>,
    pub phase_timings: Vec<PhaseTiming>,
    pub contact_timing: Vec<ContactTiming>,
    pub processor_timing: Vec<ProcessorTiming>,
    pub decomp: DecompMetrics,
    pub mass_properties: Vec<MassProperty>,
    pub dt_scale_factor: f64,
    pub dt2ms: f64,
    pub tsmin: f64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    KeywordCounts,
    ControlInfo,
    PartDefs,
    Contacts,
    Body,
    Tail,
}

/// Parse the printer log in one streaming pass.
pub fn read(path: &Path, cancel: &CancelToken) -> Result<D3hspData> {
    let mut stream = LineStream::open(path, cancel)?;
    let mut data = D3hspData::default();

    let mut section = Section::Header;
    let mut part_block: Vec<String> = Vec::new();
    let mut in_contact_summary = false;
    let mut in_smallest_ts = false;
    let mut in_timing = false;
    let mut in_cpu_timing = false;
    let mut in_energy_block = false;
    let mut energy_fields: BTreeMap<String, f64> = BTreeMap::new();
    let mut cycle_info: Option<(u64, ElementKind, u64, u64)> = None;
    let mut last_warning: Option<u32> = None;
    let mut lines_after_warning = 0u32;
    let mut contact_ids: Vec<u64> = Vec::new();

    while let Some(raw) = stream.next_line()? {
        let line = raw.trim_end();

        match section {
            Section::Header => {
                parse_header_line(line, &mut data.header);
                if line.contains("L I S T   O F   K E Y W O R D   C O U N T S") {
                    section = Section::KeywordCounts;
                }
            }
            Section::KeywordCounts => {
                if line.contains("c o n t r o l   i n f o r m a t i o n") {
                    section = Section::ControlInfo;
                    continue;
                }
                if let Some(m) = RE_KEYWORD_COUNT.captures(line) {
                    let keyword = m[1].trim().to_string();
                    let count = parse_int(&m[2]).unwrap_or(0);
                    if count > 0 {
                        if keyword.contains("PART_option card") {
                            data.model.num_parts = count;
                        }
                        data.model.keyword_counts.insert(keyword, count);
                    }
                } else if let Some(m) = RE_MPP_PROCS.captures(line) {
                    data.header.num_procs = parse_int(&m[1]).unwrap_or(0) as u32;
                }
            }
            Section::ControlInfo => {
                if line.contains("p a r t   d e f i n i t i o n s") {
                    section = Section::PartDefs;
                    continue;
                }
                parse_model_size(line, &mut data.model);
                parse_control_options(line, &mut data);
                if let Some(m) = RE_MPP_PROCS.captures(line) {
                    data.header.num_procs = parse_int(&m[1]).unwrap_or(0) as u32;
                }
            }
            Section::PartDefs => {
                if line.contains("c o n t a c t   i n t e r f a c e s") {
                    flush_part_block(&mut part_block, &mut data.parts);
                    section = Section::Contacts;
                    continue;
                }
                if RE_PART_SEPARATOR.is_match(line) {
                    flush_part_block(&mut part_block, &mut data.parts);
                } else {
                    part_block.push(line.to_string());
                }
            }
            Section::Contacts => {
                if line.contains("***") && (line.contains("Warning") || line.contains("Error")) {
                    section = Section::Body;
                    // The warning line itself belongs to the body.
                    handle_body_line(
                        line,
                        &mut data,
                        &mut section,
                        &mut in_timing,
                        &mut in_smallest_ts,
                        &mut in_energy_block,
                        &mut energy_fields,
                        &mut cycle_info,
                        &mut last_warning,
                        &mut lines_after_warning,
                    );
                    continue;
                }
                if line.contains("Contact summary") {
                    in_contact_summary = true;
                    continue;
                }
                if in_contact_summary {
                    if line.contains("Order #") {
                        continue;
                    }
                    if let Some(m) = RE_CONTACT_SUMMARY_ENTRY.captures(line) {
                        let type_raw = m[3].trim().to_string();
                        let type_number = type_raw
                            .split_whitespace()
                            .last()
                            .and_then(parse_int)
                            .unwrap_or(0) as u32;
                        data.contact_definitions.push(ContactDefinition {
                            order: parse_int(&m[1]).unwrap_or(0) as u32,
                            contact_id: parse_int(&m[2]).unwrap_or(0),
                            type_code: type_raw,
                            type_number,
                            title: m[4].trim().to_string(),
                        });
                        continue;
                    }
                    if RE_PART_SEPARATOR.is_match(line) {
                        in_contact_summary = false;
                        continue;
                    }
                }
                if let Some(m) = RE_CONTACT_HEADER.captures(line) {
                    contact_ids.push(parse_int(&m[1]).unwrap_or(0));
                } else if let Some(m) = RE_CONTACT_TYPE.captures(line) {
                    if let Some(&id) = contact_ids.last() {
                        data.contact_types
                            .insert(id, parse_int(&m[1]).unwrap_or(0) as u32);
                    }
                }
            }
            Section::Body => {
                handle_body_line(
                    line,
                    &mut data,
                    &mut section,
                    &mut in_timing,
                    &mut in_smallest_ts,
                    &mut in_energy_block,
                    &mut energy_fields,
                    &mut cycle_info,
                    &mut last_warning,
                    &mut lines_after_warning,
                );
            }
            Section::Tail => {
                handle_tail_line(line, &mut data, &mut in_timing, &mut in_cpu_timing);
            }
        }
    }

    // Energy block still open at end of file means the run was cut off
    // mid-write; keep what parsed cleanly.
    if in_energy_block {
        if let Some(sample) = build_energy_sample(&cycle_info, &energy_fields) {
            data.energy_samples.push(sample);
        }
    }
    flush_part_block(&mut part_block, &mut data.parts);

    tracing::debug!(
        parts = data.parts.len(),
        energy_samples = data.energy_samples.len(),
        smallest_timesteps = data.smallest_timesteps.len(),
        "d3hsp pass complete"
    );
    Ok(data)
}

#[allow(clippy::too_many_arguments)]
fn handle_body_line(
    line: &str,
    data: &mut D3hspData,
    section: &mut Section,
    in_timing: &mut bool,
    in_smallest_ts: &mut bool,
    in_energy_block: &mut bool,
    energy_fields: &mut BTreeMap<String, f64>,
    cycle_info: &mut Option<(u64, ElementKind, u64, u64)>,
    last_warning: &mut Option<u32>,
    lines_after_warning: &mut u32,
) {
    if line.contains("T i m i n g   i n f o r m a t i o n") {
        *section = Section::Tail;
        *in_timing = true;
        return;
    }
    if line.contains("N o r m a l   t e r m i n a t i o n") {
        data.termination.status = TerminationStatus::Normal;
        *section = Section::Tail;
        return;
    }
    if line.contains("E r r o r   t e r m i n a t i o n") {
        data.termination.status = TerminationStatus::ErrorTerminated;
        *section = Section::Tail;
        return;
    }

    // Warnings and errors dominate sick runs; gate on the *** marker.
    if line.contains("***") {
        if let Some(m) = RE_WARNING.captures(line) {
            let code = parse_int(&m[1]).unwrap_or(0) as u32;
            *data.warning_counts.entry(code).or_insert(0) += 1;
            *last_warning = Some(code);
            *lines_after_warning = 0;
            return;
        }
        if let Some(m) = RE_ERROR.captures(line) {
            let code = parse_int(&m[1]).unwrap_or(0) as u32;
            *data.error_counts.entry(code).or_insert(0) += 1;
            *last_warning = None;
            return;
        }
        if line.contains("termination time reached") {
            data.termination.status = TerminationStatus::Normal;
        }
        return;
    }

    // Context lines following a warning carry the interface/node detail.
    // A blank line closes the warning block.
    if let Some(code) = *last_warning {
        if line.trim().is_empty() {
            *last_warning = None;
            return;
        }
        *lines_after_warning += 1;
        if *lines_after_warning <= 5 {
            if data.warning_counts.get(&code).copied().unwrap_or(0) <= 3 {
                let msg = data.warning_messages.entry(code).or_default();
                msg.push_str(line.trim());
                msg.push(' ');
            }
            if let Some(m) = RE_TIED_INTERFACE.captures(line) {
                if let Some(id) = parse_int(&m[1]) {
                    data.warning_interfaces.entry(code).or_default().insert(id);
                }
            }
        } else {
            *last_warning = None;
        }
        return;
    }

    if *in_energy_block {
        if let Some(m) = RE_ENERGY_FIELD.captures(line) {
            if let Some(value) = parse_float(&m[2]) {
                energy_fields.insert(m[1].trim().to_ascii_lowercase(), value);
            }
        } else if line.trim().is_empty() {
            match build_energy_sample(cycle_info, energy_fields) {
                Some(sample) => data.energy_samples.push(sample),
                None => data.skipped += 1,
            }
            *in_energy_block = false;
            energy_fields.clear();
        }
        return;
    }

    if line.contains("dt of cycle") {
        if let Some(m) = RE_DT_CYCLE.captures(line) {
            *cycle_info = Some((
                parse_int(&m[1]).unwrap_or(0),
                ElementKind::parse(&m[2]),
                parse_int(&m[3]).unwrap_or(0),
                parse_int(&m[4]).unwrap_or(0),
            ));
            energy_fields.clear();
            *in_energy_block = true;
        }
        return;
    }

    if *in_smallest_ts {
        if let Some(m) = RE_SMALLEST_TS_ENTRY.captures(line.trim()) {
            data.smallest_timesteps.push(TimestepRecord {
                cycle: cycle_info.map(|c| c.0).unwrap_or(0),
                time: 0.0,
                element_kind: ElementKind::parse(&m[1]),
                element_id: parse_int(&m[2]).unwrap_or(0),
                part_id: parse_int(&m[3]),
                dt: parse_float(&m[4]).unwrap_or(0.0),
                rank: None,
            });
        } else if line.trim().is_empty() && !data.smallest_timesteps.is_empty() {
            *in_smallest_ts = false;
        }
        return;
    }
    if line.contains("100 smallest timesteps") {
        *in_smallest_ts = true;
        return;
    }

    parse_decomp_line(line, &mut data.decomp);
    parse_mass_line(line, &mut data.mass_properties);
}

fn handle_tail_line(
    line: &str,
    data: &mut D3hspData,
    in_timing: &mut bool,
    in_cpu_timing: &mut bool,
) {
    if *in_timing {
        if line.contains("T o t a l s") && !line.contains("C P U") {
            *in_timing = false;
            return;
        }
        if let Some(m) = RE_INTERF_ID.captures(line) {
            data.contact_timing.push(ContactTiming {
                interface_id: parse_int(&m[1]).unwrap_or(0),
                cpu_seconds: parse_float(&m[2]).unwrap_or(0.0),
                cpu_percent: parse_float(&m[3]).unwrap_or(0.0),
                clock_seconds: parse_float(&m[4]).unwrap_or(0.0),
                clock_percent: parse_float(&m[5]).unwrap_or(0.0),
            });
            return;
        }
        if let Some(m) = RE_TIMING_ENTRY.captures(line) {
            data.phase_timings.push(PhaseTiming {
                component: m[1].trim().to_string(),
                cpu_seconds: parse_float(&m[2]).unwrap_or(0.0),
                cpu_percent: parse_float(&m[3]).unwrap_or(0.0),
                clock_seconds: parse_float(&m[4]).unwrap_or(0.0),
                clock_percent: parse_float(&m[5]).unwrap_or(0.0),
            });
        }
        return;
    }

    if *in_cpu_timing {
        if line.contains("T o t a l s") {
            *in_cpu_timing = false;
            return;
        }
        if let Some(m) = RE_CPU_PROC.captures(line.trim()) {
            data.processor_timing.push(ProcessorTiming {
                processor_id: parse_int(&m[1]).unwrap_or(0) as u32,
                hostname: m[2].to_string(),
                cpu_ratio: parse_float(&m[3]).unwrap_or(0.0),
                cpu_seconds: parse_float(&m[4]).unwrap_or(0.0),
            });
        }
        return;
    }

    if line.contains("C P U   T i m i n g") {
        *in_cpu_timing = true;
        return;
    }
    if line.contains("T i m i n g   i n f o r m a t i o n") {
        *in_timing = true;
        return;
    }
    if line.contains("N o r m a l") && line.contains("t e r m i n a t i o n") {
        data.termination.status = TerminationStatus::Normal;
        return;
    }
    if line.contains("E r r o r") && line.contains("t e r m i n a t i o n") {
        data.termination.status = TerminationStatus::ErrorTerminated;
        return;
    }

    if parse_mass_line(line, &mut data.mass_properties) {
        return;
    }
    parse_decomp_line(line, &mut data.decomp);

    if line.contains("Problem time") {
        if let Some(m) = RE_PROBLEM_TIME.captures(line) {
            data.termination.actual_time = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Problem cycle") {
        if let Some(m) = RE_PROBLEM_CYCLE.captures(line) {
            data.termination.total_cycles = parse_int(&m[1]).unwrap_or(0);
        }
    } else if line.contains("Total CPU time") {
        if let Some(m) = RE_TOTAL_CPU.captures(line) {
            data.termination.total_cpu_seconds = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("CPU time per zone cycle") {
        if let Some(m) = RE_CPU_PER_ZONE.captures(line) {
            data.termination.cpu_per_zone_cycle_ns = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Clock time per zone cycle") {
        if let Some(m) = RE_CLOCK_PER_ZONE.captures(line) {
            data.termination.clock_per_zone_cycle_ns = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Start time") {
        if let Some(m) = RE_START_TIME.captures(line) {
            data.termination.start_datetime = m[1].to_string();
        }
    } else if line.contains("End time") {
        if let Some(m) = RE_END_TIME.captures(line) {
            data.termination.end_datetime = m[1].to_string();
        }
    } else if line.contains("Elapsed time") {
        if let Some(m) = RE_ELAPSED.captures(line) {
            data.termination.elapsed_seconds = parse_float(&m[1]).unwrap_or(0.0);
        }
    }
}

fn parse_header_line(line: &str, header: &mut SolverHeader) {
    if let Some(m) = RE_VERSION.captures(line) {
        header.version = m[1].to_string();
    } else if let Some(m) = RE_REVISION.captures(line) {
        header.revision = m[1].to_string();
    } else if let Some(m) = RE_PLATFORM.captures(line) {
        header.platform = m[1].to_string();
    } else if let Some(m) = RE_OS_LEVEL.captures(line) {
        header.os_level = m[1].to_string();
    } else if let Some(m) = RE_COMPILER.captures(line) {
        header.compiler = m[1].to_string();
    } else if let Some(m) = RE_HOSTNAME.captures(line) {
        header.hostname = m[1].to_string();
    } else if let Some(m) = RE_PRECISION.captures(line) {
        header.precision = m[1].to_string();
    } else if let Some(m) = RE_LICENSEE.captures(line) {
        header.licensee = m[1].to_string();
    } else if let Some(m) = RE_RUN_DATE.captures(line) {
        header.date = format!("{} {}", &m[1], &m[2]);
    } else if let Some(m) = RE_INPUT_FILE.captures(line) {
        header.input_file = m[1].to_string();
    } else if header.input_file.is_empty() {
        if let Some(m) = RE_CMD_LINE.captures(line) {
            header.input_file = m[1].to_string();
        } else if let Some(m) = RE_MPP_PROCS.captures(line) {
            header.num_procs = parse_int(&m[1]).unwrap_or(0) as u32;
        }
    } else if let Some(m) = RE_MPP_PROCS.captures(line) {
        header.num_procs = parse_int(&m[1]).unwrap_or(0) as u32;
    }
}

fn parse_model_size(line: &str, model: &mut ModelSummary) {
    let fields: [(&Lazy<Regex>, &mut u64); 9] = [
        (&RE_NUM_MATERIALS, &mut model.num_materials),
        (&RE_NUM_NODES, &mut model.num_nodes),
        (&RE_NUM_SOLIDS, &mut model.num_solid_elements),
        (&RE_NUM_SHELLS, &mut model.num_shell_elements),
        (&RE_NUM_BEAMS, &mut model.num_beam_elements),
        (&RE_NUM_TSHELLS, &mut model.num_thick_shell_elements),
        (&RE_NUM_SPH, &mut model.num_sph_particles),
        (&RE_NUM_CONTACTS, &mut model.num_contacts),
        (&RE_NUM_SPC, &mut model.num_spc_nodes),
    ];
    for (pattern, slot) in fields {
        if let Some(m) = pattern.captures(line) {
            *slot = parse_int(&m[1]).unwrap_or(0);
            return;
        }
    }
}

fn parse_control_options(line: &str, data: &mut D3hspData) {
    if let Some(m) = RE_TERM_TIME.captures(line) {
        data.termination.target_time = parse_float(&m[1]).unwrap_or(0.0);
    }
    if let Some(m) = RE_TSSFAC.captures(line) {
        data.dt_scale_factor = parse_float(&m[1]).unwrap_or(0.0);
    }
    if let Some(m) = RE_DT2MS.captures(line) {
        data.dt2ms = parse_float(&m[1]).unwrap_or(0.0);
    }
    if let Some(m) = RE_TSMIN.captures(line) {
        data.tsmin = parse_float(&m[1]).unwrap_or(0.0);
    }
}

fn flush_part_block(block: &mut Vec<String>, parts: &mut Vec<PartDefinition>) {
    if block.is_empty() {
        return;
    }
    if let Some(part) = parse_part_block(block) {
        parts.push(part);
    }
    block.clear();
}

fn parse_part_block(lines: &[String]) -> Option<PartDefinition> {
    let mut part = PartDefinition::default();
    for (i, line) in lines.iter().enumerate() {
        if let Some(m) = RE_PART_ID.captures(line) {
            part.part_id = parse_int(&m[1]).unwrap_or(0);
            // The part name usually sits a couple of lines above its id.
            for candidate in lines[i.saturating_sub(3)..i].iter().rev() {
                let c = candidate.trim();
                if !c.is_empty() && !c.starts_with('*') && !c.to_lowercase().contains("part") {
                    part.name = c.to_string();
                    break;
                }
            }
        } else if let Some(m) = RE_SECTION_ID.captures(line) {
            part.section_id = parse_int(&m[1]).unwrap_or(0);
        } else if let Some(m) = RE_MATERIAL_ID.captures(line) {
            part.material_id = parse_int(&m[1]).unwrap_or(0);
        } else if let Some(m) = RE_MATERIAL_TYPE.captures(line) {
            part.material_type = parse_int(&m[1]).unwrap_or(0) as u32;
        } else if let Some(m) = RE_HG_TYPE.captures(line) {
            part.hourglass_type = parse_int(&m[1]).unwrap_or(0) as u32;
        } else if let Some(m) = RE_DENSITY.captures(line) {
            part.density = parse_float(&m[1]).unwrap_or(0.0);
        } else if let Some(m) = RE_HG_COEFF.captures(line) {
            part.hourglass_coefficient = parse_float(&m[1]).unwrap_or(0.0);
        } else if let Some(m) = RE_YOUNGS_MOD.captures(line) {
            part.youngs_modulus = parse_float(&m[1]).unwrap_or(0.0);
        } else if let Some(m) = RE_POISSON.captures(line) {
            part.poisson_ratio = parse_float(&m[1]).unwrap_or(0.0);
        }
    }
    if part.part_id == 0 {
        return None;
    }
    Some(part)
}

fn parse_decomp_line(line: &str, decomp: &mut DecompMetrics) {
    if line.contains("Minumum:") {
        // The solver misspells "Minimum" in this table.
        if let Some(m) = RE_DECOMP_MIN.captures(line) {
            decomp.min_cost = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Maximum:") {
        if let Some(m) = RE_DECOMP_MAX.captures(line) {
            decomp.max_cost = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Standard Deviation:") {
        if let Some(m) = RE_DECOMP_STDDEV.captures(line) {
            decomp.std_deviation = parse_float(&m[1]).unwrap_or(0.0);
        }
    } else if line.contains("Memory required for decomposition") {
        if let Some(m) = RE_DECOMP_MEM.captures(line) {
            decomp.decomp_memory = parse_int(&m[1]).unwrap_or(0);
        }
    } else if line.contains("Additional dynamic memory") {
        if let Some(m) = RE_DECOMP_DYN_MEM.captures(line) {
            decomp.dynamic_memory = parse_int(&m[1]).unwrap_or(0);
        }
    }
}

/// Returns true when the line belonged to a mass-property block.
fn parse_mass_line(line: &str, props: &mut Vec<MassProperty>) -> bool {
    if line.contains("m a s s") && line.contains("p r o p e r t i e s") {
        if let Some(m) = RE_MASS_PART_HEADER.captures(line) {
            props.push(MassProperty {
                part_id: parse_int(&m[1]).unwrap_or(0),
                ..Default::default()
            });
        }
        return true;
    }
    let Some(current) = props.last_mut() else {
        return false;
    };
    if line.contains("mass center") {
        if let Some(m) = RE_MASS_CENTER.captures(line) {
            let value = parse_float(&m[2]).unwrap_or(0.0);
            match &m[1] {
                "x" => current.center[0] = value,
                "y" => current.center[1] = value,
                _ => current.center[2] = value,
            }
        }
        return true;
    }
    if line.contains("total mass") {
        if let Some(m) = RE_MASS_TOTAL.captures(line) {
            current.total_mass = parse_float(&m[1]).unwrap_or(0.0);
        }
        return true;
    }
    if let Some(m) = RE_MASS_INERTIA.captures(line) {
        let value = parse_float(&m[2]).unwrap_or(0.0);
        match &m[1] {
            "11" => current.inertia[0] = value,
            "22" => current.inertia[1] = value,
            _ => current.inertia[2] = value,
        }
        return true;
    }
    false
}

fn build_energy_sample(
    cycle_info: &Option<(u64, ElementKind, u64, u64)>,
    fields: &BTreeMap<String, f64>,
) -> Option<EnergySample> {
    let (cycle, kind, element, part) = (*cycle_info)?;
    if fields.is_empty() {
        return None;
    }
    let get = |key: &str| fields.get(key).copied().unwrap_or(0.0);
    let ratio = |key: &str| {
        let v = get(key);
        if v == 0.0 {
            1.0
        } else {
            v
        }
    };
    Some(EnergySample {
        cycle,
        time: get("time"),
        timestep: get("time step"),
        kinetic: get("kinetic energy"),
        internal: get("internal energy"),
        spring_damper: get("spring and damper energy"),
        hourglass: get("hourglass energy"),
        system_damping: get("system damping energy"),
        sliding_interface: get("sliding interface energy"),
        external_work: get("external work"),
        eroded_kinetic: get("eroded kinetic energy"),
        eroded_internal: get("eroded internal energy"),
        eroded_hourglass: get("eroded hourglass energy"),
        total: get("total energy"),
        energy_ratio: ratio("total energy / initial energy"),
        energy_ratio_no_eroded: ratio("energy ratio w/o eroded energy"),
        global_velocity: [
            get("global x velocity"),
            get("global y velocity"),
            get("global z velocity"),
        ],
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
        let path = dir.path().join("d3hsp");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    const FIXTURE: &str = "\
     Date: 03/15/2024    Time: 10:00:00
 |  Version : mpp s R11.2.2  |
 |  Revision: 14531  |
 |  Platform : Xeon64 System  |
 |  Hostname : node042  |
 |  Precision : Single precision (I4R4)  |
 |  Licensed to: Test Org  |
 Input file: crash_model.k
 MPP execution with    8 procs

 L I S T   O F   K E Y W O R D   C O U N T S
 total # of *NODE card..................        40210
 total # of *PART_option card...........           12

 c o n t r o l   i n f o r m a t i o n

 number of materials or property sets....        12
 number of nodal+scalar points...........     40210
 number of solid elements................     18000
 number of shell elements................     14200
 number of spc nodes.....................       320
 termination time........................ 1.200E-01
 time step scale factor.................. 9.000E-01

 p a r t   d e f i n i t i o n s

 bumper_beam
 part id ............ 1
 section id ......... 1
 material id ........ 101
 material type ...... 24
 density ......... = 7.850E-09
  e .............. = 2.100E+05
 vnu ............. = 3.000E-01
************************************************************************

 c o n t a c t   i n t e r f a c e s

 Contact summary
 Order #  id  type  title
     1    10    13   global self contact
     2    11   o 6   weld tie
************************************************************************

 *** Warning 50135 (SOL+135)
      tied interface # = 11
      node may be moved

 dt of cycle      100 is controlled by solid     5021 of part       3

 time...................... 1.0000E-03
 time step................. 1.0000E-05
 kinetic energy............ 5.0000E+05
 internal energy........... 1.2000E+05
 hourglass energy.......... 3.0000E+03
 sliding interface energy.. 1.0000E+03
 external work............. 0.0000E+00
 total energy.............. 6.2400E+05
 total energy / initial energy.. 1.0010E+00
 global x velocity......... 1.0000E+01

   100 smallest timesteps
 solid      5021          3  9.8000E-06
 shell      7710          5  1.0100E-05

 T i m i n g   i n f o r m a t i o n
                            CPU        %      Clock     %
  Initialization ....... 1.2000E+01   1.00  1.3000E+01   1.00
  Element processing ... 6.0000E+02  50.00  6.1000E+02  50.00
  Contact algorithm .... 4.0000E+02  33.00  4.1000E+02  33.50
   Interf. ID   10  3.9000E+02  32.00  4.0000E+02  32.50
 T o t a l s  1.2000E+03 100.00 1.2200E+03 100.00

 C P U   T i m i n g   i n f o r m a t i o n
 #    0  node042  1.00  3.0000E+02
 #    1  node042  0.98  2.9500E+02
 T o t a l s

 N o r m a l   t e r m i n a t i o n

 Problem time   =  1.2000E-01
 Problem cycle  =  120000
 Total CPU time =      1200 seconds
 CPU time per zone cycle  =  310.000000 nanoseconds
 Clock time per zone cycle =  315.000000 nanoseconds
 Start time  03/15/2024 10:00:00
 End time  03/15/2024 10:20:00
 Elapsed time     1200 seconds
";

    #[test]
    fn test_d3hsp__full_fixture__then_header_and_model_parsed() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.header.version, "mpp s R11.2.2");
        assert_eq!(data.header.hostname, "node042");
        assert_eq!(data.header.input_file, "crash_model.k");
        assert_eq!(data.header.num_procs, 8);
        assert_eq!(data.model.num_nodes, 40210);
        assert_eq!(data.model.num_solid_elements, 18000);
        assert_eq!(data.model.num_parts, 12);
        assert_eq!(data.model.keyword_counts.get("NODE card"), Some(&40210));
    }

    #[test]
    fn test_d3hsp__part_block__then_material_fields_parsed() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.parts.len(), 1);
        let part = &data.parts[0];
        assert_eq!(part.part_id, 1);
        assert_eq!(part.name, "bumper_beam");
        assert_eq!(part.material_id, 101);
        assert_eq!(part.material_type, 24);
        assert!((part.density - 7.85e-9).abs() < 1e-15);
    }

    #[test]
    fn test_d3hsp__contact_summary__then_definitions_collected() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.contact_definitions.len(), 2);
        assert_eq!(data.contact_definitions[0].contact_id, 10);
        assert_eq!(data.contact_definitions[0].type_number, 13);
        assert_eq!(data.contact_definitions[1].type_code, "o 6");
        assert_eq!(data.contact_definitions[1].title, "weld tie");
    }

    #[test]
    fn test_d3hsp__warning_with_context__then_interface_captured() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.warning_counts.get(&50135), Some(&1));
        let interfaces = data.warning_interfaces.get(&50135).unwrap();
        assert!(interfaces.contains(&11));
    }

    #[test]
    fn test_d3hsp__energy_block__then_sample_with_controlling_element() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.energy_samples.len(), 1);
        let sample = &data.energy_samples[0];
        assert_eq!(sample.cycle, 100);
        assert_eq!(sample.controlling_element, 5021);
        assert_eq!(sample.controlling_part, 3);
        assert_eq!(sample.controlling_element_kind, ElementKind::Solid);
        assert!((sample.kinetic - 5.0e5).abs() < 1.0);
        assert!((sample.energy_ratio - 1.001).abs() < 1e-9);
    }

    #[test]
    fn test_d3hsp__smallest_timesteps__then_records_with_parts() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.smallest_timesteps.len(), 2);
        assert_eq!(data.smallest_timesteps[0].element_id, 5021);
        assert_eq!(data.smallest_timesteps[0].part_id, Some(3));
        assert!((data.smallest_timesteps[0].dt - 9.8e-6).abs() < 1e-12);
    }

    #[test]
    fn test_d3hsp__tail__then_timing_and_termination_parsed() {
        let (_dir, path) = write_fixture(FIXTURE);
        let data = read(&path, &CancelToken::new()).unwrap();

        assert_eq!(data.termination.status, TerminationStatus::Normal);
        assert!((data.termination.actual_time - 0.12).abs() < 1e-9);
        assert_eq!(data.termination.total_cycles, 120000);
        assert!((data.termination.total_cpu_seconds - 1200.0).abs() < 1e-9);
        assert_eq!(data.phase_timings.len(), 3);
        assert_eq!(data.phase_timings[2].component, "Contact algorithm");
        assert_eq!(data.contact_timing.len(), 1);
        assert_eq!(data.contact_timing[0].interface_id, 10);
        assert_eq!(data.processor_timing.len(), 2);
        assert_eq!(data.processor_timing[1].processor_id, 1);
    }

    #[test]
    fn test_d3hsp__error_termination_banner__then_status_error() {
        let fixture = "\
 L I S T   O F   K E Y W O R D   C O U N T S
 c o n t r o l   i n f o r m a t i o n
 p a r t   d e f i n i t i o n s
 c o n t a c t   i n t e r f a c e s
 *** Error 30010 (SOL+10)
 E r r o r   t e r m i n a t i o n
";
        let (_dir, path) = write_fixture(fixture);
        let data = read(&path, &CancelToken::new()).unwrap();
        assert_eq!(data.termination.status, TerminationStatus::ErrorTerminated);
        assert_eq!(data.error_counts.get(&30010), Some(&1));
    }

    #[test]
    fn test_d3hsp__truncated_file__then_incomplete_status() {
        let fixture = "\
 L I S T   O F   K E Y W O R D   C O U N T S
 c o n t r o l   i n f o r m a t i o n
 number of nodal+scalar points...........     100
";
        let (_dir, path) = write_fixture(fixture);
        let data = read(&path, &CancelToken::new()).unwrap();
        assert_eq!(data.termination.status, TerminationStatus::Incomplete);
        assert_eq!(data.model.num_nodes, 100);
    }
}
