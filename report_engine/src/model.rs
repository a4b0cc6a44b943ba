//! Data model for solver run diagnostics.
//!
//! Everything here is a plain value type: readers produce them, analyzers
//! consume them, the aggregator assembles them into a `Report`. All maps
//! are `BTreeMap` so serialized reports are byte-identical for identical
//! inputs.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Diagnostic severity, ordered Info < Warning < Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// How the run ended, per the printer log tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationStatus {
    Normal,
    ErrorTerminated,
    /// No termination banner found; the run was cut short or is still going.
    Incomplete,
}

/// Element families the solver reports timestep control for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ElementKind {
    Solid,
    Shell,
    Beam,
    Tshell,
    Sph,
    Other,
}

impl ElementKind {
    /// Lenient parse; solver output spells these lowercase.
    pub fn parse(s: &str) -> ElementKind {
        match s.to_ascii_lowercase().as_str() {
            "solid" => ElementKind::Solid,
            "shell" => ElementKind::Shell,
            "beam" => ElementKind::Beam,
            "tshell" | "thick shell" => ElementKind::Tshell,
            "sph" => ElementKind::Sph,
            _ => ElementKind::Other,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementKind::Solid => "solid",
            ElementKind::Shell => "shell",
            ElementKind::Beam => "beam",
            ElementKind::Tshell => "tshell",
            ElementKind::Sph => "sph",
            ElementKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Banner block at the top of the printer log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverHeader {
    pub version: String,
    pub revision: String,
    pub date: String,
    pub platform: String,
    pub os_level: String,
    pub compiler: String,
    pub hostname: String,
    pub precision: String,
    pub input_file: String,
    pub licensee: String,
    pub num_procs: u32,
}

/// Entity counts from the keyword-count section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelSummary {
    pub num_materials: u64,
    pub num_nodes: u64,
    pub num_solid_elements: u64,
    pub num_shell_elements: u64,
    pub num_beam_elements: u64,
    pub num_thick_shell_elements: u64,
    pub num_sph_particles: u64,
    pub num_contacts: u64,
    pub num_spc_nodes: u64,
    pub num_parts: u64,
    pub keyword_counts: BTreeMap<String, u64>,
}

/// Outcome and cost figures from the printer log tail.
#[derive(Debug, Clone, Serialize)]
pub struct Termination {
    pub status: TerminationStatus,
    pub target_time: f64,
    pub actual_time: f64,
    pub total_cycles: u64,
    pub total_cpu_seconds: f64,
    pub elapsed_seconds: f64,
    pub cpu_per_zone_cycle_ns: f64,
    pub clock_per_zone_cycle_ns: f64,
    pub start_datetime: String,
    pub end_datetime: String,
    pub error_message: Option<String>,
}

impl Default for Termination {
    fn default() -> Self {
        Termination {
            status: TerminationStatus::Incomplete,
            target_time: 0.0,
            actual_time: 0.0,
            total_cycles: 0,
            total_cpu_seconds: 0.0,
            elapsed_seconds: 0.0,
            cpu_per_zone_cycle_ns: 0.0,
            clock_per_zone_cycle_ns: 0.0,
            start_datetime: String::new(),
            end_datetime: String::new(),
            error_message: None,
        }
    }
}

/// One global-statistics cycle block.
#[derive(Debug, Clone, Serialize)]
pub struct EnergySample {
    pub cycle: u64,
    pub time: f64,
    pub timestep: f64,
    pub kinetic: f64,
    pub internal: f64,
    pub spring_damper: f64,
    pub hourglass: f64,
    pub system_damping: f64,
    pub sliding_interface: f64,
    pub external_work: f64,
    pub eroded_kinetic: f64,
    pub eroded_internal: f64,
    pub eroded_hourglass: f64,
    pub total: f64,
    /// total energy / initial energy, the solver's own balance figure.
    pub energy_ratio: f64,
    pub energy_ratio_no_eroded: f64,
    pub global_velocity: [f64; 3],
    pub controlling_element_kind: ElementKind,
    pub controlling_element: u64,
    pub controlling_part: u64,
}

impl Default for EnergySample {
    fn default() -> Self {
        EnergySample {
            cycle: 0,
            time: 0.0,
            timestep: 0.0,
            kinetic: 0.0,
            internal: 0.0,
            spring_damper: 0.0,
            hourglass: 0.0,
            system_damping: 0.0,
            sliding_interface: 0.0,
            external_work: 0.0,
            eroded_kinetic: 0.0,
            eroded_internal: 0.0,
            eroded_hourglass: 0.0,
            total: 0.0,
            energy_ratio: 1.0,
            energy_ratio_no_eroded: 1.0,
            global_velocity: [0.0; 3],
            controlling_element_kind: ElementKind::Other,
            controlling_element: 0,
            controlling_part: 0,
        }
    }
}

/// One row of the smallest-timestep tables, or a controlling-element line.
#[derive(Debug, Clone, Serialize)]
pub struct TimestepRecord {
    pub cycle: u64,
    pub time: f64,
    pub element_kind: ElementKind,
    pub element_id: u64,
    pub part_id: Option<u64>,
    pub dt: f64,
    /// Rank of the message log the record came from, if any.
    pub rank: Option<u32>,
}

/// Maximal cycle span over which one element controlled the timestep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllingInterval {
    pub start_cycle: u64,
    pub end_cycle: u64,
    pub element_id: u64,
}

/// Part metadata from the part-definitions section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartDefinition {
    pub part_id: u64,
    pub name: String,
    pub section_id: u64,
    pub material_id: u64,
    pub material_type: u32,
    pub density: f64,
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
    pub hourglass_type: u32,
    pub hourglass_coefficient: f64,
}

/// Contact interface declared in the printer log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactDefinition {
    pub order: u32,
    pub contact_id: u64,
    pub type_code: String,
    pub type_number: u32,
    pub title: String,
}

/// Declared interface joined with its timing and warning figures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactInterfaceSummary {
    pub interface_id: u64,
    pub type_code: String,
    pub type_number: u32,
    pub title: String,
    pub warning_count: u64,
    pub initial_penetrations: u64,
    pub cpu_seconds: f64,
    pub cpu_percent: f64,
    pub clock_seconds: f64,
    pub clock_percent: f64,
}

/// One row of the end-of-run timing table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PhaseTiming {
    pub component: String,
    pub cpu_seconds: f64,
    pub cpu_percent: f64,
    pub clock_seconds: f64,
    pub clock_percent: f64,
}

/// Per-interface row of the contact timing table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactTiming {
    pub interface_id: u64,
    pub cpu_seconds: f64,
    pub cpu_percent: f64,
    pub clock_seconds: f64,
    pub clock_percent: f64,
}

/// Per-rank CPU figure from the parallel timing table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessorTiming {
    pub processor_id: u32,
    pub hostname: String,
    pub cpu_ratio: f64,
    pub cpu_seconds: f64,
}

/// One row of the load-profile CSV (absolute seconds or percentages).
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadProfileEntry {
    pub processor_id: u32,
    pub solids: f64,
    pub shells: f64,
    pub tshells: f64,
    pub beams: f64,
    pub sph: f64,
    pub e_other: f64,
    pub force_shr: f64,
    pub tstep_shr: f64,
    pub swtch_shr: f64,
    pub matrl_shr: f64,
    pub elmnt_shr: f64,
    pub time_step: f64,
    pub contact: f64,
    pub rigid_bdy: f64,
    pub others: f64,
}

impl LoadProfileEntry {
    /// Component values in CSV column order, paired with their names.
    pub fn components(&self) -> [(&'static str, f64); 15] {
        [
            ("solids", self.solids),
            ("shells", self.shells),
            ("tshells", self.tshells),
            ("beams", self.beams),
            ("sph", self.sph),
            ("e_other", self.e_other),
            ("force_shr", self.force_shr),
            ("tstep_shr", self.tstep_shr),
            ("swtch_shr", self.swtch_shr),
            ("matrl_shr", self.matrl_shr),
            ("elmnt_shr", self.elmnt_shr),
            ("time_step", self.time_step),
            ("contact", self.contact),
            ("rigid_bdy", self.rigid_bdy),
            ("others", self.others),
        ]
    }
}

/// Per-rank contact time split across interfaces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContProfileEntry {
    pub processor_id: u32,
    pub interface_timings: BTreeMap<u64, f64>,
}

/// Per-interface contact time spread across ranks, from cont_profile.csv.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactRankSpread {
    pub interface_id: u64,
    pub min_seconds: f64,
    pub max_seconds: f64,
    pub mean_seconds: f64,
    /// (max - min) / mean, as a percentage.
    pub imbalance_percent: f64,
}

/// Domain-decomposition cost spread printed before time stepping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecompMetrics {
    pub min_cost: f64,
    pub max_cost: f64,
    pub std_deviation: f64,
    pub decomp_memory: u64,
    pub dynamic_memory: u64,
}

/// Per-part mass summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MassProperty {
    pub part_id: u64,
    pub total_mass: f64,
    pub center: [f64; 3],
    pub inertia: [f64; 3],
}

/// Progress estimates from status.out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusInfo {
    pub cpu_per_zone_ns: u64,
    pub avg_cpu_per_zone_ns: u64,
    pub avg_clock_per_zone_ns: u64,
    pub est_total_cpu_sec: u64,
    pub est_cpu_remain_sec: u64,
    pub est_total_clock_sec: u64,
    pub est_clock_remain_sec: u64,
}

/// Per-part energy record from the material summary file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatsumRecord {
    pub part_id: u64,
    pub time: f64,
    pub internal_energy: f64,
    pub kinetic_energy: f64,
    pub eroded_internal_energy: f64,
    pub eroded_kinetic_energy: f64,
    pub hourglass_energy: f64,
    pub momentum: [f64; 3],
    pub rigid_body_velocity: [f64; 3],
}

/// One nodal time-history row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NodalSample {
    pub node_id: u64,
    pub time: f64,
    pub displacement: [f64; 3],
    pub velocity: [f64; 3],
    pub acceleration: [f64; 3],
    pub coordinate: [f64; 3],
}

impl NodalSample {
    pub fn speed(&self) -> f64 {
        let [x, y, z] = self.velocity;
        (x * x + y * y + z * z).sqrt()
    }
}

/// One boundary-force row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoundarySample {
    pub node_id: u64,
    pub time: f64,
    pub force: [f64; 3],
    pub energy: f64,
    pub moment: [f64; 3],
}

impl BoundarySample {
    pub fn force_magnitude(&self) -> f64 {
        let [x, y, z] = self.force;
        (x * x + y * y + z * z).sqrt()
    }
}

/// One warning or error code observation tied to the log it came from.
#[derive(Debug, Clone, Serialize)]
pub struct WarningEvent {
    pub code: u32,
    pub count: u64,
    pub is_error: bool,
    /// None when the serial `messag` or the printer log reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

/// Classified warning/error code with occurrence data.
#[derive(Debug, Clone, Serialize)]
pub struct WarningSummary {
    pub code: u32,
    pub count: u64,
    pub message: String,
    pub severity: Severity,
    pub recommendation: String,
    pub affected_interfaces: Vec<u64>,
}

/// Extrapolated cost at a larger core count. A model, not a measurement.
#[derive(Debug, Clone, Serialize)]
pub struct ScalingProjection {
    pub target_cores: u32,
    pub est_elapsed_seconds: f64,
    pub est_speedup: f64,
    pub est_efficiency_percent: f64,
    pub band: ScalingBand,
}

/// Projected-efficiency classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalingBand {
    /// Below 50% projected efficiency.
    Severe,
    /// 50% to 70%.
    Cautionary,
    /// Above 70%.
    Acceptable,
}

/// Pointer from a finding back into the input data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum Evidence {
    Cycle(u64),
    Time(f64),
    Node(u64),
    Element(u64),
    Part(u64),
    Interface(u64),
    Rank(u32),
}

/// One diagnostic conclusion.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: String,
    pub title: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Analyzer that produced the finding.
    pub source: String,
    /// Repeats of the same condition folded into one finding.
    pub occurrences: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<Evidence>,
}

impl Finding {
    /// Single-occurrence finding with no evidence attached yet.
    pub fn new(
        severity: Severity,
        category: &str,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Finding {
        Finding {
            severity,
            category: category.to_string(),
            title: title.into(),
            detail: detail.into(),
            recommendation: None,
            source: String::new(),
            occurrences: 1,
            evidence: Vec::new(),
        }
    }

    pub fn with_recommendation(mut self, rec: impl Into<String>) -> Finding {
        self.recommendation = Some(rec.into());
        self
    }

    pub fn with_evidence(mut self, ev: Evidence) -> Finding {
        self.evidence.push(ev);
        self
    }
}

/// Which inputs were available and how cleanly they parsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Coverage {
    pub files_found: Vec<String>,
    pub files_missing: Vec<String>,
    /// Malformed records skipped, per reader.
    pub skipped_records: BTreeMap<String, u64>,
}

impl Coverage {
    pub fn total_skipped(&self) -> u64 {
        self.skipped_records.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity__ordering__then_critical_is_highest() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_element_kind__parses_solver_spelling__then_matches() {
        assert_eq!(ElementKind::parse("solid"), ElementKind::Solid);
        assert_eq!(ElementKind::parse("SHELL"), ElementKind::Shell);
        assert_eq!(ElementKind::parse("tshell"), ElementKind::Tshell);
        assert_eq!(ElementKind::parse("rigidbody"), ElementKind::Other);
    }

    #[test]
    fn test_nodal_sample__speed__then_vector_magnitude() {
        let sample = NodalSample {
            node_id: 1,
            time: 0.0,
            displacement: [0.0; 3],
            velocity: [3.0, 4.0, 0.0],
            acceleration: [0.0; 3],
            coordinate: [0.0; 3],
        };
        assert!((sample.speed() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_finding__serializes__then_empty_fields_skipped() {
        let finding = Finding::new(Severity::Warning, "energy", "t", "d");
        let json = serde_json::to_string(&finding).unwrap();
        assert!(!json.contains("recommendation"));
        assert!(!json.contains("evidence"));
    }
}
