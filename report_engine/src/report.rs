//! Report assembly: merges the per-file reader outputs, runs the
//! analyzers, and produces the one immutable `Report`.
//!
//! Everything here is deterministic for identical inputs: merged maps
//! are BTreeMaps, finding order is fixed per analyzer, and no
//! wall-clock value enters the output.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::analysis::instability::{InstabilityAnalysis, InstabilityOverview};
use crate::analysis::{contact, energy, failure, performance, scaling, termination, timestep, warnings};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::mapper::ElementMapper;
use crate::model::{
    ContactInterfaceSummary, ContactRankSpread, Coverage, EnergySample, Finding, MassProperty,
    MatsumRecord, ModelSummary, PartDefinition, SolverHeader, StatusInfo, Termination,
    TerminationStatus, WarningEvent, WarningSummary,
};
use crate::model::ContProfileEntry;
use crate::readers::d3hsp::D3hspData;
use crate::readers::glstat::GlstatData;
use crate::readers::matsum::MatsumData;
use crate::readers::messag::MessagData;
use crate::readers::profile::{ContProfileData, LoadProfileData};

/// Everything the readers produced for one run directory.
#[derive(Default)]
pub struct RunData {
    pub d3hsp: Option<D3hspData>,
    pub glstat: GlstatData,
    pub status: Option<StatusInfo>,
    pub matsum: MatsumData,
    pub messag: Vec<MessagData>,
    pub load_profile: LoadProfileData,
    pub cont_profile: ContProfileData,
    pub instability: InstabilityAnalysis,
    pub coverage: Coverage,
}

/// The complete diagnostic result for one run.
#[derive(Serialize)]
pub struct Report {
    pub header: SolverHeader,
    pub model: ModelSummary,
    pub termination: Termination,
    pub parts: Vec<PartDefinition>,
    pub energy: energy::EnergyOverview,
    pub timestep: timestep::TimestepOverview,
    pub contacts: Vec<ContactInterfaceSummary>,
    pub contact: contact::ContactOverview,
    /// Per-interface contact time spread across ranks, when the contact
    /// profile CSV was present.
    pub contact_rank_spread: Vec<ContactRankSpread>,
    pub performance: performance::PerformanceOverview,
    pub scaling: scaling::ScalingOverview,
    pub instability: InstabilityOverview,
    pub failure: failure::FailureOverview,
    pub warnings: Vec<WarningSummary>,
    /// Per-log code observations, in log then code order.
    pub warning_events: Vec<WarningEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusInfo>,
    /// Latest material-summary record per part.
    pub part_energy: Vec<MatsumRecord>,
    pub mass_properties: Vec<MassProperty>,
    pub coverage: Coverage,
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn max_severity(&self) -> Option<crate::model::Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Run every analyzer over the merged data and assemble the Report.
pub fn assemble(dir: &Path, data: RunData, config: &EngineConfig) -> Result<Report> {
    let has_messag_content = data.messag.iter().any(|m| {
        !m.warning_counts.is_empty()
            || !m.error_counts.is_empty()
            || !m.negative_volume_events.is_empty()
            || m.normal_termination
            || m.error_termination
    });
    if data.d3hsp.is_none() && data.glstat.samples.is_empty() && !has_messag_content {
        return Err(EngineError::EmptyRun {
            dir: dir.to_path_buf(),
        });
    }

    let d3hsp = data.d3hsp.unwrap_or_default();

    // The energy-balance file samples far more often than the printer
    // log; where both report the same cycle the former wins.
    let mut by_cycle: BTreeMap<u64, EnergySample> = BTreeMap::new();
    for sample in d3hsp.energy_samples {
        by_cycle.insert(sample.cycle, sample);
    }
    for sample in data.glstat.samples {
        by_cycle.insert(sample.cycle, sample);
    }
    let energy_samples: Vec<EnergySample> = by_cycle.into_values().collect();

    let mut termination = d3hsp.termination.clone();
    if termination.status == TerminationStatus::Incomplete {
        if data.messag.iter().any(|m| m.error_termination) {
            termination.status = TerminationStatus::ErrorTerminated;
        } else if data.messag.iter().any(|m| m.normal_termination) {
            termination.status = TerminationStatus::Normal;
        }
    }

    let mut warning_counts = d3hsp.warning_counts.clone();
    let mut error_counts = d3hsp.error_counts.clone();
    let mut interface_warnings: BTreeMap<u64, u64> = BTreeMap::new();
    let mut initial_penetrations: BTreeMap<u64, u64> = BTreeMap::new();
    let mut negative_volume = Vec::new();
    let mut constraint_nan = Vec::new();
    let mut warning_events: Vec<WarningEvent> = Vec::new();
    for (&code, &count) in &d3hsp.warning_counts {
        warning_events.push(WarningEvent { code, count, is_error: false, rank: None });
    }
    for (&code, &count) in &d3hsp.error_counts {
        warning_events.push(WarningEvent { code, count, is_error: true, rank: None });
    }
    for log in &data.messag {
        for (&code, &count) in &log.warning_counts {
            *warning_counts.entry(code).or_insert(0) += count;
            warning_events.push(WarningEvent { code, count, is_error: false, rank: log.rank });
        }
        for (&code, &count) in &log.error_counts {
            *error_counts.entry(code).or_insert(0) += count;
            warning_events.push(WarningEvent { code, count, is_error: true, rank: log.rank });
        }
        for (&interface, &count) in &log.interface_warning_counts {
            *interface_warnings.entry(interface).or_insert(0) += count;
        }
        for (&interface, &count) in &log.initial_penetrations {
            *initial_penetrations.entry(interface).or_insert(0) += count;
        }
        negative_volume.extend(log.negative_volume_events.iter().cloned());
        constraint_nan.extend(log.constraint_nan_lines.iter().cloned());
    }
    // Interfaces the printer log blamed per warning code count once each.
    for interfaces in d3hsp.warning_interfaces.values() {
        for &interface in interfaces {
            interface_warnings.entry(interface).or_insert(0);
        }
    }

    let mapper = ElementMapper::build(&d3hsp.smallest_timesteps, &energy_samples);

    let total_clock: f64 = d3hsp.phase_timings.iter().map(|p| p.clock_seconds).sum();
    let elapsed = if termination.elapsed_seconds > 0.0 {
        termination.elapsed_seconds
    } else {
        total_clock
    };
    let current_cores = (d3hsp.header.num_procs)
        .max(d3hsp.processor_timing.len() as u32)
        .max(data.load_profile.percentage.len() as u32);

    let energy_analysis = energy::analyze(&energy_samples);
    let timestep_analysis =
        timestep::analyze(&d3hsp.smallest_timesteps, &energy_samples, d3hsp.dt2ms);
    let contact_analysis = contact::analyze(
        &d3hsp.contact_timing,
        &d3hsp.contact_types,
        &interface_warnings,
        total_clock,
    );
    let performance_analysis = performance::analyze(
        &d3hsp.phase_timings,
        &d3hsp.processor_timing,
        &data.load_profile.percentage,
        &d3hsp.decomp,
    );
    let scaling_analysis = scaling::analyze(
        &d3hsp.phase_timings,
        current_cores,
        elapsed,
        &config.scaling_targets,
    );
    let failure_analysis = failure::analyze(
        &negative_volume,
        &constraint_nan,
        &mapper,
        &d3hsp.smallest_timesteps,
    );
    let warnings_analysis = warnings::analyze(
        &warning_counts,
        &d3hsp.warning_messages,
        &d3hsp.warning_interfaces,
        &error_counts,
        &data.coverage,
    );
    let termination_findings = termination::analyze(&termination);

    let contact_rank_spread = rank_spread(&data.cont_profile.absolute);

    let contacts = contact_summaries(
        &d3hsp.contact_definitions,
        &contact_analysis.overview.ranked_interfaces,
        &interface_warnings,
        &initial_penetrations,
    );

    let mut latest_per_part: BTreeMap<u64, MatsumRecord> = BTreeMap::new();
    for record in data.matsum.records {
        match latest_per_part.get(&record.part_id) {
            Some(existing) if existing.time >= record.time => {}
            _ => {
                latest_per_part.insert(record.part_id, record);
            }
        }
    }
    let part_energy: Vec<MatsumRecord> = latest_per_part.into_values().collect();

    let mut findings = Vec::new();
    findings.extend(termination_findings);
    findings.extend(energy_analysis.findings);
    findings.extend(timestep_analysis.findings);
    findings.extend(contact_analysis.findings);
    findings.extend(performance_analysis.findings);
    findings.extend(scaling_analysis.findings);
    findings.extend(data.instability.findings);
    findings.extend(failure_analysis.findings);
    findings.extend(warnings_analysis.findings);

    Ok(Report {
        header: d3hsp.header,
        model: d3hsp.model,
        termination,
        parts: d3hsp.parts,
        energy: energy_analysis.overview,
        timestep: timestep_analysis.overview,
        contacts,
        contact: contact_analysis.overview,
        contact_rank_spread,
        performance: performance_analysis.overview,
        scaling: scaling_analysis.overview,
        instability: data.instability.overview,
        failure: failure_analysis.overview,
        warnings: warnings_analysis.summaries,
        warning_events,
        status: data.status,
        part_energy,
        mass_properties: d3hsp.mass_properties,
        coverage: data.coverage,
        findings,
    })
}

/// Min/max/mean contact seconds per interface across ranks. Ranks that
/// spent no time on an interface are left out of its statistics.
fn rank_spread(entries: &[ContProfileEntry]) -> Vec<ContactRankSpread> {
    let mut ids: BTreeSet<u64> = BTreeSet::new();
    for entry in entries {
        ids.extend(entry.interface_timings.keys().copied());
    }

    ids.into_iter()
        .filter_map(|interface_id| {
            let values: Vec<f64> = entries
                .iter()
                .filter_map(|e| e.interface_timings.get(&interface_id).copied())
                .filter(|&v| v > 0.0)
                .collect();
            if values.is_empty() {
                return None;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some(ContactRankSpread {
                interface_id,
                min_seconds: min,
                max_seconds: max,
                mean_seconds: mean,
                imbalance_percent: if mean > 0.0 { (max - min) / mean * 100.0 } else { 0.0 },
            })
        })
        .collect()
}

/// Join declared interfaces with timing and warning figures, keyed by
/// interface id.
fn contact_summaries(
    definitions: &[crate::model::ContactDefinition],
    timings: &[crate::model::ContactTiming],
    interface_warnings: &BTreeMap<u64, u64>,
    initial_penetrations: &BTreeMap<u64, u64>,
) -> Vec<ContactInterfaceSummary> {
    let mut ids: BTreeSet<u64> = BTreeSet::new();
    ids.extend(definitions.iter().map(|d| d.contact_id));
    ids.extend(timings.iter().map(|t| t.interface_id));
    ids.extend(interface_warnings.keys().copied());

    ids.into_iter()
        .map(|interface_id| {
            let mut summary = ContactInterfaceSummary {
                interface_id,
                ..Default::default()
            };
            if let Some(def) = definitions.iter().find(|d| d.contact_id == interface_id) {
                summary.type_code = def.type_code.clone();
                summary.type_number = def.type_number;
                summary.title = def.title.clone();
            }
            if let Some(timing) = timings.iter().find(|t| t.interface_id == interface_id) {
                summary.cpu_seconds = timing.cpu_seconds;
                summary.cpu_percent = timing.cpu_percent;
                summary.clock_seconds = timing.clock_seconds;
                summary.clock_percent = timing.clock_percent;
            }
            summary.warning_count = interface_warnings.get(&interface_id).copied().unwrap_or(0);
            summary.initial_penetrations = initial_penetrations
                .get(&interface_id)
                .copied()
                .unwrap_or(0);
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContactDefinition, ContactTiming};
    use std::path::PathBuf;

    fn sample(cycle: u64, kinetic: f64) -> EnergySample {
        EnergySample {
            cycle,
            time: cycle as f64 * 1e-5,
            timestep: 1e-6,
            kinetic,
            internal: 10.0,
            total: kinetic + 10.0,
            energy_ratio: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_assemble__no_usable_input__then_empty_run_error() {
        let result = assemble(
            &PathBuf::from("/tmp/run"),
            RunData::default(),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(EngineError::EmptyRun { .. })));
    }

    #[test]
    fn test_assemble__glstat_only__then_report_with_incomplete_termination() {
        let mut data = RunData::default();
        data.glstat.samples = vec![sample(0, 5.0), sample(100, 5.0)];
        let report = assemble(
            &PathBuf::from("/tmp/run"),
            data,
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(report.termination.status, TerminationStatus::Incomplete);
        assert_eq!(report.energy.samples, 2);
        // Incomplete termination surfaces as a Critical finding.
        assert!(report
            .findings
            .iter()
            .any(|f| f.source == "termination" && f.severity == crate::model::Severity::Critical));
    }

    #[test]
    fn test_assemble__glstat_overrides_d3hsp_cycles() {
        let mut data = RunData::default();
        let mut d3hsp = D3hspData::default();
        d3hsp.energy_samples = vec![sample(100, 1.0)];
        data.d3hsp = Some(d3hsp);
        data.glstat.samples = vec![sample(100, 2.0)];
        let report = assemble(
            &PathBuf::from("/tmp/run"),
            data,
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(report.energy.samples, 1);
        // The overriding sample's total is kinetic 2.0 + internal 10.0.
        assert!((report.energy.initial_total - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_assemble__messag_error_banner__then_termination_upgraded() {
        let mut data = RunData::default();
        data.d3hsp = Some(D3hspData::default());
        data.glstat.samples = vec![sample(0, 5.0)];
        let mut log = MessagData::default();
        log.error_termination = true;
        data.messag = vec![log];
        let report = assemble(
            &PathBuf::from("/tmp/run"),
            data,
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(report.termination.status, TerminationStatus::ErrorTerminated);
    }

    #[test]
    fn test_contact_summaries__joined_by_interface_id() {
        let definitions = vec![ContactDefinition {
            order: 1,
            contact_id: 11,
            type_code: "a13".to_string(),
            type_number: 13,
            title: "bumper to rail".to_string(),
        }];
        let timings = vec![ContactTiming {
            interface_id: 11,
            cpu_seconds: 40.0,
            cpu_percent: 4.0,
            clock_seconds: 41.0,
            clock_percent: 4.1,
        }];
        let mut warnings = BTreeMap::new();
        warnings.insert(11u64, 250u64);
        warnings.insert(14u64, 3u64);
        let summaries =
            contact_summaries(&definitions, &timings, &warnings, &BTreeMap::new());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].interface_id, 11);
        assert_eq!(summaries[0].title, "bumper to rail");
        assert_eq!(summaries[0].warning_count, 250);
        assert!((summaries[0].clock_seconds - 41.0).abs() < 1e-9);
        // Interface known only from warnings still gets a row.
        assert_eq!(summaries[1].interface_id, 14);
        assert!(summaries[1].title.is_empty());
    }

    #[test]
    fn test_rank_spread__zero_ranks_excluded__then_imbalance_over_active_only() {
        let mut busy = ContProfileEntry {
            processor_id: 0,
            ..Default::default()
        };
        busy.interface_timings.insert(10, 12.0);
        busy.interface_timings.insert(11, 0.0);
        let mut idle = ContProfileEntry {
            processor_id: 1,
            ..Default::default()
        };
        idle.interface_timings.insert(10, 8.0);
        idle.interface_timings.insert(11, 4.0);

        let spread = rank_spread(&[busy, idle]);
        assert_eq!(spread.len(), 2);
        assert_eq!(spread[0].interface_id, 10);
        assert!((spread[0].mean_seconds - 10.0).abs() < 1e-9);
        assert!((spread[0].imbalance_percent - 40.0).abs() < 1e-9);
        // Only one rank touched interface 11, so there is no spread.
        assert_eq!(spread[1].interface_id, 11);
        assert!((spread[1].imbalance_percent).abs() < 1e-9);
    }

    #[test]
    fn test_assemble__identical_inputs__then_identical_json() {
        let build = || {
            let mut data = RunData::default();
            data.glstat.samples = vec![sample(0, 5.0), sample(100, 900.0)];
            let mut log = MessagData::default();
            log.warning_counts.insert(50135, 12);
            data.messag = vec![log];
            assemble(
                &PathBuf::from("/tmp/run"),
                data,
                &EngineConfig::default(),
            )
            .unwrap()
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }
}
