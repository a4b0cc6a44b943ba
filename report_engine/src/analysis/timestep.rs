//! Timestep diagnostics: collapse detection, controlling-element
//! intervals, and the smallest-timestep rankings.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{
    ControllingInterval, EnergySample, Evidence, Finding, Severity, TimestepRecord,
};

const SOURCE: &str = "timestep";

/// Below this the integration has effectively stopped advancing.
const DT_COLLAPSE: f64 = 1e-11;
/// Drop ratios relative to the initial timestep.
const DT_DROP_WARN: f64 = 0.50;
const DT_DROP_CRIT: f64 = 0.10;
/// Rankings are capped to keep reports readable.
const TOP_ELEMENTS: usize = 20;
const TOP_PARTS: usize = 100;

/// Per-part summary of the smallest-timestep table.
#[derive(Debug, Clone, Serialize)]
pub struct PartTimestepGroup {
    pub part_id: u64,
    pub entries: usize,
    pub min_dt: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimestepOverview {
    pub initial_dt: f64,
    pub final_dt: f64,
    pub min_dt: f64,
    pub min_dt_cycle: u64,
    /// Maximal spans of timestep control, in cycle order. Consecutive
    /// observations with the same controlling element share a span, so
    /// the spans cover every observed cycle exactly once.
    pub controlling_intervals: Vec<ControllingInterval>,
    /// The globally smallest element timesteps, ascending by dt.
    pub smallest_elements: Vec<TimestepRecord>,
    /// Parts grouped from the smallest-timestep table, ascending by
    /// their smallest dt.
    pub part_ranking: Vec<PartTimestepGroup>,
}

pub struct TimestepAnalysis {
    pub overview: TimestepOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(
    smallest: &[TimestepRecord],
    energy: &[EnergySample],
    dt2ms: f64,
) -> TimestepAnalysis {
    let mut findings = Vec::new();
    let mut overview = TimestepOverview::default();

    // Collapse and drop detection over the observed dt history.
    let mut collapsed = false;
    let mut drop_flagged = false;
    let initial_dt = energy.iter().map(|s| s.timestep).find(|&dt| dt > 0.0);
    overview.initial_dt = initial_dt.unwrap_or(0.0);
    overview.final_dt = energy.last().map(|s| s.timestep).unwrap_or(0.0);
    overview.min_dt = f64::INFINITY;

    for sample in energy {
        if sample.timestep <= 0.0 {
            continue;
        }
        if sample.timestep < overview.min_dt {
            overview.min_dt = sample.timestep;
            overview.min_dt_cycle = sample.cycle;
        }
        if sample.timestep < DT_COLLAPSE && !collapsed {
            collapsed = true;
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "timestep",
                    "Timestep collapse",
                    format!(
                        "Timestep fell to {:.4E} at cycle {} (t={:.4E}); the integration has \
                         effectively stopped advancing.",
                        sample.timestep, sample.cycle, sample.time
                    ),
                )
                .with_recommendation(
                    "Inspect the controlling element for extreme distortion. Add erosion \
                     criteria (*MAT_ADD_EROSION) or set TSMIN/ERODE in *CONTROL_TIMESTEP.",
                )
                .with_evidence(Evidence::Cycle(sample.cycle))
                .with_evidence(Evidence::Element(sample.controlling_element)),
            );
        } else if !collapsed && !drop_flagged {
            if let Some(initial) = initial_dt {
                let ratio = sample.timestep / initial;
                if ratio < DT_DROP_CRIT {
                    drop_flagged = true;
                    findings.push(
                        Finding::new(
                            Severity::Critical,
                            "timestep",
                            "Severe timestep drop",
                            format!(
                                "Timestep dropped to {:.1}% of its initial value (from {:.4E} \
                                 to {:.4E}) by cycle {}.",
                                ratio * 100.0,
                                initial,
                                sample.timestep,
                                sample.cycle
                            ),
                        )
                        .with_recommendation(
                            "Check the controlling elements for excessive deformation; \
                             consider erosion criteria or mesh improvement.",
                        )
                        .with_evidence(Evidence::Cycle(sample.cycle)),
                    );
                } else if ratio < DT_DROP_WARN {
                    drop_flagged = true;
                    findings.push(
                        Finding::new(
                            Severity::Warning,
                            "timestep",
                            "Significant timestep drop",
                            format!(
                                "Timestep dropped to {:.1}% of its initial value (from {:.4E} \
                                 to {:.4E}) by cycle {}.",
                                ratio * 100.0,
                                initial,
                                sample.timestep,
                                sample.cycle
                            ),
                        )
                        .with_recommendation(
                            "Monitor the controlling part; check element quality near the \
                             smallest-timestep elements.",
                        )
                        .with_evidence(Evidence::Cycle(sample.cycle)),
                    );
                }
            }
        }
    }
    if overview.min_dt.is_infinite() {
        overview.min_dt = 0.0;
    }

    overview.controlling_intervals = build_intervals(energy);

    // Global element ranking, ascending by dt.
    let mut ranked: Vec<TimestepRecord> = smallest.to_vec();
    ranked.sort_by(|a, b| {
        a.dt.partial_cmp(&b.dt)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.element_id.cmp(&b.element_id))
    });
    ranked.truncate(TOP_ELEMENTS);
    overview.smallest_elements = ranked;

    // Per-part grouping, ascending by the part's smallest dt.
    let mut groups: BTreeMap<u64, PartTimestepGroup> = BTreeMap::new();
    for record in smallest {
        let Some(part_id) = record.part_id else {
            continue;
        };
        let group = groups.entry(part_id).or_insert(PartTimestepGroup {
            part_id,
            entries: 0,
            min_dt: f64::INFINITY,
        });
        group.entries += 1;
        group.min_dt = group.min_dt.min(record.dt);
    }
    let mut part_ranking: Vec<PartTimestepGroup> = groups.into_values().collect();
    part_ranking.sort_by(|a, b| {
        a.min_dt
            .partial_cmp(&b.min_dt)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.part_id.cmp(&b.part_id))
    });
    part_ranking.truncate(TOP_PARTS);
    overview.part_ranking = part_ranking;

    if dt2ms != 0.0 {
        findings.push(
            Finding::new(
                Severity::Info,
                "timestep",
                "Mass scaling is active",
                format!(
                    "DT2MS = {dt2ms:.4E}. Mass is being added to maintain the target \
                     timestep size."
                ),
            )
            .with_recommendation(
                "Verify the added mass stays acceptable (below roughly 5% of total mass).",
            ),
        );
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    TimestepAnalysis { overview, findings }
}

/// Merge consecutive observations controlled by the same element.
/// A repeat of the controlling element extends the open span; any other
/// element closes it and opens a new one at that cycle.
fn build_intervals(energy: &[EnergySample]) -> Vec<ControllingInterval> {
    let mut intervals: Vec<ControllingInterval> = Vec::new();
    for sample in energy {
        if sample.controlling_element == 0 {
            continue;
        }
        match intervals.last_mut() {
            Some(open) if open.element_id == sample.controlling_element => {
                open.end_cycle = sample.cycle;
            }
            _ => intervals.push(ControllingInterval {
                start_cycle: sample.cycle,
                end_cycle: sample.cycle,
                element_id: sample.controlling_element,
            }),
        }
    }
    intervals
}
