//! Failure-source attribution: which elements and parts broke the run.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::mapper::ElementMapper;
use crate::model::{Evidence, Finding, Severity, TimestepRecord};
use crate::readers::messag::FailedElementEvent;

const SOURCE: &str = "failure";

/// One part owning this much of the smallest-timestep table is the
/// bottleneck of the whole run.
const PART_BOTTLENECK_SHARE: f64 = 0.80;

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureOverview {
    pub failed_element_count: usize,
    pub negative_volume_occurrences: u64,
    pub constraint_nan_count: usize,
    pub affected_parts: Vec<u64>,
}

pub struct FailureAnalysis {
    pub overview: FailureOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(
    negative_volume: &[FailedElementEvent],
    constraint_nan: &[String],
    mapper: &ElementMapper,
    smallest: &[TimestepRecord],
) -> FailureAnalysis {
    let mut findings = Vec::new();
    let mut overview = FailureOverview::default();

    // Fold repeats of the same element into one record, keeping the
    // earliest observation.
    let mut by_element: BTreeMap<u64, (u64, &FailedElementEvent)> = BTreeMap::new();
    for event in negative_volume {
        overview.negative_volume_occurrences += 1;
        let entry = by_element.entry(event.element_id).or_insert((0, event));
        entry.0 += 1;
    }
    overview.failed_element_count = by_element.len();

    let mut affected_parts: Vec<u64> = Vec::new();
    for (&element_id, &(occurrences, first)) in &by_element {
        let part = mapper.owning_part(element_id);
        if let Some(part_id) = part {
            if !affected_parts.contains(&part_id) {
                affected_parts.push(part_id);
            }
        }
        let where_clause = match (part, first.cycle) {
            (Some(p), Some(c)) => format!(" in part {p}, first seen at cycle {c}"),
            (Some(p), None) => format!(" in part {p}"),
            (None, Some(c)) => format!(", first seen at cycle {c}"),
            (None, None) => String::new(),
        };
        let mut finding = Finding::new(
            Severity::Critical,
            "failure",
            format!("Negative volume in element {element_id}"),
            format!(
                "Element {element_id} developed negative volume{where_clause}. The \
                 element is distorted beyond physical limits."
            ),
        )
        .with_recommendation(
            "Check mesh quality around this element. Add *MAT_ADD_EROSION to remove \
             extremely distorted elements, or set TSMIN with ERODE=1 in \
             *CONTROL_TIMESTEP.",
        )
        .with_evidence(Evidence::Element(element_id));
        if let Some(part_id) = part {
            finding = finding.with_evidence(Evidence::Part(part_id));
        }
        if let Some(cycle) = first.cycle {
            finding = finding.with_evidence(Evidence::Cycle(cycle));
        }
        finding.occurrences = occurrences;
        findings.push(finding);
    }
    overview.affected_parts = affected_parts;

    overview.constraint_nan_count = constraint_nan.len();
    if !constraint_nan.is_empty() {
        let mut finding = Finding::new(
            Severity::Critical,
            "failure",
            "Constraint matrix NaN detected",
            format!(
                "The constraint matrix produced NaN values ({} occurrences). This \
                 usually accompanies shooting nodes.",
                constraint_nan.len()
            ),
        )
        .with_recommendation(
            "Inspect *CONSTRAINED_* definitions and check nodal velocities and \
             displacements for runaway nodes.",
        );
        finding.occurrences = constraint_nan.len() as u64;
        findings.push(finding);
    }

    // One part hogging the smallest-timestep table limits the run even
    // when nothing has failed yet.
    let mut part_counts: BTreeMap<u64, (usize, f64)> = BTreeMap::new();
    let mut total = 0usize;
    for record in smallest {
        let Some(part_id) = record.part_id else {
            continue;
        };
        total += 1;
        let entry = part_counts.entry(part_id).or_insert((0, f64::INFINITY));
        entry.0 += 1;
        entry.1 = entry.1.min(record.dt);
    }
    if total > 0 {
        for (&part_id, &(count, min_dt)) in &part_counts {
            let share = count as f64 / total as f64;
            if share > PART_BOTTLENECK_SHARE {
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        "failure",
                        format!(
                            "Part {part_id}: timestep bottleneck ({:.0}%)",
                            share * 100.0
                        ),
                        format!(
                            "Part {part_id} holds {count} of the {total} \
                             smallest-timestep entries ({:.0}%), min dt {min_dt:.3E}. \
                             Its mesh is limiting the whole run.",
                            share * 100.0
                        ),
                    )
                    .with_recommendation(
                        "Coarsen or remove the very small elements of this part, \
                         consider mass scaling (DT2MS), and check element quality \
                         (aspect ratio, warpage).",
                    )
                    .with_evidence(Evidence::Part(part_id)),
                );
            }
        }
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    FailureAnalysis { overview, findings }
}
