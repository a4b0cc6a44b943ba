//! Contact diagnostics: per-interface warning pressure and contact
//! cost ranking from the end-of-run timing tables.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{ContactTiming, Evidence, Finding, Severity};

const SOURCE: &str = "contact";

/// Interfaces emitting this many warnings have a real setup problem.
const INTERFACE_WARNING_LIMIT: u64 = 100;
/// Contact share of total clock time.
const CONTACT_TIME_WARN: f64 = 0.40;
const CONTACT_TIME_INFO: f64 = 0.20;
/// Share of contact time concentrated in a single interface.
const DOMINANT_INTERFACE: f64 = 0.50;

/// Contact type number -> human name, as printed in the keyword manual.
fn contact_type_name(type_number: u32) -> String {
    match type_number {
        1 => "Sliding Only".to_string(),
        2 => "Tied".to_string(),
        3 => "Surface to Surface".to_string(),
        4 => "Single Surface".to_string(),
        5 => "Nodes to Surface".to_string(),
        6 => "Nodes Tied to Surface".to_string(),
        7 => "Shell Edge Tied to Shell".to_string(),
        8 => "Spotweld Nodes to Surface".to_string(),
        9 => "Tie-Break".to_string(),
        10 => "One-Way Surface to Surface".to_string(),
        13 => "Automatic Single Surface".to_string(),
        14 => "Eroding Surface to Surface".to_string(),
        15 => "Eroding Single Surface".to_string(),
        25 => "Automatic Surface to Surface (Offset)".to_string(),
        26 => "Automatic Single Surface (Offset)".to_string(),
        other => format!("Type {other}"),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactOverview {
    /// Interfaces ranked by clock time, most expensive first.
    pub ranked_interfaces: Vec<ContactTiming>,
    pub total_contact_clock: f64,
    /// Contact share of total clock time, 0 when no total is known.
    pub contact_share: f64,
    pub interface_warning_counts: BTreeMap<u64, u64>,
}

pub struct ContactAnalysis {
    pub overview: ContactOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(
    contact_timing: &[ContactTiming],
    contact_types: &BTreeMap<u64, u32>,
    interface_warnings: &BTreeMap<u64, u64>,
    total_clock_seconds: f64,
) -> ContactAnalysis {
    let mut findings = Vec::new();

    // Warning pressure per interface, in interface-id order.
    for (&interface_id, &count) in interface_warnings {
        if count > INTERFACE_WARNING_LIMIT {
            let type_name = contact_types
                .get(&interface_id)
                .map(|&t| contact_type_name(t))
                .unwrap_or_else(|| "unknown type".to_string());
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "contact",
                    format!("Interface {interface_id} emitted {count} warnings"),
                    format!(
                        "Contact interface {interface_id} ({type_name}) produced {count} \
                         warnings during the run, above the {INTERFACE_WARNING_LIMIT} limit."
                    ),
                )
                .with_recommendation(
                    "Review this interface's definition: mesh compatibility, search \
                     distance, and initial penetrations are the usual causes.",
                )
                .with_evidence(Evidence::Interface(interface_id)),
            );
        }
    }

    let mut ranked: Vec<ContactTiming> = contact_timing.to_vec();
    ranked.sort_by(|a, b| {
        b.clock_seconds
            .partial_cmp(&a.clock_seconds)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.interface_id.cmp(&b.interface_id))
    });
    let total_contact_clock: f64 = ranked.iter().map(|ct| ct.clock_seconds).sum();
    let total_contact_pct: f64 = ranked.iter().map(|ct| ct.clock_percent).sum();

    let contact_share = if total_clock_seconds > 0.0 {
        total_contact_clock / total_clock_seconds
    } else if total_contact_pct > 0.0 {
        total_contact_pct / 100.0
    } else {
        0.0
    };

    if contact_share > CONTACT_TIME_WARN {
        findings.push(
            Finding::new(
                Severity::Warning,
                "contact",
                format!("Contact dominates computation time ({:.0}%)", contact_share * 100.0),
                format!(
                    "The contact algorithm used {total_contact_clock:.1}s, {:.1}% of total \
                     clock time.",
                    contact_share * 100.0
                ),
            )
            .with_recommendation(
                "Use MPP groupable contacts where possible, reduce the contact search \
                 frequency (NSBCS in *CONTROL_CONTACT), and check whether some contacts \
                 can be removed or simplified.",
            ),
        );
    } else if contact_share > CONTACT_TIME_INFO {
        findings.push(
            Finding::new(
                Severity::Info,
                "contact",
                format!("Contact uses {:.0}% of total time", contact_share * 100.0),
                format!(
                    "The contact algorithm used {total_contact_clock:.1}s, {:.1}% of total \
                     clock time. Typical for contact-dominated models.",
                    contact_share * 100.0
                ),
            )
            .with_recommendation(
                "Review the per-interface timings; the dominant interfaces may benefit \
                 from bucket-sort tuning or segment-based contact.",
            ),
        );
    }

    // A single interface soaking up most of the contact budget.
    if let Some(top) = ranked.first() {
        if total_contact_clock > 0.0 {
            let top_share = top.clock_seconds / total_contact_clock;
            if top_share > DOMINANT_INTERFACE {
                let type_name = contact_types
                    .get(&top.interface_id)
                    .map(|&t| contact_type_name(t))
                    .unwrap_or_else(|| "unknown type".to_string());
                findings.push(
                    Finding::new(
                        Severity::Info,
                        "contact",
                        format!("Interface {} dominates contact cost", top.interface_id),
                        format!(
                            "Interface {} ({type_name}) used {:.2}s, {:.0}% of contact time \
                             across {} interfaces.",
                            top.interface_id,
                            top.clock_seconds,
                            top_share * 100.0,
                            ranked.len()
                        ),
                    )
                    .with_recommendation(
                        "Review this interface for optimization: bucket-sort options or a \
                         smaller segment count.",
                    )
                    .with_evidence(Evidence::Interface(top.interface_id)),
                );
            }
        }
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    ContactAnalysis {
        overview: ContactOverview {
            ranked_interfaces: ranked,
            total_contact_clock,
            contact_share,
            interface_warning_counts: interface_warnings.clone(),
        },
        findings,
    }
}
