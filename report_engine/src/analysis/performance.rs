//! Performance diagnostics: phase cost breakdown, per-processor load
//! balance, and decomposition quality.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{
    DecompMetrics, Evidence, Finding, LoadProfileEntry, PhaseTiming, ProcessorTiming, Severity,
};

const SOURCE: &str = "performance";

/// A phase this expensive is the primary cost of the run.
const PHASE_COST_INFO: f64 = 0.25;
/// Contact this expensive usually means a tunable contact setup.
const CONTACT_PHASE_WARN: f64 = 0.40;
/// Total MPI sharing overhead as a fraction of clock time.
const SHARING_OVERHEAD_WARN: f64 = 0.25;
/// Coefficient of variation of one component across processors.
const COMPONENT_COV_WARN: f64 = 0.08;
/// Spread of per-rank CPU ratios.
const MPP_IMBALANCE_WARN: f64 = 0.15;
/// Decomposition cost spread (max - min) / max.
const DECOMP_IMBALANCE_WARN: f64 = 0.30;
const DECOMP_IMBALANCE_CRIT: f64 = 0.50;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceOverview {
    pub total_clock_seconds: f64,
    pub phases: Vec<PhaseTiming>,
    /// Coefficient of variation across processors, per profile component.
    pub component_variation: BTreeMap<&'static str, f64>,
    pub processor_count: usize,
}

pub struct PerformanceAnalysis {
    pub overview: PerformanceOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(
    phases: &[PhaseTiming],
    processors: &[ProcessorTiming],
    load_profile_pct: &[LoadProfileEntry],
    decomp: &DecompMetrics,
) -> PerformanceAnalysis {
    let mut findings = Vec::new();
    let total_clock: f64 = phases.iter().map(|p| p.clock_seconds).sum();

    for phase in phases {
        let share = phase.clock_percent / 100.0;
        let is_contact = phase.component.to_lowercase().contains("contact");
        if is_contact && share > CONTACT_PHASE_WARN {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "performance",
                    format!(
                        "Contact phase dominates the run ({:.1}%)",
                        phase.clock_percent
                    ),
                    format!(
                        "{}: {:.1}s clock ({:.1}%), {:.1}s CPU ({:.1}%).",
                        phase.component,
                        phase.clock_seconds,
                        phase.clock_percent,
                        phase.cpu_seconds,
                        phase.cpu_percent
                    ),
                )
                .with_recommendation(
                    "Tune the contact setup: groupable contacts, bucket-sort frequency \
                     (NSBCS), or fewer contact segments.",
                ),
            );
        } else if share > PHASE_COST_INFO {
            findings.push(Finding::new(
                Severity::Info,
                "performance",
                format!(
                    "{} is the primary cost ({:.1}%)",
                    phase.component, phase.clock_percent
                ),
                format!(
                    "{}: {:.1}s clock ({:.1}%), {:.1}s CPU ({:.1}%).",
                    phase.component,
                    phase.clock_seconds,
                    phase.clock_percent,
                    phase.cpu_seconds,
                    phase.cpu_percent
                ),
            ));
        }
    }

    // Sharing rows are the MPI exchange cost.
    let sharing_pct: f64 = phases
        .iter()
        .filter(|p| {
            let name = p.component.to_lowercase();
            name.contains("sharing") || name.contains("shr")
        })
        .map(|p| p.clock_percent)
        .sum();
    if sharing_pct > SHARING_OVERHEAD_WARN * 100.0 {
        findings.push(
            Finding::new(
                Severity::Warning,
                "performance",
                format!("High MPI sharing overhead ({sharing_pct:.1}%)"),
                format!(
                    "Sharing phases total {sharing_pct:.1}% of clock time, which points \
                     at excessive inter-process communication."
                ),
            )
            .with_recommendation(
                "Reduce the MPI rank count or improve the decomposition. High sharing \
                 overhead usually means too many ranks for the model size.",
            ),
        );
    }

    // Spread of each work component across processors.
    let mut component_variation: BTreeMap<&'static str, f64> = BTreeMap::new();
    if load_profile_pct.len() > 1 {
        let mut sums: BTreeMap<&'static str, (f64, f64)> = BTreeMap::new();
        for entry in load_profile_pct {
            for (name, value) in entry.components() {
                let slot = sums.entry(name).or_insert((0.0, 0.0));
                slot.0 += value;
                slot.1 += value * value;
            }
        }
        let n = load_profile_pct.len() as f64;
        for (name, (sum, sum_sq)) in sums {
            let mean = sum / n;
            if mean < 1.0 {
                continue;
            }
            let variance = (sum_sq / n - mean * mean).max(0.0);
            let cov = variance.sqrt() / mean;
            component_variation.insert(name, cov);
            if cov > COMPONENT_COV_WARN {
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        "performance",
                        format!("Uneven {name} load across processors"),
                        format!(
                            "The {name} component varies with a coefficient of variation \
                             of {:.1}% across {} processors (mean {mean:.1}%).",
                            cov * 100.0,
                            load_profile_pct.len()
                        ),
                    )
                    .with_recommendation(
                        "Rebalance the decomposition so this work spreads evenly; \
                         *CONTROL_MPP_DECOMPOSITION options can weight it explicitly.",
                    ),
                );
            }
        }
    }

    // Per-rank CPU ratio spread from the parallel timing table.
    if !processors.is_empty() {
        let min = processors
            .iter()
            .map(|p| p.cpu_ratio)
            .fold(f64::INFINITY, f64::min);
        let max = processors
            .iter()
            .map(|p| p.cpu_ratio)
            .fold(f64::NEG_INFINITY, f64::max);
        let imbalance = max - min;
        if imbalance > MPP_IMBALANCE_WARN {
            let slowest = processors
                .iter()
                .max_by(|a, b| a.cpu_ratio.partial_cmp(&b.cpu_ratio).unwrap())
                .unwrap();
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "performance",
                    format!("MPP load imbalance: {:.1}%", imbalance * 100.0),
                    format!(
                        "Per-rank CPU ratio spans [{min:.4}, {max:.4}]; rank {} ({}) is \
                         the slowest.",
                        slowest.processor_id, slowest.hostname
                    ),
                )
                .with_recommendation(
                    "Review the domain decomposition; *CONTROL_MPP_DECOMPOSITION with \
                     RCBLOG often balances this better.",
                )
                .with_evidence(Evidence::Rank(slowest.processor_id)),
            );
        }
    }

    // Decomposition cost spread printed before time stepping.
    if decomp.max_cost > 0.0 {
        let imbalance = (decomp.max_cost - decomp.min_cost) / decomp.max_cost;
        if imbalance > DECOMP_IMBALANCE_CRIT {
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "performance",
                    format!("Severe decomposition imbalance ({:.0}%)", imbalance * 100.0),
                    format!(
                        "Decomposition cost spans [{:.3E}, {:.3E}] (std dev {:.3E}); more \
                         than half the budget of the busiest domain is idle elsewhere.",
                        decomp.min_cost, decomp.max_cost, decomp.std_deviation
                    ),
                )
                .with_recommendation(
                    "Redo the decomposition: fewer ranks, or explicit weighting of the \
                     expensive regions in *CONTROL_MPP_DECOMPOSITION.",
                ),
            );
        } else if imbalance > DECOMP_IMBALANCE_WARN {
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "performance",
                    format!("Decomposition imbalance ({:.0}%)", imbalance * 100.0),
                    format!(
                        "Decomposition cost spans [{:.3E}, {:.3E}] (std dev {:.3E}).",
                        decomp.min_cost, decomp.max_cost, decomp.std_deviation
                    ),
                )
                .with_recommendation(
                    "Check the decomposition method and consider weighting contact-heavy \
                     regions.",
                ),
            );
        }
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    PerformanceAnalysis {
        overview: PerformanceOverview {
            total_clock_seconds: total_clock,
            phases: phases.to_vec(),
            component_variation,
            processor_count: processors.len(),
        },
        findings,
    }
}
