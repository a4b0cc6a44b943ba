//! Energy-balance diagnostics over the glstat history.
//!
//! Crossing-style checks (hourglass share, kinetic/internal) fire once,
//! at the first sample past the threshold. Per-sample checks (energy
//! ratio) fire for every offending sample. All findings carry the cycle
//! and time of the sample that triggered them.

use serde::Serialize;

use crate::model::{EnergySample, Evidence, Finding, Severity};

const SOURCE: &str = "energy";

/// Hourglass/internal share thresholds.
const HOURGLASS_WARN: f64 = 0.10;
const HOURGLASS_CRIT: f64 = 0.20;
/// Absolute deviation of the solver's energy ratio from 1.0.
const ENERGY_RATIO_CRIT: f64 = 4.0;
/// The nominal healthy band for the energy ratio.
const ENERGY_RATIO_BAND: (f64, f64) = (0.95, 1.05);
/// Kinetic energy growth factor between consecutive samples.
const KINETIC_JUMP: f64 = 100.0;
/// Kinetic/internal share considered suspicious late in a run.
const KINETIC_INTERNAL_WARN: f64 = 10.0;
/// Sliding energy share of total.
const SLIDING_SHARE_WARN: f64 = 0.30;
/// Sliding energy spike factor between consecutive samples.
const SLIDING_SPIKE: f64 = 50.0;

/// Aggregate figures for the report body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnergyOverview {
    pub samples: usize,
    pub initial_total: f64,
    pub final_total: f64,
    pub max_hourglass_ratio: f64,
    pub max_sliding_ratio: f64,
    pub energy_ratio_range: [f64; 2],
}

pub struct EnergyAnalysis {
    pub overview: EnergyOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(samples: &[EnergySample]) -> EnergyAnalysis {
    let mut findings = Vec::new();
    let mut overview = EnergyOverview {
        samples: samples.len(),
        energy_ratio_range: [1.0, 1.0],
        ..Default::default()
    };
    if samples.is_empty() {
        return EnergyAnalysis { overview, findings };
    }

    overview.initial_total = samples[0].total;
    overview.final_total = samples[samples.len() - 1].total;
    let mut ratio_min = f64::INFINITY;
    let mut ratio_max = f64::NEG_INFINITY;

    let mut hourglass_warned = false;
    let mut hourglass_crit = false;
    let mut kinetic_share_warned = false;
    let mut sliding_share_warned = false;
    let mut prev: Option<&EnergySample> = None;

    for sample in samples {
        let at = |finding: Finding| {
            finding
                .with_evidence(Evidence::Cycle(sample.cycle))
                .with_evidence(Evidence::Time(sample.time))
        };

        // Hourglass share of internal energy, first crossings only.
        if sample.internal > 0.0 {
            let hg_ratio = sample.hourglass / sample.internal;
            overview.max_hourglass_ratio = overview.max_hourglass_ratio.max(hg_ratio);
            if hg_ratio > HOURGLASS_CRIT && !hourglass_crit {
                hourglass_crit = true;
                findings.push(at(Finding::new(
                    Severity::Critical,
                    "energy",
                    "Hourglass energy critically high",
                    format!(
                        "Hourglass/internal energy ratio reached {:.1}% at cycle {} (t={:.4E}). \
                         This indicates severe zero-energy mode deformation.",
                        hg_ratio * 100.0,
                        sample.cycle,
                        sample.time
                    ),
                )
                .with_recommendation(
                    "Increase hourglass control stiffness (IHQ/QH in *CONTROL_HOURGLASS) or \
                     switch to fully integrated elements (ELFORM=2 for solids, ELFORM=16 for shells).",
                )));
            } else if hg_ratio > HOURGLASS_WARN && !hourglass_warned && !hourglass_crit {
                hourglass_warned = true;
                findings.push(at(Finding::new(
                    Severity::Warning,
                    "energy",
                    "Hourglass energy exceeds 10% of internal energy",
                    format!(
                        "Hourglass/internal energy ratio reached {:.1}% at cycle {} (t={:.4E}). \
                         Hourglass energy should generally stay below 10% of internal energy.",
                        hg_ratio * 100.0,
                        sample.cycle,
                        sample.time
                    ),
                )
                .with_recommendation(
                    "Review hourglass control settings; type 5 (Flanagan-Belytschko) for solids \
                     or a higher QH coefficient usually helps.",
                )));
            }
        }

        // Solver energy ratio, one finding per offending sample.
        ratio_min = ratio_min.min(sample.energy_ratio);
        ratio_max = ratio_max.max(sample.energy_ratio);
        let deviation = (sample.energy_ratio - 1.0).abs();
        let outside_band = sample.energy_ratio < ENERGY_RATIO_BAND.0
            || sample.energy_ratio > ENERGY_RATIO_BAND.1;
        if outside_band && deviation > ENERGY_RATIO_CRIT {
            findings.push(at(Finding::new(
                Severity::Critical,
                "energy",
                "Energy balance severely violated",
                format!(
                    "Energy ratio {:.6} at cycle {} (t={:.4E}) deviates from 1.0 by {:.2}. \
                     This indicates numerical instability or an energy source/sink.",
                    sample.energy_ratio, sample.cycle, sample.time, deviation
                ),
            )
            .with_recommendation(
                "Check for contact energy growth, mass scaling effects, or improperly \
                 defined loads. Enable *CONTROL_ENERGY output to identify the source.",
            )));
        }

        if let Some(previous) = prev {
            // Sudden kinetic energy injection.
            if previous.kinetic > 0.0 && sample.kinetic >= KINETIC_JUMP * previous.kinetic {
                findings.push(at(Finding::new(
                    Severity::Warning,
                    "energy",
                    "Sudden kinetic energy jump",
                    format!(
                        "Kinetic energy jumped from {:.4E} to {:.4E} between cycles {} and {} \
                         (factor {:.0}).",
                        previous.kinetic,
                        sample.kinetic,
                        previous.cycle,
                        sample.cycle,
                        sample.kinetic / previous.kinetic
                    ),
                )
                .with_recommendation(
                    "Look for shooting nodes or a contact release near the jump; check \
                     nodal velocities around the reported cycle.",
                )));
            }
            // Sliding energy spike.
            if previous.sliding_interface.abs() > 0.0
                && sample.sliding_interface.abs() >= SLIDING_SPIKE * previous.sliding_interface.abs()
                && !sliding_share_warned
            {
                sliding_share_warned = true;
                findings.push(at(Finding::new(
                    Severity::Warning,
                    "energy",
                    "Sliding interface energy spike",
                    format!(
                        "Sliding interface energy spiked from {:.4E} to {:.4E} between cycles \
                         {} and {}.",
                        previous.sliding_interface,
                        sample.sliding_interface,
                        previous.cycle,
                        sample.cycle
                    ),
                )
                .with_recommendation(
                    "Check contact definitions for sudden penetration resolution; consider \
                     SOFT=1 or adjusted penalty stiffness (SLSFAC).",
                )));
            }
        }

        // Kinetic dominating internal late in the run.
        if sample.internal > 0.0
            && sample.kinetic / sample.internal > KINETIC_INTERNAL_WARN
            && !kinetic_share_warned
        {
            kinetic_share_warned = true;
            findings.push(at(Finding::new(
                Severity::Warning,
                "energy",
                "Kinetic energy dominates internal energy",
                format!(
                    "Kinetic/internal energy ratio {:.1} at cycle {} (t={:.4E}).",
                    sample.kinetic / sample.internal,
                    sample.cycle,
                    sample.time
                ),
            )
            .with_recommendation(
                "For a structure expected to absorb energy this suggests rigid-body motion \
                 or unconstrained parts; verify boundary conditions.",
            )));
        }

        // Sliding share of total energy.
        if sample.total.abs() > 0.0 {
            let slide_ratio = sample.sliding_interface.abs() / sample.total.abs();
            overview.max_sliding_ratio = overview.max_sliding_ratio.max(slide_ratio);
            if slide_ratio > SLIDING_SHARE_WARN && !sliding_share_warned {
                sliding_share_warned = true;
                findings.push(at(Finding::new(
                    Severity::Warning,
                    "energy",
                    "High sliding interface energy",
                    format!(
                        "Sliding interface energy is {:.1}% of total energy at cycle {} \
                         (t={:.4E}). This may indicate contact instability or excessive \
                         penetration.",
                        slide_ratio * 100.0,
                        sample.cycle,
                        sample.time
                    ),
                )
                .with_recommendation(
                    "Check contact definitions for excessive penetration. Consider a higher \
                     penalty stiffness (SLSFAC) or soft constraint (SOFT=1).",
                )));
            }
        }

        prev = Some(sample);
    }

    overview.energy_ratio_range = [ratio_min, ratio_max];
    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    EnergyAnalysis { overview, findings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementKind;

    fn sample(cycle: u64, kinetic: f64, internal: f64, hourglass: f64, ratio: f64) -> EnergySample {
        EnergySample {
            cycle,
            time: cycle as f64 * 1e-5,
            kinetic,
            internal,
            hourglass,
            total: kinetic + internal,
            energy_ratio: ratio,
            controlling_element_kind: ElementKind::Shell,
            ..Default::default()
        }
    }

    #[test]
    fn test_energy__hourglass_crossings__then_warning_then_critical_once() {
        let samples = vec![
            sample(1, 100.0, 100.0, 5.0, 1.0),
            sample(2, 100.0, 100.0, 12.0, 1.0),
            sample(3, 100.0, 100.0, 15.0, 1.0),
            sample(4, 100.0, 100.0, 25.0, 1.0),
            sample(5, 100.0, 100.0, 30.0, 1.0),
        ];
        let result = analyze(&samples);
        let hg: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.title.contains("Hourglass"))
            .collect();
        assert_eq!(hg.len(), 2);
        assert_eq!(hg[0].severity, Severity::Warning);
        assert!(hg[0].evidence.contains(&Evidence::Cycle(2)));
        assert_eq!(hg[1].severity, Severity::Critical);
        assert!(hg[1].evidence.contains(&Evidence::Cycle(4)));
    }

    #[test]
    fn test_energy__ratio_within_band__then_no_balance_finding() {
        let samples = vec![sample(1, 1.0, 1.0, 0.0, 1.04), sample(2, 1.0, 1.0, 0.0, 0.96)];
        let result = analyze(&samples);
        assert!(result
            .findings
            .iter()
            .all(|f| !f.title.contains("Energy balance")));
    }

    #[test]
    fn test_energy__ratio_blowup__then_critical_per_offending_sample() {
        let samples = vec![
            sample(1, 1.0, 1.0, 0.0, 1.0),
            sample(2, 1.0, 1.0, 0.0, 6.0),
            sample(3, 1.0, 1.0, 0.0, 7.5),
        ];
        let result = analyze(&samples);
        let violations: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.title.contains("Energy balance"))
            .collect();
        assert_eq!(violations.len(), 2);
        assert!(violations[0].evidence.contains(&Evidence::Cycle(2)));
        assert!(violations[1].evidence.contains(&Evidence::Cycle(3)));
    }

    #[test]
    fn test_energy__kinetic_jump__then_warning_with_both_cycles_in_detail() {
        let samples = vec![sample(1, 10.0, 100.0, 0.0, 1.0), sample(2, 5000.0, 100.0, 0.0, 1.0)];
        let result = analyze(&samples);
        let jump = result
            .findings
            .iter()
            .find(|f| f.title.contains("kinetic energy jump"))
            .unwrap();
        assert_eq!(jump.severity, Severity::Warning);
        assert!(jump.detail.contains("factor 500"));
    }

    #[test]
    fn test_energy__kinetic_dominates_internal__then_single_warning() {
        let samples = vec![
            sample(1, 2000.0, 100.0, 0.0, 1.0),
            sample(2, 2500.0, 100.0, 0.0, 1.0),
        ];
        let result = analyze(&samples);
        let dominance: Vec<&Finding> = result
            .findings
            .iter()
            .filter(|f| f.title.contains("dominates"))
            .collect();
        assert_eq!(dominance.len(), 1);
    }

    #[test]
    fn test_energy__findings_in_evidence_order__then_not_severity_sorted() {
        // Warning at cycle 2 precedes Critical at cycle 4.
        let samples = vec![
            sample(1, 100.0, 100.0, 5.0, 1.0),
            sample(2, 100.0, 100.0, 12.0, 1.0),
            sample(3, 100.0, 100.0, 15.0, 1.0),
            sample(4, 100.0, 100.0, 25.0, 1.0),
        ];
        let result = analyze(&samples);
        assert_eq!(result.findings[0].severity, Severity::Warning);
        assert_eq!(result.findings[1].severity, Severity::Critical);
    }

    #[test]
    fn test_energy__empty_history__then_empty_result() {
        let result = analyze(&[]);
        assert!(result.findings.is_empty());
        assert_eq!(result.overview.samples, 0);
    }
}
