//! Scaling extrapolation from the end-of-run phase timings.
//!
//! Everything here is a model, not a measurement: compute shrinks
//! ideally with the core ratio, communication grows as sqrt(ratio),
//! serial work stays constant. Findings say so explicitly.

use serde::Serialize;

use crate::model::{Finding, PhaseTiming, ScalingBand, ScalingProjection, Severity};

const SOURCE: &str = "scaling";

/// Projected-efficiency band edges.
const EFFICIENCY_SEVERE: f64 = 50.0;
const EFFICIENCY_CAUTIONARY: f64 = 70.0;

const PARALLEL_KEYWORDS: &[&str] = &["element", "contact", "rigid"];
const COMM_KEYWORDS: &[&str] = &["sharing", "shr", "share"];
const SERIAL_KEYWORDS: &[&str] = &[
    "keyword",
    "initialization",
    "decomposition",
    "init solver",
    "binary database",
    "ascii database",
    "sense switch",
    "group force",
    "time step size",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScalingOverview {
    pub current_cores: u32,
    pub parallel_seconds: f64,
    pub comm_seconds: f64,
    pub serial_seconds: f64,
    pub projections: Vec<ScalingProjection>,
}

pub struct ScalingAnalysis {
    pub overview: ScalingOverview,
    pub findings: Vec<Finding>,
}

pub fn analyze(
    phases: &[PhaseTiming],
    current_cores: u32,
    elapsed_seconds: f64,
    targets: &[u32],
) -> ScalingAnalysis {
    let mut overview = ScalingOverview {
        current_cores,
        ..Default::default()
    };
    let mut findings = Vec::new();

    if phases.is_empty() || current_cores == 0 || elapsed_seconds <= 0.0 {
        return ScalingAnalysis { overview, findings };
    }

    for phase in phases {
        let name = phase.component.to_lowercase();
        if COMM_KEYWORDS.iter().any(|k| name.contains(k)) {
            overview.comm_seconds += phase.clock_seconds;
        } else if PARALLEL_KEYWORDS.iter().any(|k| name.contains(k)) {
            overview.parallel_seconds += phase.clock_seconds;
        } else if SERIAL_KEYWORDS.iter().any(|k| name.contains(k)) {
            overview.serial_seconds += phase.clock_seconds;
        } else {
            // Components the classifier has no verdict on split evenly.
            overview.parallel_seconds += phase.clock_seconds * 0.5;
            overview.serial_seconds += phase.clock_seconds * 0.5;
        }
    }

    for &target in targets {
        if target <= current_cores {
            continue;
        }
        let ratio = target as f64 / current_cores as f64;
        let est_elapsed = overview.parallel_seconds / ratio
            + overview.comm_seconds * ratio.sqrt()
            + overview.serial_seconds;
        let est_speedup = if est_elapsed > 0.0 {
            elapsed_seconds / est_elapsed
        } else {
            0.0
        };
        let est_efficiency_percent = est_speedup / ratio * 100.0;
        let band = if est_efficiency_percent < EFFICIENCY_SEVERE {
            ScalingBand::Severe
        } else if est_efficiency_percent < EFFICIENCY_CAUTIONARY {
            ScalingBand::Cautionary
        } else {
            ScalingBand::Acceptable
        };
        let projection = ScalingProjection {
            target_cores: target,
            est_elapsed_seconds: est_elapsed,
            est_speedup,
            est_efficiency_percent,
            band,
        };

        match band {
            ScalingBand::Severe => findings.push(
                Finding::new(
                    Severity::Warning,
                    "scaling",
                    format!("Projection: poor scaling expected at {target} cores"),
                    format!(
                        "Projected efficiency at {target} cores is {est_efficiency_percent:.0}% \
                         (estimated {est_elapsed:.0}s elapsed, {est_speedup:.2}x speedup over \
                         the current {current_cores}-core run). This is a model-based \
                         projection, not a measurement."
                    ),
                )
                .with_recommendation(
                    "Communication and serial phases dominate at this scale. Stay near the \
                     current core count, or reduce the communication share first.",
                ),
            ),
            ScalingBand::Cautionary => findings.push(Finding::new(
                Severity::Info,
                "scaling",
                format!("Projection: diminishing returns at {target} cores"),
                format!(
                    "Projected efficiency at {target} cores is {est_efficiency_percent:.0}% \
                     ({est_speedup:.2}x speedup over the current {current_cores}-core run). \
                     This is a model-based projection, not a measurement."
                ),
            )),
            ScalingBand::Acceptable => {}
        }
        overview.projections.push(projection);
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    ScalingAnalysis { overview, findings }
}
