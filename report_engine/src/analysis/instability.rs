//! Numerical-instability detection from the nodal and boundary-force
//! time histories.
//!
//! Both inputs are consumed as pull streams so the full history never
//! sits in memory; per-node state is a bounded trailing window.

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::error::Result;
use crate::model::{BoundarySample, Evidence, Finding, NodalSample, Severity};

const SOURCE: &str = "instability";

/// Speed above this is non-physical for structural analysis.
const SHOOTING_SPEED: f64 = 1000.0;
/// Zero-crossing rate above this is numerical, not structural.
const OSCILLATION_HZ: f64 = 10_000.0;
/// Peak-to-mean force ratio marking a contact spike.
const FORCE_SPIKE_RATIO: f64 = 100.0;
/// Trailing window for the boundary-force damping check.
const DAMPING_WINDOW: usize = 64;
/// Fraction of consecutive pairs that must alternate sign.
const ALTERNATION_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstabilityOverview {
    pub nodes_tracked: usize,
    pub nodal_samples: u64,
    pub shooting_nodes: usize,
    pub oscillating_nodes: usize,
    pub boundary_nodes_tracked: usize,
    pub boundary_samples: u64,
    pub spike_nodes: usize,
    pub undamped_nodes: usize,
}

#[derive(Default)]
pub struct InstabilityAnalysis {
    pub overview: InstabilityOverview,
    pub findings: Vec<Finding>,
}

struct NodeState {
    max_speed: f64,
    max_speed_time: f64,
    /// Trailing (time, x-velocity) window for the oscillation check.
    window: VecDeque<(f64, f64)>,
}

struct BoundaryState {
    count: u64,
    sum_magnitude: f64,
    max_magnitude: f64,
    peak: BoundarySample,
    window: VecDeque<f64>,
}

/// Consume both streams and flag shooting nodes, high-frequency
/// oscillation, force spikes, and undamped boundary oscillation.
pub fn analyze(
    mut next_nodal: impl FnMut() -> Result<Option<NodalSample>>,
    mut next_boundary: impl FnMut() -> Result<Option<BoundarySample>>,
    oscillation_window: usize,
) -> Result<InstabilityAnalysis> {
    let mut overview = InstabilityOverview::default();
    let mut findings = Vec::new();

    let mut nodes: BTreeMap<u64, NodeState> = BTreeMap::new();
    while let Some(sample) = next_nodal()? {
        overview.nodal_samples += 1;
        let state = nodes.entry(sample.node_id).or_insert(NodeState {
            max_speed: 0.0,
            max_speed_time: 0.0,
            window: VecDeque::with_capacity(oscillation_window),
        });
        let speed = sample.speed();
        if speed > state.max_speed {
            state.max_speed = speed;
            state.max_speed_time = sample.time;
        }
        if state.window.len() == oscillation_window {
            state.window.pop_front();
        }
        state.window.push_back((sample.time, sample.velocity[0]));
    }
    overview.nodes_tracked = nodes.len();

    for (&node_id, state) in &nodes {
        if state.max_speed > SHOOTING_SPEED {
            overview.shooting_nodes += 1;
            findings.push(
                Finding::new(
                    Severity::Critical,
                    "instability",
                    format!("Shooting node {node_id}"),
                    format!(
                        "Node {node_id} reached a velocity magnitude of {:.2E} at \
                         t={:.4E}, above the {SHOOTING_SPEED:.0} limit. Velocities this \
                         large come from constraint errors, excessive contact \
                         penetration, or an overly stiff penalty contact.",
                        state.max_speed, state.max_speed_time
                    ),
                )
                .with_recommendation(
                    "Check *CONSTRAINED_* definitions involving this node, remove \
                     initial penetrations in nearby contacts, and reduce the penalty \
                     stiffness (SLSFAC < 0.1).",
                )
                .with_evidence(Evidence::Node(node_id))
                .with_evidence(Evidence::Time(state.max_speed_time)),
            );
        }
        if let Some(zcr) = zero_crossing_rate(&state.window) {
            if zcr > OSCILLATION_HZ {
                overview.oscillating_nodes += 1;
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        "instability",
                        format!("High-frequency oscillation at node {node_id}"),
                        format!(
                            "Node {node_id} oscillates at roughly {zcr:.0} Hz over the \
                             last {} samples, far above structural vibration range. \
                             The timestep is likely too large or hourglass control \
                             inadequate.",
                            state.window.len()
                        ),
                    )
                    .with_recommendation(
                        "Reduce TSSFAC (0.67 to 0.5), strengthen hourglass control \
                         (IHQ=4 or 8), or try fully integrated elements (ELFORM=2).",
                    )
                    .with_evidence(Evidence::Node(node_id)),
                );
            }
        }
    }

    let mut boundary: BTreeMap<u64, BoundaryState> = BTreeMap::new();
    while let Some(sample) = next_boundary()? {
        overview.boundary_samples += 1;
        let magnitude = sample.force_magnitude();
        let state = boundary.entry(sample.node_id).or_insert(BoundaryState {
            count: 0,
            sum_magnitude: 0.0,
            max_magnitude: 0.0,
            peak: sample,
            window: VecDeque::with_capacity(DAMPING_WINDOW),
        });
        state.count += 1;
        state.sum_magnitude += magnitude;
        if magnitude > state.max_magnitude {
            state.max_magnitude = magnitude;
            state.peak = sample;
        }
        if state.window.len() == DAMPING_WINDOW {
            state.window.pop_front();
        }
        state.window.push_back(sample.force[0]);
    }
    overview.boundary_nodes_tracked = boundary.len();

    for (&node_id, state) in &boundary {
        if state.count < 5 {
            continue;
        }
        let mean = state.sum_magnitude / state.count as f64;
        if mean > 1e-9 {
            let ratio = state.max_magnitude / mean;
            if ratio > FORCE_SPIKE_RATIO {
                overview.spike_nodes += 1;
                findings.push(
                    Finding::new(
                        Severity::Warning,
                        "instability",
                        format!("Reaction force spike at node {node_id}"),
                        format!(
                            "Node {node_id} peaked at {:.2E} (t={:.4E}) against a mean \
                             of {mean:.2E}, a {ratio:.0}x spike. This points at an \
                             overly stiff penalty contact or initial penetration.",
                            state.max_magnitude, state.peak.time
                        ),
                    )
                    .with_recommendation(
                        "Reduce the contact penalty factor (SLSFAC < 0.1), remove \
                         initial penetrations, and check for duplicated boundary \
                         conditions.",
                    )
                    .with_evidence(Evidence::Node(node_id))
                    .with_evidence(Evidence::Time(state.peak.time)),
                );
            }
        }
        if is_undamped_oscillation(&state.window) {
            overview.undamped_nodes += 1;
            findings.push(
                Finding::new(
                    Severity::Warning,
                    "instability",
                    format!("Undamped force oscillation at node {node_id}"),
                    format!(
                        "The reaction force at node {node_id} alternates sign over the \
                         last {} samples without losing amplitude.",
                        state.window.len()
                    ),
                )
                .with_recommendation(
                    "Add global damping (*DAMPING_GLOBAL), reduce TSSFAC, or increase \
                     contact damping (VDC in *CONTACT).",
                )
                .with_evidence(Evidence::Node(node_id)),
            );
        }
    }

    for finding in &mut findings {
        finding.source = SOURCE.to_string();
    }
    Ok(InstabilityAnalysis { overview, findings })
}

/// Crossings per second over the trailing window; `None` when the
/// window is too short or spans no time.
fn zero_crossing_rate(window: &VecDeque<(f64, f64)>) -> Option<f64> {
    if window.len() < 10 {
        return None;
    }
    let span = window.back()?.0 - window.front()?.0;
    if span <= 0.0 {
        return None;
    }
    let mut crossings = 0u64;
    let mut prev: Option<f64> = None;
    for &(_, v) in window {
        if let Some(p) = prev {
            if p * v < 0.0 {
                crossings += 1;
            }
        }
        prev = Some(v);
    }
    Some(crossings as f64 / span)
}

/// A full window of sign-alternating values whose amplitude holds up.
fn is_undamped_oscillation(window: &VecDeque<f64>) -> bool {
    if window.len() < DAMPING_WINDOW {
        return false;
    }
    let mut alternations = 0usize;
    let mut prev: Option<f64> = None;
    for &v in window {
        if let Some(p) = prev {
            if p * v < 0.0 {
                alternations += 1;
            }
        }
        prev = Some(v);
    }
    if (alternations as f64) < ALTERNATION_FRACTION * (window.len() - 1) as f64 {
        return false;
    }
    let peak = window.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tail_peak = window
        .iter()
        .skip(window.len() / 2)
        .fold(0.0f64, |m, v| m.max(v.abs()));
    peak > 0.0 && tail_peak >= 0.5 * peak
}
