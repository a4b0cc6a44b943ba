//! Engine tunables.
//!
//! Every knob here shapes resource usage or projection models, never the
//! diagnostic thresholds themselves. Thresholds are contracts and live
//! with their analyzers.

use serde::Serialize;

/// Tunables for a single engine run.
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    /// Maximum number of distinct node ids tracked from time-history
    /// files. Ids beyond the cap are silently excluded.
    pub tracked_node_cap: usize,

    /// Sliding-window length (samples) for oscillation statistics.
    pub oscillation_window: usize,

    /// How many consecutive missing zero-padded suffixes end the scan
    /// for per-rank message logs.
    pub message_log_gap: u32,

    /// Core counts the scaling projection extrapolates to.
    pub scaling_targets: Vec<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tracked_node_cap: 10_000,
            oscillation_window: 512,
            message_log_gap: 4,
            scaling_targets: vec![32, 64, 128, 256],
        }
    }
}
