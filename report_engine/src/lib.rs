//! Diagnostic analysis engine for explicit-dynamics solver output.
//!
//! Point `Engine` at a result directory; it streams the recognized
//! text outputs (printer log, energy history, message logs, time
//! histories, profiling CSVs), runs the analyzers, and returns one
//! deterministic `Report`.

pub mod analysis;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod mapper;
pub mod model;
pub mod readers;
pub mod report;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use model::{Finding, Severity};
pub use report::Report;
