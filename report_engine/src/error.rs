//! Error taxonomy for the diagnostic engine.
//!
//! Fatal conditions surface as `EngineError`; degraded coverage and
//! per-record parse skips are recorded in the report instead of failing
//! the run.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither a printer log nor any message log was found.
    #[error("no usable solver output in {}: need d3hsp or at least one message log", dir.display())]
    MissingRequiredInputs { dir: PathBuf },

    /// Every reader came back empty; there is nothing to analyze.
    #[error("solver output in {} contained no parseable records", dir.display())]
    EmptyRun { dir: PathBuf },

    /// Cancellation was requested; no partial report is produced.
    #[error("analysis aborted by caller")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, EngineError>;
