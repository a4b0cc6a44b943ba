//! Diagnostic analyzers.
//!
//! Each module is a pure function over immutable reader output: no I/O,
//! no shared state, findings emitted in the order their evidence appears
//! in the input. The aggregator concatenates per-analyzer sequences
//! without re-sorting, so ordering here is part of the contract.

pub mod contact;
pub mod energy;
pub mod failure;
pub mod instability;
pub mod performance;
pub mod scaling;
pub mod termination;
pub mod timestep;
pub mod warnings;
