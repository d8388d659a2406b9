//! # pf-sim: Session Simulator for PachiForge
//!
//! Estimates the long-run payout economics of ball-based reward machines by
//! drawing many independent play sessions and recording every bonus episode.
//!
//! ## Features
//!
//! - **Machine Specs**: Validated probability/payout tables, loadable from JSON or YAML
//! - **Session Simulation**: Hunting, bonus resolution, streaks, time-reduced hunting,
//!   reserved chances and the charge mechanic under one rotation budget
//! - **Batch Runs**: Parallel, seed-reproducible Monte Carlo batches
//! - **Reports**: Summary statistics, profit brackets, per-session histories
//!
//! ## Architecture
//!
//! ```text
//! MachineSpec ──┐
//!               ├── SessionSimulator ── WeightedSampler
//! PlayConditions┘         │
//!                         v
//!                   SessionResult (Vec<ChainDetail>)
//!                         │
//!            BatchRunner ─┴─> SessionSummary ─> BatchReport
//! ```

pub mod batch;
pub mod chain;
pub mod probability;
pub mod report;
pub mod sampler;
pub mod session;
pub mod spec;
pub mod stats;

pub use batch::*;
pub use chain::*;
pub use probability::*;
pub use report::*;
pub use sampler::*;
pub use session::*;
pub use spec::*;
pub use stats::*;

use thiserror::Error;

/// Errors raised before a simulation starts
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid machine spec: {0}")]
    InvalidSpec(String),

    #[error("Invalid play conditions: {0}")]
    InvalidConditions(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
