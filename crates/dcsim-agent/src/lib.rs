//! Baseline controllers and evaluation for the dcsim data-center simulator
//!
//! This crate provides:
//! - Rule-based baselines: a PID loop on the hottest server, constant and random setpoints
//! - Episode evaluation with energy, thermal, PUE and health metrics
//! - Baseline-versus-candidate comparison
//! - Concurrent evaluation of many seeds on the tokio runtime
//! - A `metrics`-facade diagnostics sink

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod baseline;
pub mod evaluation;
pub mod parallel;
pub mod random;
pub mod sink;

// Re-export controllers
pub use baseline::{BaselineKind, ConstantPolicy, DynPolicy, PidBaseline, PidConfig};
pub use random::RandomPolicy;

// Re-export evaluation
pub use evaluation::{
    thermal_stability, Comparison, EvaluationMetrics, EvaluationReport, EvaluationRunner,
};
pub use parallel::{evaluate_seeds, ParallelOptions, ParallelRun};
pub use sink::{FanoutSink, MetricsFacadeSink};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        evaluate_seeds, BaselineKind, Comparison, EvaluationReport, EvaluationRunner,
        ParallelOptions, PidBaseline,
    };
    pub use dcsim_env::prelude::*;
}
