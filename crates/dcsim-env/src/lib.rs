//! Data-center thermal simulation and reward shaping
//!
//! This crate provides:
//! - Server, rack and cooling physics with explicit, energy-conserving steps
//! - A safety-zone reward function that gates efficiency terms on temperature
//! - [`DataCenterEnv`], the episode controller behind the `Environment` trait
//! - Workload traces, diagnostics sinks, presets and vectorised batches

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cooling;
pub mod env;
pub mod episode;
pub mod rack;
pub mod registry;
pub mod reward;
pub mod server;
pub mod telemetry;
pub mod vec_env;
pub mod workload;
pub mod wrappers;

pub use config::{
    CoolingConfig, CoolingMode, EpisodeConfig, InitialState, PhysicsConfig, RewardConfig,
    SimConfig, TopologyConfig, WorkloadConfig,
};
pub use cooling::{CoolingCurves, CoolingSystem, RackCooling, Setpoints};
pub use env::{DataCenterEnv, Fault, ObservationLayout, PowerBreakdown, RawState, StepInfo};
pub use episode::{EpisodeState, EpisodeSummary, TerminationReason};
pub use rack::{Rack, RackReport, RecirculationMatrix};
pub use registry::{list_presets, make_env, preset, register_preset, PresetRegistry};
pub use reward::{RewardBreakdown, RewardEvaluator, RewardInputs, Zone};
pub use server::{Server, ServerThermalModel, ServerUpdate};
pub use telemetry::{JsonlSink, MetricsSink, StepRecord, TracingSink};
pub use vec_env::VecEnv;
pub use workload::{ConstantWorkload, RandomWalkWorkload, ReplayWorkload, WorkloadTrace};
pub use wrappers::{RewardWrapper, TimeLimit};

// Re-export core types
pub use dcsim_core::{
    Action, ActionSpace, ContinuousAction, Environment, Observation, ObservationSpace, Result,
    Reward, SimError, Step, TrackedEnvironment, VectorObservation,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        make_env, ConstantWorkload, DataCenterEnv, SimConfig, StepInfo, TerminationReason,
        WorkloadTrace, Zone,
    };
    pub use dcsim_core::prelude::*;
}
