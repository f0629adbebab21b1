//! Core environment contract for the dcsim data-center simulator
//!
//! This crate provides the narrow interface an external trainer uses to
//! drive a simulation: reset/step, bounded action and observation spaces,
//! the reward signal, policies, recorded trajectories and the error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod trajectory;

// Re-export core traits and types
pub use action::{Action, ActionSpace, BoxActionSpace, Clipped, ContinuousAction};
pub use environment::{Environment, Episode, Step, TrackedEnvironment};
pub use error::{Result, SimError};
pub use observation::{BoxObservationSpace, Observation, ObservationSpace, VectorObservation};
pub use policy::Policy;
pub use reward::Reward;
pub use trajectory::{Trajectory, Transition};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionSpace, ContinuousAction, Environment, Observation, ObservationSpace,
        Policy, Result, Reward, SimError, Step, VectorObservation,
    };
}
