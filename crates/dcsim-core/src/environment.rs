//! Environment traits and types

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::{Action, ActionSpace, Observation, ObservationSpace, Result, Reward};

/// Result of a single environment step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step<O, I> {
    /// Observation from the environment
    pub observation: O,
    /// Reward signal
    pub reward: Reward,
    /// Whether the episode ended on its own (failure or fault)
    pub terminated: bool,
    /// Whether the episode was cut off by a time limit
    pub truncated: bool,
    /// Diagnostic info from the environment
    pub info: I,
}

impl<O, I> Step<O, I> {
    /// Whether the caller must reset before stepping again
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Episode bookkeeping kept by [`TrackedEnvironment`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// Episode ID
    pub id: String,
    /// Seed passed to reset, if any
    pub seed: Option<u64>,
    /// Total reward
    pub total_reward: f64,
    /// Number of steps
    pub steps: usize,
    /// Whether the episode terminated
    pub terminated: bool,
    /// Whether the episode was truncated
    pub truncated: bool,
    /// Start time
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// End time
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

/// Core environment trait.
///
/// Calls are synchronous: `step` fully returns before the next call, and an
/// implementation owns all of its mutable state so independent instances can
/// run on separate threads.
pub trait Environment: Send {
    /// Observation type
    type Observation: Observation;
    /// Action type
    type Action: Action;
    /// Per-step diagnostic info type
    type Info: Clone + Debug + Send;

    /// Get the observation space
    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>>;

    /// Get the action space
    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>>;

    /// Reset the environment, optionally with an explicit seed
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation>;

    /// Take a step in the environment
    fn step(&mut self, action: &Self::Action) -> Result<Step<Self::Observation, Self::Info>>;

    /// Close the environment
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get current episode info
    fn episode_info(&self) -> Option<Episode> {
        None
    }
}

/// Wrapper for environments that tracks episodes
pub struct TrackedEnvironment<E> {
    /// Inner environment
    pub env: E,
    /// Current episode
    pub episode: Option<Episode>,
    /// Step counter
    pub step_count: usize,
}

impl<E> TrackedEnvironment<E> {
    /// Create a new tracked environment
    pub fn new(env: E) -> Self {
        Self {
            env,
            episode: None,
            step_count: 0,
        }
    }
}

impl<E> Environment for TrackedEnvironment<E>
where
    E: Environment,
{
    type Observation = E::Observation;
    type Action = E::Action;
    type Info = E::Info;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        self.env.observation_space()
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        self.env.action_space()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation> {
        // End current episode if exists
        if let Some(ref mut episode) = self.episode {
            if episode.end_time.is_none() {
                episode.end_time = Some(chrono::Utc::now());
            }
        }

        let observation = self.env.reset(seed)?;

        self.episode = Some(Episode {
            id: uuid::Uuid::new_v4().to_string(),
            seed,
            total_reward: 0.0,
            steps: 0,
            terminated: false,
            truncated: false,
            start_time: chrono::Utc::now(),
            end_time: None,
        });
        self.step_count = 0;

        Ok(observation)
    }

    fn step(&mut self, action: &Self::Action) -> Result<Step<Self::Observation, Self::Info>> {
        let step = self.env.step(action)?;

        self.step_count += 1;
        if let Some(ref mut episode) = self.episode {
            episode.total_reward += step.reward.0;
            episode.steps = self.step_count;

            if step.is_done() {
                episode.terminated = step.terminated;
                episode.truncated = step.truncated;
                episode.end_time = Some(chrono::Utc::now());
                tracing::debug!(
                    episode = %episode.id,
                    steps = episode.steps,
                    total_reward = episode.total_reward,
                    terminated = episode.terminated,
                    "episode finished"
                );
            }
        }

        Ok(step)
    }

    fn close(&mut self) -> Result<()> {
        self.env.close()
    }

    fn episode_info(&self) -> Option<Episode> {
        self.episode.clone()
    }
}
