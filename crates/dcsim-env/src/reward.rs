//! Safety zones and reward shaping
//!
//! The hottest server temperature selects a [`Zone`]; the zone sets the base
//! reward and decides termination. Efficiency and smoothness terms only pay
//! out while the temperature stays inside the good ceiling.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RewardConfig;

/// Thermal safety zone, in ascending temperature order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// `T <= optimal_max`
    Optimal,
    /// `optimal_max < T <= good_max`
    Good,
    /// `good_max < T < critical_temp`
    Caution,
    /// `critical_temp <= T < max_temp`
    Critical,
    /// `T >= max_temp`; ends the episode
    Catastrophic,
}

impl Zone {
    /// All zones, coolest first
    pub const ALL: [Zone; 5] = [
        Zone::Optimal,
        Zone::Good,
        Zone::Caution,
        Zone::Critical,
        Zone::Catastrophic,
    ];

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Optimal => "optimal",
            Self::Good => "good",
            Self::Caution => "caution",
            Self::Critical => "critical",
            Self::Catastrophic => "catastrophic",
        }
    }

    /// Whether efficiency and smoothness terms apply
    #[must_use]
    pub fn is_safe(self) -> bool {
        matches!(self, Self::Optimal | Self::Good)
    }

    /// Whether the step counts as a safety violation
    #[must_use]
    pub fn is_violation(self) -> bool {
        self >= Self::Critical
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical quantities the reward is computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardInputs {
    /// Hottest server after the step (°C)
    pub max_temperature: f64,
    /// IT plus cooling power (W)
    pub total_power: f64,
    /// Mean per-server aging accrued this step
    pub mean_aging_accrual: f64,
    /// Mean absolute setpoint change against the previous action
    pub mean_action_delta: f64,
}

/// Every term of one step's reward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Zone of the hottest server
    pub zone: Zone,
    /// Zone bonus or penalty
    pub zone_reward: f64,
    /// Energy term (non-positive)
    pub energy: f64,
    /// Health term (non-positive)
    pub health: f64,
    /// Smoothness term (non-negative)
    pub smoothness: f64,
    /// Whether the safety gate let efficiency terms through
    pub gate_open: bool,
    /// Sum of all terms
    pub total: f64,
}

impl RewardBreakdown {
    /// Whether this step ends the episode
    #[must_use]
    pub fn terminates(&self) -> bool {
        self.zone == Zone::Catastrophic
    }
}

/// Deterministic zone classifier and reward function
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEvaluator {
    config: RewardConfig,
    reference_power: f64,
}

impl RewardEvaluator {
    /// Create an evaluator; `reference_power` normalises the energy term
    #[must_use]
    pub fn new(config: RewardConfig, reference_power: f64) -> Self {
        Self {
            config,
            reference_power: reference_power.max(f64::EPSILON),
        }
    }

    /// Reward constants
    #[must_use]
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Power the energy term is normalised by (W)
    #[must_use]
    pub fn reference_power(&self) -> f64 {
        self.reference_power
    }

    /// Classify a temperature. Non-finite input is treated as catastrophic.
    #[must_use]
    pub fn classify(&self, temperature: f64) -> Zone {
        let c = &self.config;
        if temperature.is_nan() || temperature >= c.max_temp {
            Zone::Catastrophic
        } else if temperature >= c.critical_temp {
            Zone::Critical
        } else if temperature > c.good_max {
            Zone::Caution
        } else if temperature > c.optimal_max {
            Zone::Good
        } else {
            Zone::Optimal
        }
    }

    /// Zone and its base reward at a temperature
    #[must_use]
    pub fn zone_reward(&self, temperature: f64) -> (Zone, f64) {
        let c = &self.config;
        let zone = self.classify(temperature);
        let quadratic = c.caution_coefficient * (temperature - c.good_max).powi(2);
        let reward = match zone {
            Zone::Optimal => c.optimal_bonus,
            Zone::Good => c.good_bonus,
            Zone::Caution => -quadratic,
            Zone::Critical => -c.critical_penalty - quadratic,
            Zone::Catastrophic => -c.catastrophic_penalty,
        };
        (zone, reward)
    }

    /// Full reward for one step
    ///
    /// Only the terms that can pay out are gated on the safe zones: the
    /// smoothness bonus, and the energy term's savings below reference load.
    /// Outside the gate the energy term charges at least the reference load
    /// and the health penalty stays on, so a hot step is never cheaper than a
    /// safe one at the same draw.
    #[must_use]
    pub fn evaluate(&self, inputs: &RewardInputs) -> RewardBreakdown {
        let c = &self.config;
        let (zone, zone_reward) = self.zone_reward(inputs.max_temperature);
        let gate_open = zone.is_safe();

        let power_ratio = inputs.total_power / self.reference_power;
        let energy = if gate_open {
            -c.energy_coefficient * power_ratio
        } else {
            // Running hot never makes the draw look cheaper than full load.
            -c.energy_coefficient * power_ratio.max(1.0)
        };

        let health = -c.health_coefficient * inputs.mean_aging_accrual;

        let smoothness = if gate_open {
            c.smoothness_coefficient * (1.0 - inputs.mean_action_delta.clamp(0.0, 1.0))
        } else {
            0.0
        };

        RewardBreakdown {
            zone,
            zone_reward,
            energy,
            health,
            smoothness,
            gate_open,
            total: zone_reward + energy + health + smoothness,
        }
    }
}
