//! Per-episode bookkeeping

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Hottest server reached the safety ceiling
    Catastrophic,
    /// Physics produced a non-finite value
    NumericalFault,
    /// Configured episode length reached
    EpisodeLength,
}

impl TerminationReason {
    /// Whether the outcome is a failure (terminated) rather than a cut-off (truncated)
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::EpisodeLength)
    }

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catastrophic => "catastrophic",
            Self::NumericalFault => "numerical_fault",
            Self::EpisodeLength => "episode_length",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable counters of one running episode.
///
/// Owned by a single environment instance; nothing here is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    /// Seed the episode was reset with
    pub seed: u64,
    /// Steps taken
    pub step: u64,
    /// IT plus cooling energy (J)
    pub total_energy_j: f64,
    /// IT energy including leakage (J)
    pub it_energy_j: f64,
    /// Cooling energy (J)
    pub cooling_energy_j: f64,
    /// Sum of rewards
    pub cumulative_reward: f64,
    /// Steps spent at or above the critical temperature
    pub safety_violations: u64,
    /// Hottest temperature seen so far (°C)
    pub peak_temperature: f64,
    /// Set once the episode is over
    pub termination: Option<TerminationReason>,
}

impl EpisodeState {
    /// Zeroed counters for a new episode
    #[must_use]
    pub fn new(seed: u64, initial_max_temperature: f64) -> Self {
        Self {
            seed,
            step: 0,
            total_energy_j: 0.0,
            it_energy_j: 0.0,
            cooling_energy_j: 0.0,
            cumulative_reward: 0.0,
            safety_violations: 0,
            peak_temperature: initial_max_temperature,
            termination: None,
        }
    }

    /// Whether `step` must be refused until the next reset
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.termination.is_some()
    }

    /// Account one completed step
    pub fn record(
        &mut self,
        it_power: f64,
        cooling_power: f64,
        dt: f64,
        reward: f64,
        max_temperature: f64,
        violation: bool,
    ) {
        self.step += 1;
        self.it_energy_j += it_power * dt;
        self.cooling_energy_j += cooling_power * dt;
        self.total_energy_j += (it_power + cooling_power) * dt;
        self.cumulative_reward += reward;
        self.peak_temperature = self.peak_temperature.max(max_temperature);
        if violation {
            self.safety_violations += 1;
        }
    }

    /// Energy-weighted PUE so far, `None` before any IT energy was drawn
    #[must_use]
    pub fn pue(&self) -> Option<f64> {
        (self.it_energy_j > 0.0).then(|| self.total_energy_j / self.it_energy_j)
    }

    /// Serializable snapshot
    #[must_use]
    pub fn summary(&self) -> EpisodeSummary {
        EpisodeSummary {
            seed: self.seed,
            steps: self.step,
            total_reward: self.cumulative_reward,
            total_energy_kwh: self.total_energy_j / 3.6e6,
            it_energy_kwh: self.it_energy_j / 3.6e6,
            cooling_energy_kwh: self.cooling_energy_j / 3.6e6,
            pue: self.pue(),
            safety_violations: self.safety_violations,
            peak_temperature: self.peak_temperature,
            termination: self.termination,
        }
    }
}

/// End-of-episode report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Seed of the episode
    pub seed: u64,
    /// Steps taken
    pub steps: u64,
    /// Sum of rewards
    pub total_reward: f64,
    /// IT plus cooling energy (kWh)
    pub total_energy_kwh: f64,
    /// IT energy (kWh)
    pub it_energy_kwh: f64,
    /// Cooling energy (kWh)
    pub cooling_energy_kwh: f64,
    /// Energy-weighted PUE
    pub pue: Option<f64>,
    /// Steps at or above the critical temperature
    pub safety_violations: u64,
    /// Hottest temperature seen (°C)
    pub peak_temperature: f64,
    /// Outcome, if the episode finished
    pub termination: Option<TerminationReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_accumulates() {
        let mut state = EpisodeState::new(42, 30.0);
        state.record(1000.0, 250.0, 2.0, 1.5, 40.0, false);
        state.record(1000.0, 250.0, 2.0, -0.5, 61.0, true);
        assert_eq!(state.step, 2);
        assert_relative_eq!(state.total_energy_j, 5000.0);
        assert_relative_eq!(state.cumulative_reward, 1.0);
        assert_eq!(state.safety_violations, 1);
        assert_relative_eq!(state.peak_temperature, 61.0);
        assert_relative_eq!(state.pue().unwrap(), 1.25);
    }

    #[test]
    fn test_failure_classification() {
        assert!(TerminationReason::Catastrophic.is_failure());
        assert!(TerminationReason::NumericalFault.is_failure());
        assert!(!TerminationReason::EpisodeLength.is_failure());
    }

    #[test]
    fn test_summary_serializes_reason_in_snake_case() {
        let mut state = EpisodeState::new(1, 22.0);
        state.termination = Some(TerminationReason::NumericalFault);
        let json = serde_json::to_string(&state.summary()).unwrap();
        assert!(json.contains("\"numerical_fault\""), "{json}");
    }
}
