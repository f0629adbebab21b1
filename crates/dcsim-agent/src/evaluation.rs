//! Episode evaluation and policy comparison
//!
//! [`EvaluationRunner`] drives one policy through one seeded episode and
//! condenses the per-step samples into [`EvaluationMetrics`]. Reports over
//! several seeds are compared with [`Comparison`].

use dcsim_core::{
    ContinuousAction, Environment, Policy, Result, SimError, Trajectory, Transition,
    VectorObservation,
};
use dcsim_env::{DataCenterEnv, EpisodeSummary, RawState, StepInfo, TerminationReason};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Added to the largest temperature change before dividing
const STABILITY_EPSILON: f64 = 1e-6;

/// Per-step samples collected while an episode runs
#[derive(Debug, Default, Clone)]
struct StepSamples {
    temperatures: Vec<f64>,
    rewards: Vec<f64>,
    pues: Vec<f64>,
    healths: Vec<f64>,
    setpoints: Vec<f64>,
    violations: u64,
}

impl StepSamples {
    fn push(&mut self, info: &StepInfo, reward: f64, raw: &RawState) {
        self.temperatures.push(info.max_temperature);
        self.rewards.push(reward);
        self.pues.push(info.power.pue());
        if !raw.health.is_empty() {
            self.healths.push(raw.health.iter().mean());
        }
        if !raw.setpoints.is_empty() {
            self.setpoints.push(raw.setpoints.iter().mean());
        }
        if info.zone.is_violation() {
            self.violations += 1;
        }
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().mean()
    }
}

/// One minus the spread of step-to-step temperature changes relative to the
/// largest change, in [0, 1]. Fewer than two samples count as fully stable.
#[must_use]
pub fn thermal_stability(temperatures: &[f64]) -> f64 {
    if temperatures.len() < 2 {
        return 1.0;
    }
    let changes: Vec<f64> = temperatures.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let spread = changes.iter().population_std_dev();
    let largest = Statistics::max(changes.iter());
    (1.0 - spread / (largest + STABILITY_EPSILON)).clamp(0.0, 1.0)
}

/// Metrics of one evaluated episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Policy that produced the episode
    pub policy: String,
    /// Episode seed
    pub seed: u64,
    /// Steps taken
    pub steps: u64,
    /// Facility energy (kWh)
    pub total_energy_kwh: f64,
    /// Server energy (kWh)
    pub it_energy_kwh: f64,
    /// Cooling energy (kWh)
    pub cooling_energy_kwh: f64,
    /// Mean of the per-step maximum temperature (°C)
    pub average_temperature: f64,
    /// Highest per-step maximum temperature (°C)
    pub max_temperature: f64,
    /// Lowest per-step maximum temperature (°C)
    pub min_temperature: f64,
    /// Population standard deviation of the per-step maximum temperature
    pub std_temperature: f64,
    /// Steps spent in the critical zone or worse
    pub safety_violations: u64,
    /// Mean setpoint over all steps and channels
    pub average_setpoint: f64,
    /// Mean of the instantaneous PUE
    pub average_pue: f64,
    /// Mean server health
    pub average_health: f64,
    /// See [`thermal_stability`]
    pub thermal_stability: f64,
    /// Mean per-step reward
    pub mean_reward: f64,
    /// Sum of rewards
    pub total_reward: f64,
    /// How the episode ended, `None` if it was cut short by the runner
    pub termination: Option<TerminationReason>,
}

impl EvaluationMetrics {
    fn from_samples(policy: &str, summary: &EpisodeSummary, samples: &StepSamples) -> Self {
        let temperatures = &samples.temperatures;
        let (max_temperature, min_temperature, std_temperature) = if temperatures.is_empty() {
            (summary.peak_temperature, summary.peak_temperature, 0.0)
        } else {
            (
                Statistics::max(temperatures.iter()),
                Statistics::min(temperatures.iter()),
                temperatures.iter().population_std_dev(),
            )
        };

        Self {
            policy: policy.to_string(),
            seed: summary.seed,
            steps: summary.steps,
            total_energy_kwh: summary.total_energy_kwh,
            it_energy_kwh: summary.it_energy_kwh,
            cooling_energy_kwh: summary.cooling_energy_kwh,
            average_temperature: mean_or_zero(temperatures),
            max_temperature,
            min_temperature,
            std_temperature,
            safety_violations: samples.violations,
            average_setpoint: mean_or_zero(&samples.setpoints),
            average_pue: mean_or_zero(&samples.pues),
            average_health: mean_or_zero(&samples.healths),
            thermal_stability: thermal_stability(temperatures),
            mean_reward: mean_or_zero(&samples.rewards),
            total_reward: samples.rewards.iter().sum(),
            termination: summary.termination,
        }
    }

    /// Whether the episode ended in a catastrophe or a numerical fault
    #[must_use]
    pub fn failed(&self) -> bool {
        self.termination.is_some_and(TerminationReason::is_failure)
    }
}

/// Runs policies through seeded episodes
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationRunner {
    max_steps: Option<u64>,
}

impl EvaluationRunner {
    /// Create a new runner that plays episodes to their natural end
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after at most `max_steps` steps
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Play one episode of `policy` from `seed`
    pub fn run_episode<P>(
        &self,
        env: &mut DataCenterEnv,
        policy: &mut P,
        seed: u64,
    ) -> Result<EvaluationMetrics>
    where
        P: Policy<Observation = VectorObservation, Action = ContinuousAction> + ?Sized,
    {
        policy.reset();
        let mut observation = env.reset(Some(seed))?;
        let mut samples = StepSamples::default();
        let limit = self.max_steps.unwrap_or(u64::MAX);

        let mut steps = 0;
        while steps < limit {
            let action = policy.act(&observation)?;
            let step = env.step(&action)?;
            steps += 1;
            samples.push(&step.info, step.reward.value(), &env.raw_state());
            if step.is_done() {
                break;
            }
            observation = step.observation;
        }

        let summary = env.episode_summary().ok_or(SimError::NotReset)?;
        let metrics = EvaluationMetrics::from_samples(policy.name(), &summary, &samples);
        tracing::info!(
            policy = policy.name(),
            seed,
            steps = metrics.steps,
            energy_kwh = metrics.total_energy_kwh,
            violations = metrics.safety_violations,
            mean_reward = metrics.mean_reward,
            termination = ?metrics.termination,
            "episode evaluated"
        );
        Ok(metrics)
    }

    /// Record one episode of `policy` from `seed` as a trajectory.
    ///
    /// Works with any environment over the simulator's observation and
    /// action types, wrappers included.
    pub fn rollout<E, P>(
        &self,
        env: &mut E,
        policy: &mut P,
        seed: u64,
    ) -> Result<Trajectory<VectorObservation, ContinuousAction, E::Info>>
    where
        E: Environment<Observation = VectorObservation, Action = ContinuousAction>,
        P: Policy<Observation = VectorObservation, Action = ContinuousAction> + ?Sized,
    {
        policy.reset();
        let mut observation = env.reset(Some(seed))?;
        let mut trajectory = Trajectory::new(seed);
        let limit = self.max_steps.unwrap_or(u64::MAX);

        let mut steps = 0;
        while steps < limit {
            let action = policy.act(&observation)?;
            let step = env.step(&action)?;
            steps += 1;
            let done = step.is_done();
            trajectory.push(Transition {
                observation,
                action,
                reward: step.reward,
                next_observation: step.observation.clone(),
                terminated: step.terminated,
                truncated: step.truncated,
                info: step.info,
            });
            if done {
                break;
            }
            observation = step.observation;
        }
        Ok(trajectory)
    }
}

/// Metrics of one policy over several seeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Policy name
    pub policy: String,
    /// Per-episode metrics, in seed order
    pub episodes: Vec<EvaluationMetrics>,
    /// Mean facility energy per episode (kWh)
    pub mean_energy_kwh: f64,
    /// Mean of the per-episode average temperature (°C)
    pub mean_temperature: f64,
    /// Highest temperature seen in any episode (°C)
    pub peak_temperature: f64,
    /// Violations summed over episodes
    pub total_violations: u64,
    /// Mean of the per-episode PUE
    pub mean_pue: f64,
    /// Mean of the per-episode thermal stability
    pub mean_stability: f64,
    /// Mean of the per-episode mean reward
    pub mean_reward: f64,
    /// Episodes that ended in a failure
    pub failures: usize,
}

impl EvaluationReport {
    /// Aggregate per-episode metrics
    #[must_use]
    pub fn from_episodes(policy: impl Into<String>, episodes: Vec<EvaluationMetrics>) -> Self {
        let column = |f: fn(&EvaluationMetrics) -> f64| -> Vec<f64> {
            episodes.iter().map(f).collect()
        };
        let peak = column(|m| m.max_temperature);

        Self {
            policy: policy.into(),
            mean_energy_kwh: mean_or_zero(&column(|m| m.total_energy_kwh)),
            mean_temperature: mean_or_zero(&column(|m| m.average_temperature)),
            peak_temperature: if peak.is_empty() { 0.0 } else { Statistics::max(peak.iter()) },
            total_violations: episodes.iter().map(|m| m.safety_violations).sum(),
            mean_pue: mean_or_zero(&column(|m| m.average_pue)),
            mean_stability: mean_or_zero(&column(|m| m.thermal_stability)),
            mean_reward: mean_or_zero(&column(|m| m.mean_reward)),
            failures: episodes.iter().filter(|m| m.failed()).count(),
            episodes,
        }
    }
}

/// Candidate policy measured against a baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Baseline policy name
    pub baseline: String,
    /// Candidate policy name
    pub candidate: String,
    /// Energy saved by the candidate, percent of the baseline's energy
    pub energy_savings_pct: f64,
    /// Candidate violations minus baseline violations
    pub violation_delta: i64,
    /// Candidate PUE minus baseline PUE
    pub pue_delta: f64,
    /// Candidate stability minus baseline stability
    pub stability_delta: f64,
    /// Candidate mean reward minus baseline mean reward
    pub reward_delta: f64,
}

impl Comparison {
    /// Compare two reports
    #[must_use]
    pub fn between(baseline: &EvaluationReport, candidate: &EvaluationReport) -> Self {
        let energy_savings_pct = if baseline.mean_energy_kwh > 0.0 {
            (baseline.mean_energy_kwh - candidate.mean_energy_kwh) / baseline.mean_energy_kwh
                * 100.0
        } else {
            0.0
        };
        let violations =
            |r: &EvaluationReport| i64::try_from(r.total_violations).unwrap_or(i64::MAX);

        Self {
            baseline: baseline.policy.clone(),
            candidate: candidate.policy.clone(),
            energy_savings_pct,
            violation_delta: violations(candidate) - violations(baseline),
            pue_delta: candidate.mean_pue - baseline.mean_pue,
            stability_delta: candidate.mean_stability - baseline.mean_stability,
            reward_delta: candidate.mean_reward - baseline.mean_reward,
        }
    }

    /// Candidate uses less energy without adding violations
    #[must_use]
    pub fn candidate_wins(&self) -> bool {
        self.energy_savings_pct > 0.0 && self.violation_delta <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::{ConstantPolicy, PidBaseline};
    use approx::assert_relative_eq;
    use dcsim_env::{preset, ConstantWorkload};

    fn single_server(utilization: f64) -> DataCenterEnv {
        let mut config = preset("single-server").unwrap();
        config.episode.episode_length = 400;
        DataCenterEnv::with_workload(config, Box::new(ConstantWorkload::new(utilization))).unwrap()
    }

    fn metrics(policy: &str, energy: f64, violations: u64, reward: f64) -> EvaluationMetrics {
        EvaluationMetrics {
            policy: policy.to_string(),
            seed: 0,
            steps: 10,
            total_energy_kwh: energy,
            it_energy_kwh: energy * 0.8,
            cooling_energy_kwh: energy * 0.2,
            average_temperature: 30.0,
            max_temperature: 35.0,
            min_temperature: 25.0,
            std_temperature: 1.0,
            safety_violations: violations,
            average_setpoint: 0.5,
            average_pue: 1.25,
            average_health: 1.0,
            thermal_stability: 0.9,
            mean_reward: reward,
            total_reward: reward * 10.0,
            termination: None,
        }
    }

    #[test]
    fn test_thermal_stability_edges() {
        assert_relative_eq!(thermal_stability(&[]), 1.0);
        assert_relative_eq!(thermal_stability(&[30.0]), 1.0);
        // Identical changes have no spread.
        assert_relative_eq!(thermal_stability(&[30.0, 31.0, 32.0, 33.0]), 1.0, epsilon = 1e-9);
        // Changes 0 and 2: spread 1, largest 2.
        assert_relative_eq!(thermal_stability(&[30.0, 30.0, 32.0]), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_report_aggregates_episodes() {
        let mut failed = metrics("pid", 3.0, 2, -1.0);
        failed.termination = Some(TerminationReason::Catastrophic);
        failed.max_temperature = 66.0;
        let report =
            EvaluationReport::from_episodes("pid", vec![metrics("pid", 1.0, 1, 1.0), failed]);

        assert_relative_eq!(report.mean_energy_kwh, 2.0);
        assert_relative_eq!(report.mean_reward, 0.0);
        assert_relative_eq!(report.peak_temperature, 66.0);
        assert_eq!(report.total_violations, 3);
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn test_comparison_reports_savings_and_violation_delta() {
        let baseline = EvaluationReport::from_episodes("pid", vec![metrics("pid", 10.0, 1, 0.5)]);
        let candidate =
            EvaluationReport::from_episodes("agent", vec![metrics("agent", 8.0, 0, 0.7)]);
        let comparison = Comparison::between(&baseline, &candidate);

        assert_relative_eq!(comparison.energy_savings_pct, 20.0, epsilon = 1e-9);
        assert_eq!(comparison.violation_delta, -1);
        assert_relative_eq!(comparison.reward_delta, 0.2, epsilon = 1e-9);
        assert!(comparison.candidate_wins());
    }

    #[test]
    fn test_comparison_with_empty_baseline_reports_no_savings() {
        let baseline = EvaluationReport::from_episodes("pid", vec![]);
        let candidate =
            EvaluationReport::from_episodes("agent", vec![metrics("agent", 8.0, 0, 0.7)]);
        assert_relative_eq!(Comparison::between(&baseline, &candidate).energy_savings_pct, 0.0);
    }

    #[test]
    fn test_cooled_episode_has_no_violations() {
        let mut env = single_server(0.3);
        let mut policy = ConstantPolicy::new(1, 1.0);
        let m = EvaluationRunner::new().run_episode(&mut env, &mut policy, 42).unwrap();

        assert_eq!(m.steps, 400);
        assert_eq!(m.termination, Some(TerminationReason::EpisodeLength));
        assert_eq!(m.safety_violations, 0);
        assert_relative_eq!(m.average_setpoint, 1.0);
        assert!(m.average_pue > 1.0);
        assert!(m.min_temperature <= m.average_temperature);
        assert!(m.average_temperature <= m.max_temperature);
        assert!(m.total_energy_kwh > m.it_energy_kwh);
        assert!(!m.failed());
    }

    #[test]
    fn test_uncooled_episode_fails() {
        let mut env = single_server(1.0);
        let mut policy = ConstantPolicy::new(1, 0.0);
        let m = EvaluationRunner::new().run_episode(&mut env, &mut policy, 42).unwrap();

        assert_eq!(m.termination, Some(TerminationReason::Catastrophic));
        assert!(m.failed());
        assert!(m.safety_violations > 0);
        assert!(m.max_temperature >= 65.0);
    }

    #[test]
    fn test_rollout_records_every_transition() {
        let mut env = single_server(1.0);
        let mut policy = ConstantPolicy::new(1, 0.0);
        let trajectory = EvaluationRunner::new().rollout(&mut env, &mut policy, 42).unwrap();

        let summary = env.episode_summary().unwrap();
        assert_eq!(trajectory.seed, 42);
        assert_eq!(trajectory.len() as u64, summary.steps);
        assert_relative_eq!(trajectory.total_reward, summary.total_reward, epsilon = 1e-6);
        let last = trajectory.transitions.last().unwrap();
        assert!(last.terminated && last.is_done());
        assert!(trajectory.transitions[..trajectory.len() - 1].iter().all(|t| !t.is_done()));
        for pair in trajectory.transitions.windows(2) {
            assert_eq!(pair[0].next_observation, pair[1].observation);
        }
        assert_eq!(trajectory.returns(0.99).len(), trajectory.len());
    }

    #[test]
    fn test_max_steps_cuts_episode_short() {
        let mut env = single_server(0.5);
        let mut policy = PidBaseline::new(env.observation_layout());
        let m = EvaluationRunner::new()
            .with_max_steps(25)
            .run_episode(&mut env, &mut policy, 1)
            .unwrap();
        assert_eq!(m.steps, 25);
        assert_eq!(m.termination, None);
        assert_eq!(m.policy, "pid");
    }
}
