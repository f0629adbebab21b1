//! Diagnostics sinks backed by the `metrics` facade

use dcsim_core::Result;
use dcsim_env::{EpisodeSummary, MetricsSink, StepRecord};
use metrics::{counter, gauge, histogram, increment_counter};

/// Publishes step and episode diagnostics through the `metrics` facade.
///
/// Without an installed recorder every call is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MetricsFacadeSink {
    policy: String,
}

impl MetricsFacadeSink {
    /// Create a new sink that labels every series with `policy`
    #[must_use]
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
        }
    }
}

impl MetricsSink for MetricsFacadeSink {
    fn record_step(&mut self, record: &StepRecord) -> Result<()> {
        let policy = self.policy.clone();
        gauge!("dcsim_max_temperature_celsius", record.max_temperature, "policy" => policy.clone());
        gauge!("dcsim_it_power_watts", record.it_power, "policy" => policy.clone());
        gauge!("dcsim_cooling_power_watts", record.cooling_power, "policy" => policy.clone());
        gauge!("dcsim_pue", record.pue, "policy" => policy.clone());
        gauge!("dcsim_degradation_factor", record.degradation_factor, "policy" => policy.clone());
        histogram!("dcsim_step_reward", record.reward.total, "policy" => policy.clone());
        counter!(
            "dcsim_steps_total",
            1,
            "policy" => policy.clone(),
            "zone" => record.zone.as_str()
        );
        if record.zone.is_violation() {
            increment_counter!("dcsim_safety_violations_total", "policy" => policy);
        }
        Ok(())
    }

    fn record_episode(&mut self, summary: &EpisodeSummary) -> Result<()> {
        let termination = summary.termination.map_or("running", |t| t.as_str());
        increment_counter!(
            "dcsim_episodes_total",
            "policy" => self.policy.clone(),
            "termination" => termination
        );
        histogram!(
            "dcsim_episode_energy_kwh",
            summary.total_energy_kwh,
            "policy" => self.policy.clone()
        );
        histogram!("dcsim_episode_reward", summary.total_reward, "policy" => self.policy.clone());
        Ok(())
    }
}

/// Forwards every record to several sinks in order.
///
/// All sinks see every record; the first error is returned afterwards.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl FanoutSink {
    /// Create a new empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of attached sinks
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is attached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn MetricsSink) -> Result<()>) -> Result<()> {
        let mut first = Ok(());
        for sink in &mut self.sinks {
            let outcome = f(sink.as_mut());
            if first.is_ok() {
                first = outcome;
            }
        }
        first
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink").field("sinks", &self.sinks.len()).finish()
    }
}

impl MetricsSink for FanoutSink {
    fn record_step(&mut self, record: &StepRecord) -> Result<()> {
        self.each(|sink| sink.record_step(record))
    }

    fn record_episode(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.each(|sink| sink.record_episode(summary))
    }

    fn flush(&mut self) -> Result<()> {
        self.each(|sink| sink.flush())
    }
}
