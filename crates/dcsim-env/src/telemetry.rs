//! Per-step diagnostics export
//!
//! The environment hands a [`StepRecord`] to an optional [`MetricsSink`]
//! after every step and an [`EpisodeSummary`] when an episode ends. Sinks
//! never influence the simulation; a failing sink is logged and skipped.

use std::io::Write;

use serde::{Deserialize, Serialize};

use dcsim_core::Result;

use crate::episode::{EpisodeSummary, TerminationReason};
use crate::reward::{RewardBreakdown, Zone};

/// Flat, serializable view of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Seed of the running episode
    pub seed: u64,
    /// Step index, starting at 1
    pub step: u64,
    /// Zone of the hottest server
    pub zone: Zone,
    /// Reward terms
    pub reward: RewardBreakdown,
    /// Hottest server (°C)
    pub max_temperature: f64,
    /// Mean server temperature (°C)
    pub mean_temperature: f64,
    /// IT power including leakage (W)
    pub it_power: f64,
    /// Cooling power (W)
    pub cooling_power: f64,
    /// Instantaneous PUE
    pub pue: f64,
    /// Mean server health
    pub mean_health: f64,
    /// Mean aging accrued this step
    pub mean_aging_accrual: f64,
    /// Cooling degradation multiplier
    pub degradation_factor: f64,
    /// Economizer state
    pub economizer_active: bool,
    /// Outcome if the step ended the episode
    pub termination: Option<TerminationReason>,
}

/// Consumer of step and episode diagnostics
pub trait MetricsSink: Send {
    /// Called after every committed step
    fn record_step(&mut self, record: &StepRecord) -> Result<()>;

    /// Called once when an episode ends
    fn record_episode(&mut self, _summary: &EpisodeSummary) -> Result<()> {
        Ok(())
    }

    /// Flush buffered output
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Emits diagnostics as `tracing` events under the `dcsim::telemetry` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record_step(&mut self, record: &StepRecord) -> Result<()> {
        tracing::trace!(
            target: "dcsim::telemetry",
            seed = record.seed,
            step = record.step,
            zone = %record.zone,
            reward = record.reward.total,
            max_temperature = record.max_temperature,
            it_power = record.it_power,
            cooling_power = record.cooling_power,
            pue = record.pue,
            "step"
        );
        Ok(())
    }

    fn record_episode(&mut self, summary: &EpisodeSummary) -> Result<()> {
        tracing::info!(
            target: "dcsim::telemetry",
            seed = summary.seed,
            steps = summary.steps,
            total_reward = summary.total_reward,
            energy_kwh = summary.total_energy_kwh,
            violations = summary.safety_violations,
            termination = ?summary.termination,
            "episode"
        );
        Ok(())
    }
}

/// One JSON object per line, tagged by kind
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonlLine<'a> {
    Step(&'a StepRecord),
    Episode(&'a EpisodeSummary),
}

/// Writes diagnostics as JSON lines to any writer
#[derive(Debug)]
pub struct JsonlSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonlSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &JsonlLine<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write + Send> MetricsSink for JsonlSink<W> {
    fn record_step(&mut self, record: &StepRecord) -> Result<()> {
        self.write_line(&JsonlLine::Step(record))
    }

    fn record_episode(&mut self, summary: &EpisodeSummary) -> Result<()> {
        self.write_line(&JsonlLine::Episode(summary))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::{RewardEvaluator, RewardInputs};
    use crate::config::RewardConfig;

    fn record() -> StepRecord {
        let reward = RewardEvaluator::new(RewardConfig::default(), 1000.0).evaluate(&RewardInputs {
            max_temperature: 40.0,
            total_power: 500.0,
            mean_aging_accrual: 0.0,
            mean_action_delta: 0.0,
        });
        StepRecord {
            seed: 42,
            step: 1,
            zone: reward.zone,
            reward,
            max_temperature: 40.0,
            mean_temperature: 35.0,
            it_power: 400.0,
            cooling_power: 100.0,
            pue: 1.25,
            mean_health: 1.0,
            mean_aging_accrual: 0.0,
            degradation_factor: 1.0,
            economizer_active: false,
            termination: None,
        }
    }

    #[test]
    fn test_jsonl_sink_writes_one_tagged_line_per_record() {
        let mut sink = JsonlSink::new(Vec::new());
        sink.record_step(&record()).unwrap();
        sink.record_step(&record()).unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["kind"], "step");
        assert_eq!(value["zone"], "optimal");
        assert_eq!(value["seed"], 42);
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let mut sink = TracingSink;
        assert!(sink.record_step(&record()).is_ok());
    }
}
