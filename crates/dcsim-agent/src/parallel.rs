//! Concurrent evaluation over many seeds
//!
//! Every seed gets its own [`DataCenterEnv`] on a blocking task of the
//! tokio runtime. Instances share nothing, so results match a sequential
//! run seed for seed.

use std::io::Write;
use std::sync::{Arc, Mutex};

use dcsim_core::{Environment, Result, SimError};
use dcsim_env::{DataCenterEnv, JsonlSink, ObservationLayout, SimConfig};
use tokio::task::JoinHandle;

use crate::baseline::DynPolicy;
use crate::evaluation::{EvaluationMetrics, EvaluationReport, EvaluationRunner};
use crate::sink::{FanoutSink, MetricsFacadeSink};

/// Options for [`evaluate_seeds`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelOptions {
    /// Cut every episode after this many steps
    pub max_steps: Option<u64>,
    /// Keep a JSON-lines step log per episode
    pub capture_log: bool,
    /// Publish through the `metrics` facade
    pub publish_metrics: bool,
}

/// Result of [`evaluate_seeds`]
#[derive(Debug, Clone)]
pub struct ParallelRun {
    /// Aggregated metrics, episodes in seed order
    pub report: EvaluationReport,
    /// JSON-lines logs in seed order, empty unless requested
    pub logs: Vec<Vec<u8>>,
}

/// Writer handle over a buffer shared with the task that reads it back
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Result<Vec<u8>> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| SimError::Other(anyhow::anyhow!("step log buffer poisoned")))?;
        Ok(std::mem::take(&mut *bytes))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::Other, "step log buffer poisoned")
            })?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct EpisodeOutcome {
    metrics: EvaluationMetrics,
    log: Option<Vec<u8>>,
}

fn run_seed<F>(
    config: SimConfig,
    seed: u64,
    options: ParallelOptions,
    make_policy: &F,
) -> Result<EpisodeOutcome>
where
    F: Fn(&ObservationLayout, u64) -> DynPolicy,
{
    let mut env = DataCenterEnv::new(config)?;
    let mut policy = make_policy(&env.observation_layout(), seed);

    let buffer = options.capture_log.then(SharedBuffer::default);
    let mut sink = FanoutSink::new();
    if options.publish_metrics {
        sink = sink.with(Box::new(MetricsFacadeSink::new(policy.name())));
    }
    if let Some(buffer) = &buffer {
        sink = sink.with(Box::new(JsonlSink::new(buffer.clone())));
    }
    if !sink.is_empty() {
        env = env.with_sink(Box::new(sink));
    }

    let mut runner = EvaluationRunner::new();
    if let Some(max_steps) = options.max_steps {
        runner = runner.with_max_steps(max_steps);
    }
    let metrics = runner.run_episode(&mut env, &mut *policy, seed)?;
    env.close()?;

    let log = buffer.as_ref().map(SharedBuffer::take).transpose()?;
    Ok(EpisodeOutcome { metrics, log })
}

/// Evaluate the policy built by `make_policy` on every seed concurrently.
///
/// `make_policy` receives the observation layout and the episode seed. The
/// configuration is validated once before any task starts.
pub async fn evaluate_seeds<F>(
    config: &SimConfig,
    seeds: &[u64],
    options: ParallelOptions,
    make_policy: F,
) -> Result<ParallelRun>
where
    F: Fn(&ObservationLayout, u64) -> DynPolicy + Send + Sync + 'static,
{
    config.validate()?;
    let make_policy = Arc::new(make_policy);

    let handles: Vec<JoinHandle<Result<EpisodeOutcome>>> = seeds
        .iter()
        .map(|&seed| {
            let config = config.clone();
            let make_policy = Arc::clone(&make_policy);
            tokio::task::spawn_blocking(move || {
                run_seed(config, seed, options, make_policy.as_ref())
            })
        })
        .collect();
    tracing::debug!(episodes = handles.len(), "evaluation tasks spawned");

    let mut episodes = Vec::with_capacity(handles.len());
    let mut logs = Vec::new();
    for handle in handles {
        let outcome = handle
            .await
            .map_err(|e| SimError::Other(anyhow::anyhow!("evaluation task failed: {e}")))??;
        episodes.push(outcome.metrics);
        logs.extend(outcome.log);
    }

    let policy = episodes.first().map_or_else(String::new, |m| m.policy.clone());
    Ok(ParallelRun {
        report: EvaluationReport::from_episodes(policy, episodes),
        logs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::PidBaseline;
    use crate::random::RandomPolicy;

    fn config() -> SimConfig {
        let mut config = SimConfig::default();
        config.topology.num_racks = 2;
        config.topology.servers_per_rack = 4;
        config.episode.episode_length = 120;
        config
    }

    fn pid(layout: &ObservationLayout, _seed: u64) -> DynPolicy {
        Box::new(PidBaseline::new(*layout))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_matches_sequential() {
        let seeds = [3, 1, 4, 1, 5];
        let run = evaluate_seeds(&config(), &seeds, ParallelOptions::default(), pid)
            .await
            .unwrap();
        assert_eq!(run.report.policy, "pid");
        assert!(run.logs.is_empty());

        for (&seed, parallel) in seeds.iter().zip(&run.report.episodes) {
            let mut env = DataCenterEnv::new(config()).unwrap();
            let mut policy = PidBaseline::new(env.observation_layout());
            let sequential = EvaluationRunner::new()
                .run_episode(&mut env, &mut policy, seed)
                .unwrap();
            assert_eq!(&sequential, parallel);
        }
    }

    #[test]
    fn test_logs_are_captured_per_seed() {
        let options = ParallelOptions {
            max_steps: Some(10),
            capture_log: true,
            publish_metrics: true,
        };
        let run = tokio_test::block_on(evaluate_seeds(&config(), &[7, 8], options, |layout, seed| {
            Box::new(RandomPolicy::unit(layout.action_dim, seed))
        }))
        .unwrap();

        assert_eq!(run.logs.len(), 2);
        for log in &run.logs {
            let text = std::str::from_utf8(log).unwrap();
            assert_eq!(text.lines().count(), 10);
        }
        assert!(run.report.episodes.iter().all(|m| m.steps == 10));
    }

    #[test]
    fn test_invalid_config_fails_before_spawning() {
        let mut bad = config();
        bad.topology.num_racks = 0;
        let err = tokio_test::block_on(evaluate_seeds(&bad, &[1], ParallelOptions::default(), pid))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig(_)));
    }
}
