//! Workload traces: per-server utilization per step

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};

use dcsim_core::{Result, SimError};

use crate::config::WorkloadConfig;

/// Source of server utilizations.
///
/// `reset` fills the utilizations seen at the start of an episode, `advance`
/// overwrites them with the next step's values. Implementations are reseeded
/// from the episode seed so runs replay exactly.
pub trait WorkloadTrace: Send {
    /// Restart the trace and write the initial utilizations into `out`
    fn reset(&mut self, seed: u64, out: &mut [f64]) -> Result<()>;

    /// Write the next step's utilizations into `out`
    fn advance(&mut self, out: &mut [f64]);

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Seeded Gaussian random walk with a bounded per-step change
#[derive(Debug, Clone)]
pub struct RandomWalkWorkload {
    config: WorkloadConfig,
    noise: Normal<f64>,
    rng: ChaCha8Rng,
    loads: Vec<f64>,
}

impl RandomWalkWorkload {
    /// Create a random walk from workload settings
    pub fn new(config: WorkloadConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.min_initial_load)
            || !(config.min_initial_load..=1.0).contains(&config.max_initial_load)
        {
            return Err(SimError::config("initial load range must satisfy 0 <= min <= max <= 1"));
        }
        let limit = config.max_load_change_per_step;
        if limit.is_nan() || limit < 0.0 {
            return Err(SimError::config(format!(
                "workload.max_load_change_per_step must be non-negative, got {limit}"
            )));
        }
        let noise = Normal::new(0.0, config.load_std)
            .map_err(|e| SimError::config(format!("workload.load_std: {e}")))?;
        Ok(Self {
            config,
            noise,
            rng: ChaCha8Rng::seed_from_u64(0),
            loads: Vec::new(),
        })
    }
}

impl WorkloadTrace for RandomWalkWorkload {
    fn reset(&mut self, seed: u64, out: &mut [f64]) -> Result<()> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        let initial =
            Uniform::new_inclusive(self.config.min_initial_load, self.config.max_initial_load);
        self.loads = (0..out.len()).map(|_| initial.sample(&mut self.rng)).collect();
        out.copy_from_slice(&self.loads);
        Ok(())
    }

    fn advance(&mut self, out: &mut [f64]) {
        let limit = self.config.max_load_change_per_step;
        for load in &mut self.loads {
            let delta = self.noise.sample(&mut self.rng).clamp(-limit, limit);
            *load = (*load + delta).clamp(0.0, 1.0);
        }
        out.copy_from_slice(&self.loads);
    }

    fn name(&self) -> &str {
        "random_walk"
    }
}

/// Same utilization on every server, every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantWorkload {
    utilization: f64,
}

impl ConstantWorkload {
    /// Hold every server at `utilization`
    #[must_use]
    pub fn new(utilization: f64) -> Self {
        Self { utilization }
    }
}

impl WorkloadTrace for ConstantWorkload {
    fn reset(&mut self, _seed: u64, out: &mut [f64]) -> Result<()> {
        out.fill(self.utilization);
        Ok(())
    }

    fn advance(&mut self, out: &mut [f64]) {
        out.fill(self.utilization);
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Replays a recorded `steps × servers` matrix, wrapping at the end
#[derive(Debug, Clone)]
pub struct ReplayWorkload {
    rows: Vec<Vec<f64>>,
    cursor: usize,
    jitter: f64,
    rng: ChaCha8Rng,
}

impl ReplayWorkload {
    /// Replay `rows` verbatim
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(SimError::config("replay workload needs at least one row"));
        }
        Ok(Self {
            rows,
            cursor: 0,
            jitter: 0.0,
            rng: ChaCha8Rng::seed_from_u64(0),
        })
    }

    /// Add seeded uniform noise in `[-jitter, jitter]` to every replayed value
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }

    /// Number of recorded steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the recording is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn emit(&mut self, out: &mut [f64]) {
        let row = &self.rows[self.cursor];
        for (slot, &value) in out.iter_mut().zip(row) {
            let noise = if self.jitter > 0.0 {
                self.rng.gen_range(-self.jitter..=self.jitter)
            } else {
                0.0
            };
            // NaN in a recording is passed through so the episode faults.
            *slot = if value.is_nan() { value } else { (value + noise).clamp(0.0, 1.0) };
        }
    }
}

impl WorkloadTrace for ReplayWorkload {
    fn reset(&mut self, seed: u64, out: &mut [f64]) -> Result<()> {
        if let Some(bad) = self.rows.iter().find(|row| row.len() != out.len()) {
            return Err(SimError::DimensionMismatch {
                expected: out.len(),
                actual: bad.len(),
            });
        }
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.cursor = 0;
        self.emit(out);
        Ok(())
    }

    fn advance(&mut self, out: &mut [f64]) {
        self.cursor = (self.cursor + 1) % self.rows.len();
        self.emit(out);
    }

    fn name(&self) -> &str {
        "replay"
    }
}
