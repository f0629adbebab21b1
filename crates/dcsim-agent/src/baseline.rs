//! Rule-based cooling controllers used as comparison baselines
//!
//! Both controllers read the observation vector through an
//! [`ObservationLayout`] and emit one value for every setpoint.

use dcsim_core::{ContinuousAction, Policy, Result, SimError, VectorObservation};
use dcsim_env::ObservationLayout;
use serde::{Deserialize, Serialize};

use crate::random::RandomPolicy;

/// Boxed policy over the simulator's observation and action types
pub type DynPolicy = Box<dyn Policy<Observation = VectorObservation, Action = ContinuousAction>>;

/// Built-in baseline controllers, selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKind {
    /// [`PidBaseline`] with default gains
    Pid,
    /// [`ConstantPolicy`]
    Constant,
    /// [`RandomPolicy`]
    Random,
}

impl BaselineKind {
    /// Every kind, in display order
    pub const ALL: [Self; 3] = [Self::Pid, Self::Constant, Self::Random];

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::Constant => "constant",
            Self::Random => "random",
        }
    }

    /// Build a controller for one episode.
    ///
    /// `setpoint` only applies to [`BaselineKind::Constant`]; `seed` only to
    /// [`BaselineKind::Random`].
    #[must_use]
    pub fn build(self, layout: &ObservationLayout, seed: u64, setpoint: f64) -> DynPolicy {
        match self {
            Self::Pid => Box::new(PidBaseline::new(*layout)),
            Self::Constant => Box::new(ConstantPolicy::new(layout.action_dim, setpoint)),
            Self::Random => Box::new(RandomPolicy::unit(layout.action_dim, seed)),
        }
    }
}

impl std::str::FromStr for BaselineKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SimError::config(format!("unknown baseline '{s}'")))
    }
}

/// Holds every setpoint at a fixed level
#[derive(Debug, Clone)]
pub struct ConstantPolicy {
    action_dim: usize,
    setpoint: f64,
    name: String,
}

impl ConstantPolicy {
    /// Create a new constant policy; the setpoint is clamped into [0, 1]
    #[must_use]
    pub fn new(action_dim: usize, setpoint: f64) -> Self {
        let setpoint = setpoint.clamp(0.0, 1.0);
        Self {
            action_dim,
            setpoint,
            name: format!("constant-{setpoint:.2}"),
        }
    }

    /// The emitted setpoint
    #[must_use]
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }
}

impl Policy for ConstantPolicy {
    type Observation = VectorObservation;
    type Action = ContinuousAction;

    fn act(&mut self, _observation: &Self::Observation) -> Result<Self::Action> {
        Ok(ContinuousAction::splat(self.action_dim, self.setpoint))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Gains and limits of [`PidBaseline`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    /// Target maximum temperature (°C)
    pub target_temperature: f64,
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Derivative gain
    pub kd: f64,
    /// Anti-windup bound on the accumulated error
    pub integral_limit: f64,
    /// Output when the error terms are zero
    pub bias: f64,
    /// Lowest setpoint the controller will emit
    pub floor: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            target_temperature: 30.0,
            kp: 0.05,
            ki: 0.002,
            kd: 0.01,
            integral_limit: 100.0,
            bias: 0.4,
            floor: 0.2,
        }
    }
}

/// PID loop on the hottest server's temperature.
///
/// All setpoints move together. The output never drops below
/// [`PidConfig::floor`], so the controller errs on the side of cooling.
#[derive(Debug, Clone)]
pub struct PidBaseline {
    config: PidConfig,
    layout: ObservationLayout,
    integral: f64,
    previous_error: f64,
}

impl PidBaseline {
    /// Create a new PID baseline with the default gains
    #[must_use]
    pub fn new(layout: ObservationLayout) -> Self {
        Self::with_config(layout, PidConfig::default())
    }

    /// Create a new PID baseline with explicit gains
    #[must_use]
    pub fn with_config(layout: ObservationLayout, config: PidConfig) -> Self {
        Self {
            config,
            layout,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    /// Gains in use
    #[must_use]
    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    /// Accumulated error
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Hottest server temperature recovered from an observation
    pub fn max_temperature(&self, observation: &VectorObservation) -> Result<f64> {
        if observation.len() != self.layout.dim() {
            return Err(SimError::DimensionMismatch {
                expected: self.layout.dim(),
                actual: observation.len(),
            });
        }
        let hottest = observation.data[self.layout.temperatures()]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(self.layout.denormalise_temperature(hottest))
    }

    /// Advance the loop by one error sample and return the setpoint
    pub fn update(&mut self, temperature: f64) -> f64 {
        let PidConfig {
            target_temperature,
            kp,
            ki,
            kd,
            integral_limit,
            bias,
            floor,
        } = self.config;

        let error = temperature - target_temperature;
        self.integral = (self.integral + error).clamp(-integral_limit, integral_limit);
        let derivative = error - self.previous_error;
        self.previous_error = error;

        (bias + kp * error + ki * self.integral + kd * derivative).clamp(floor, 1.0)
    }
}

impl Policy for PidBaseline {
    type Observation = VectorObservation;
    type Action = ContinuousAction;

    fn act(&mut self, observation: &Self::Observation) -> Result<Self::Action> {
        let temperature = self.max_temperature(observation)?;
        let setpoint = self.update(temperature);
        Ok(ContinuousAction::splat(self.layout.action_dim, setpoint))
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    fn name(&self) -> &str {
        "pid"
    }
}
