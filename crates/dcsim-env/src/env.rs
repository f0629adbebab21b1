//! Data-center cooling environment
//!
//! [`DataCenterEnv`] owns every piece of mutable simulation state for one
//! episode instance. A step runs, in order: action validation, cooling
//! setpoints, workload advance, cooling evaluation on pre-step temperatures,
//! server evaluation, finiteness check, commit, reward, observation.

use std::collections::VecDeque;
use std::ops::Range;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use dcsim_core::{
    ActionSpace, BoxActionSpace, BoxObservationSpace, ContinuousAction, Environment,
    ObservationSpace, Result, Reward, SimError, Step, VectorObservation,
};

use crate::config::{CoolingMode, InitialState, SimConfig};
use crate::cooling::{CoolingSystem, RackCooling};
use crate::episode::{EpisodeState, EpisodeSummary, TerminationReason};
use crate::rack::{Rack, RackReport, RackUpdate, RecirculationMatrix};
use crate::reward::{RewardBreakdown, RewardEvaluator, RewardInputs, Zone};
use crate::server::{Server, ServerThermalModel};
use crate::telemetry::{MetricsSink, StepRecord};
use crate::workload::{RandomWalkWorkload, WorkloadTrace};

/// Seed of the stream `reset(None)` draws episode seeds from
pub const DEFAULT_SEED_STREAM: u64 = 0x5EED_DC51;

/// Power figures of one step (W)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerBreakdown {
    /// IT power excluding leakage
    pub it: f64,
    /// Leakage power
    pub leakage: f64,
    /// Cooling power after economizer and degradation
    pub cooling: f64,
    /// Heat absorbed by the economizer
    pub economizer_heat: f64,
}

impl PowerBreakdown {
    /// Electrical load of the servers
    #[must_use]
    pub fn server_total(&self) -> f64 {
        self.it + self.leakage
    }

    /// Facility total
    #[must_use]
    pub fn total(&self) -> f64 {
        self.server_total() + self.cooling
    }

    /// Instantaneous power usage effectiveness
    #[must_use]
    pub fn pue(&self) -> f64 {
        let server = self.server_total();
        if server > 0.0 {
            self.total() / server
        } else {
            1.0
        }
    }
}

/// Where and what went non-finite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Step at which the fault occurred
    pub step: u64,
    /// Global server index, if a server update failed
    pub server: Option<usize>,
    /// Description of the corrupted quantity
    pub detail: String,
}

/// Diagnostics returned with every step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step index, starting at 1
    pub step: u64,
    /// Zone of the hottest server
    pub zone: Zone,
    /// Reward terms; `None` when the step faulted
    pub reward: Option<RewardBreakdown>,
    /// Power figures
    pub power: PowerBreakdown,
    /// Hottest server (°C)
    pub max_temperature: f64,
    /// Mean server temperature (°C)
    pub mean_temperature: f64,
    /// Mean aging accrued this step
    pub mean_aging_accrual: f64,
    /// Per-rack heat and energy balance
    pub racks: Vec<RackReport>,
    /// Sum of rack energy residuals (J)
    pub energy_residual_j: f64,
    /// Whether any server hit the physical temperature clamp
    pub temperature_clamped: bool,
    /// Action components moved into bounds
    pub clipped_components: usize,
    /// Economizer state
    pub economizer_active: bool,
    /// Cooling degradation multiplier
    pub degradation_factor: f64,
    /// Set when the step ended the episode
    pub termination: Option<TerminationReason>,
    /// Set when physics produced a non-finite value
    pub fault: Option<Fault>,
}

/// Un-normalised physical state, for diagnostics and baselines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawState {
    /// Server temperatures in global order (°C)
    pub temperatures: Vec<f64>,
    /// Server utilizations
    pub utilizations: Vec<f64>,
    /// Server IT plus leakage power (W)
    pub server_power: Vec<f64>,
    /// Server health in (0, 1]
    pub health: Vec<f64>,
    /// Current setpoints in action layout
    pub setpoints: Vec<f64>,
    /// Episode ambient temperature (°C)
    pub ambient: f64,
    /// Cooling degradation multiplier
    pub degradation_factor: f64,
    /// Economizer state
    pub economizer_active: bool,
}

/// Index layout of the observation vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationLayout {
    /// Number of servers
    pub num_servers: usize,
    /// Number of setpoints
    pub action_dim: usize,
    /// Length of the max-temperature history window
    pub history_len: usize,
    /// Temperature mapped to 0 (°C)
    pub temperature_low: f64,
    /// Temperature mapped to 1 (°C)
    pub temperature_high: f64,
}

impl ObservationLayout {
    /// Normalised server temperatures
    #[must_use]
    pub fn temperatures(&self) -> Range<usize> {
        0..self.num_servers
    }

    /// Server utilizations
    #[must_use]
    pub fn utilizations(&self) -> Range<usize> {
        self.num_servers..2 * self.num_servers
    }

    /// Server health
    #[must_use]
    pub fn health(&self) -> Range<usize> {
        2 * self.num_servers..3 * self.num_servers
    }

    /// Current setpoints, in action layout
    #[must_use]
    pub fn setpoints(&self) -> Range<usize> {
        let start = 3 * self.num_servers;
        start..start + self.action_dim
    }

    /// Degradation level in [0, 1]
    #[must_use]
    pub fn degradation(&self) -> usize {
        3 * self.num_servers + self.action_dim
    }

    /// Economizer flag
    #[must_use]
    pub fn economizer(&self) -> usize {
        self.degradation() + 1
    }

    /// Episode progress in [0, 1]
    #[must_use]
    pub fn progress(&self) -> usize {
        self.degradation() + 2
    }

    /// Normalised max-temperature history, oldest first
    #[must_use]
    pub fn history(&self) -> Range<usize> {
        let start = self.degradation() + 3;
        start..start + self.history_len
    }

    /// Total observation width
    #[must_use]
    pub fn dim(&self) -> usize {
        self.history().end
    }

    /// Map a temperature into [0, 1]
    #[must_use]
    pub fn normalise_temperature(&self, temperature: f64) -> f64 {
        ((temperature - self.temperature_low) / (self.temperature_high - self.temperature_low))
            .clamp(0.0, 1.0)
    }

    /// Inverse of [`Self::normalise_temperature`]
    #[must_use]
    pub fn denormalise_temperature(&self, value: f64) -> f64 {
        self.temperature_low + value * (self.temperature_high - self.temperature_low)
    }
}

/// Data-center thermal simulation behind the [`Environment`] contract
pub struct DataCenterEnv {
    config: SimConfig,
    model: ServerThermalModel,
    racks: Vec<Rack>,
    cooling: CoolingSystem,
    reward: RewardEvaluator,
    workload: Box<dyn WorkloadTrace>,
    sink: Option<Box<dyn MetricsSink>>,
    action_space: BoxActionSpace,
    layout: ObservationLayout,
    utilizations: Vec<f64>,
    previous_action: Option<Vec<f64>>,
    history: VecDeque<f64>,
    episode: Option<EpisodeState>,
    seed_stream: ChaCha8Rng,
}

impl std::fmt::Debug for DataCenterEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCenterEnv")
            .field("servers", &self.layout.num_servers)
            .field("mode", &self.cooling.mode())
            .field("workload", &self.workload.name())
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

impl DataCenterEnv {
    /// Create an environment driven by the configured random-walk workload
    pub fn new(config: SimConfig) -> Result<Self> {
        let workload = RandomWalkWorkload::new(config.workload.clone())?;
        Self::with_workload(config, Box::new(workload))
    }

    /// Create an environment driven by a custom workload trace
    pub fn with_workload(config: SimConfig, workload: Box<dyn WorkloadTrace>) -> Result<Self> {
        config.validate()?;

        let topology = &config.topology;
        let num_servers = topology.num_servers();
        let ambient = config.physics.ambient_temp;
        let model = ServerThermalModel::new(config.physics.clone(), ambient);

        let racks = (0..topology.num_racks)
            .map(|r| {
                let matrix = RecirculationMatrix::new(
                    topology.servers_per_rack,
                    topology.recirculation_for(r),
                    topology.recirculation_radius,
                    topology.recirculation_decay,
                );
                Rack::new(vec![Server::new(ambient); topology.servers_per_rack], matrix)
            })
            .collect();

        let cooling = CoolingSystem::new(config.cooling.clone(), topology.num_racks, ambient);

        #[allow(clippy::cast_precision_loss)]
        let reference_power = num_servers as f64 * config.physics.max_power
            + topology.num_racks as f64 * cooling.curves().max_rack_power();
        let reward = RewardEvaluator::new(config.reward.clone(), reference_power);

        let action_dim = config.action_dim();
        let (temperature_low, temperature_high) = model.temperature_bounds();
        let layout = ObservationLayout {
            num_servers,
            action_dim,
            history_len: config.episode.history_len,
            // Widest range any episode can reach, so the map is stable across resets.
            temperature_low: temperature_low - config.episode.ambient_jitter,
            temperature_high: temperature_high + config.episode.ambient_jitter,
        };

        tracing::info!(
            racks = topology.num_racks,
            servers = num_servers,
            mode = config.cooling.mode.as_str(),
            workload = workload.name(),
            obs_dim = layout.dim(),
            action_dim,
            "data-center environment created"
        );

        Ok(Self {
            model,
            racks,
            cooling,
            reward,
            workload,
            sink: None,
            action_space: BoxActionSpace::unit(action_dim),
            layout,
            utilizations: vec![0.0; num_servers],
            previous_action: None,
            history: VecDeque::with_capacity(config.episode.history_len),
            episode: None,
            seed_stream: ChaCha8Rng::seed_from_u64(DEFAULT_SEED_STREAM),
            config,
        })
    }

    /// Attach a diagnostics sink
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Reseed the stream used by `reset(None)`
    #[must_use]
    pub fn with_seed_stream(mut self, seed: u64) -> Self {
        self.seed_stream = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Validated configuration
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Observation index layout
    #[must_use]
    pub fn observation_layout(&self) -> ObservationLayout {
        self.layout
    }

    /// Reward evaluator in use
    #[must_use]
    pub fn reward_evaluator(&self) -> &RewardEvaluator {
        &self.reward
    }

    /// Counters of the running episode
    #[must_use]
    pub fn episode_state(&self) -> Option<&EpisodeState> {
        self.episode.as_ref()
    }

    /// Racks in order
    #[must_use]
    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    /// Cooling plant state
    #[must_use]
    pub fn cooling(&self) -> &CoolingSystem {
        &self.cooling
    }

    /// Hottest server temperature (°C)
    #[must_use]
    pub fn max_temperature(&self) -> f64 {
        self.racks
            .iter()
            .map(Rack::max_temperature)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn servers(&self) -> impl Iterator<Item = &Server> + '_ {
        self.racks.iter().flat_map(|r| r.servers().iter())
    }

    fn mean_temperature(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let n = self.layout.num_servers as f64;
        self.servers().map(|s| s.temperature).sum::<f64>() / n
    }

    fn setpoint_vector(&self) -> Vec<f64> {
        self.cooling
            .setpoints()
            .iter()
            .flat_map(|s| match self.cooling.mode() {
                CoolingMode::Air => vec![s.fan],
                CoolingMode::Liquid => vec![s.pump],
                CoolingMode::Hybrid => vec![s.fan, s.pump],
            })
            .collect()
    }

    /// Un-normalised state of the current episode
    #[must_use]
    pub fn raw_state(&self) -> RawState {
        RawState {
            temperatures: self.servers().map(|s| s.temperature).collect(),
            utilizations: self.servers().map(|s| s.utilization).collect(),
            server_power: self.servers().map(Server::total_power).collect(),
            health: self.servers().map(Server::health).collect(),
            setpoints: self.setpoint_vector(),
            ambient: self.model.ambient(),
            degradation_factor: self.cooling.degradation_factor(),
            economizer_active: self.cooling.economizer_active(),
        }
    }

    fn observe(&self) -> VectorObservation {
        let layout = &self.layout;
        let mut data = Vec::with_capacity(layout.dim());
        data.extend(self.servers().map(|s| layout.normalise_temperature(s.temperature)));
        data.extend(self.servers().map(|s| s.utilization.clamp(0.0, 1.0)));
        data.extend(self.servers().map(Server::health));
        data.extend(self.setpoint_vector());
        data.push(self.cooling.degradation_level());
        data.push(if self.cooling.economizer_active() { 1.0 } else { 0.0 });

        let step = self.episode.as_ref().map_or(0, |e| e.step);
        #[allow(clippy::cast_precision_loss)]
        let progress = step as f64 / self.config.episode.episode_length as f64;
        data.push(progress.clamp(0.0, 1.0));
        data.extend(self.history.iter().copied());

        VectorObservation::new(data)
    }

    fn push_history(&mut self) {
        if self.layout.history_len == 0 {
            return;
        }
        if self.history.len() == self.layout.history_len {
            self.history.pop_front();
        }
        self.history
            .push_back(self.layout.normalise_temperature(self.max_temperature()));
    }

    fn initial_temperatures(&self, rng: &mut ChaCha8Rng, ambient: f64) -> Vec<f64> {
        let n = self.config.topology.servers_per_rack;
        match self.config.episode.initial_state {
            InitialState::Ambient => vec![ambient; n],
            InitialState::Randomized { spread } => (0..n)
                .map(|_| {
                    if spread > 0.0 {
                        ambient + rng.gen_range(0.0..=spread)
                    } else {
                        ambient
                    }
                })
                .collect(),
        }
    }

    fn fault_step(
        &mut self,
        clipped_components: usize,
        fault: Fault,
    ) -> Step<VectorObservation, StepInfo> {
        tracing::error!(
            step = fault.step,
            server = ?fault.server,
            detail = %fault.detail,
            "numerical fault; terminating episode"
        );

        if let Some(episode) = self.episode.as_mut() {
            episode.termination = Some(TerminationReason::NumericalFault);
        }
        self.publish_episode();

        let info = StepInfo {
            step: fault.step,
            zone: self.reward.classify(self.max_temperature()),
            reward: None,
            power: PowerBreakdown::default(),
            max_temperature: self.max_temperature(),
            mean_temperature: self.mean_temperature(),
            mean_aging_accrual: 0.0,
            racks: Vec::new(),
            energy_residual_j: 0.0,
            temperature_clamped: false,
            clipped_components,
            economizer_active: self.cooling.economizer_active(),
            degradation_factor: self.cooling.degradation_factor(),
            termination: Some(TerminationReason::NumericalFault),
            fault: Some(fault),
        };

        Step {
            observation: self.observe(),
            reward: Reward(0.0),
            terminated: true,
            truncated: false,
            info,
        }
    }

    fn publish_step(&mut self, record: &StepRecord) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.record_step(record) {
                tracing::warn!(error = %e, "metrics sink rejected step record");
            }
        }
    }

    fn publish_episode(&mut self) {
        let Some(summary) = self.episode.as_ref().map(EpisodeState::summary) else {
            return;
        };
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.record_episode(&summary).and_then(|()| sink.flush()) {
                tracing::warn!(error = %e, "metrics sink rejected episode summary");
            }
        }
    }

    /// Summary of the running or last episode
    #[must_use]
    pub fn episode_summary(&self) -> Option<EpisodeSummary> {
        self.episode.as_ref().map(EpisodeState::summary)
    }
}

impl Environment for DataCenterEnv {
    type Observation = VectorObservation;
    type Action = ContinuousAction;
    type Info = StepInfo;

    fn observation_space(&self) -> Box<dyn ObservationSpace<Observation = Self::Observation>> {
        Box::new(BoxObservationSpace::unit(self.layout.dim()))
    }

    fn action_space(&self) -> Box<dyn ActionSpace<Action = Self::Action>> {
        Box::new(self.action_space.clone())
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Observation> {
        let seed = seed.unwrap_or_else(|| self.seed_stream.gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let jitter = self.config.episode.ambient_jitter;
        let ambient = if jitter > 0.0 {
            self.config.physics.ambient_temp + rng.gen_range(-jitter..=jitter)
        } else {
            self.config.physics.ambient_temp
        };
        let temperatures: Vec<Vec<f64>> = (0..self.racks.len())
            .map(|_| self.initial_temperatures(&mut rng, ambient))
            .collect();

        // The workload is the only fallible part, so a failed reset leaves the
        // previous episode untouched.
        let workload_seed: u64 = rng.gen();
        let mut utilizations = vec![0.0; self.utilizations.len()];
        self.workload.reset(workload_seed, &mut utilizations)?;
        self.utilizations = utilizations;

        self.model = ServerThermalModel::new(self.config.physics.clone(), ambient);
        self.cooling.reset(ambient);
        for (rack, temperatures) in self.racks.iter_mut().zip(&temperatures) {
            rack.reset_servers(temperatures);
        }

        let per_rack = self.config.topology.servers_per_rack;
        for (rack, utilizations) in self.racks.iter_mut().zip(self.utilizations.chunks(per_rack)) {
            for (server, &u) in rack.servers_mut().iter_mut().zip(utilizations) {
                server.utilization = u.clamp(0.0, 1.0);
                server.it_power = self.model.it_power(u);
                server.leakage_power = self.model.leakage_power(server.temperature);
            }
        }

        self.previous_action = None;
        self.history.clear();
        let initial = self.layout.normalise_temperature(self.max_temperature());
        self.history.extend(std::iter::repeat(initial).take(self.layout.history_len));
        self.episode = Some(EpisodeState::new(seed, self.max_temperature()));

        tracing::info!(seed, ambient, max_temperature = self.max_temperature(), "episode reset");
        Ok(self.observe())
    }

    fn step(&mut self, action: &Self::Action) -> Result<Step<Self::Observation, Self::Info>> {
        match &self.episode {
            None => return Err(SimError::NotReset),
            Some(e) if e.is_done() => return Err(SimError::EpisodeFinished),
            Some(_) => {}
        }

        let clipped = self.action_space.clip(action)?;
        let setpoints = clipped.action.0;
        let step_index = self.episode.as_ref().map_or(0, |e| e.step) + 1;

        self.cooling.apply(&setpoints);
        self.workload.advance(&mut self.utilizations);

        let supply = self.model.ambient();
        let per_rack = self.config.topology.servers_per_rack;
        let mut coolings: Vec<RackCooling> = Vec::with_capacity(self.racks.len());
        let mut updates: Vec<RackUpdate> = Vec::with_capacity(self.racks.len());
        for (r, (rack, utilizations)) in self
            .racks
            .iter()
            .zip(self.utilizations.chunks(per_rack))
            .enumerate()
        {
            let cooling = self
                .cooling
                .evaluate_rack(r, &rack.temperatures(), &rack.inlet_temperatures(supply));
            updates.push(rack.evaluate(&self.model, utilizations, &cooling.heat_removed));
            coolings.push(cooling);
        }

        // Nothing is committed unless every quantity is finite.
        for (r, (update, cooling)) in updates.iter().zip(&coolings).enumerate() {
            if let Some(slot) = update.servers.iter().position(|s| !s.is_finite()) {
                let fault = Fault {
                    step: step_index,
                    server: Some(r * per_rack + slot),
                    detail: format!("non-finite server update: {:?}", update.servers[slot]),
                };
                return Ok(self.fault_step(clipped.clipped_components, fault));
            }
            if !cooling.power.is_finite() {
                let fault = Fault {
                    step: step_index,
                    server: None,
                    detail: format!("non-finite cooling power {} in rack {r}", cooling.power),
                };
                return Ok(self.fault_step(clipped.clipped_components, fault));
            }
        }

        let thermal_mass = self.model.thermal_mass();
        let dt = self.model.dt();
        let mut power = PowerBreakdown::default();
        let mut racks = Vec::with_capacity(updates.len());
        let mut aging_sum = 0.0;
        let mut temperature_clamped = false;
        for ((rack, update), cooling) in self.racks.iter_mut().zip(&updates).zip(&coolings) {
            rack.commit(update);
            power.it += update.servers.iter().map(|s| s.it_power).sum::<f64>();
            power.leakage += update.servers.iter().map(|s| s.leakage_power).sum::<f64>();
            power.cooling += cooling.power;
            power.economizer_heat += cooling.economizer_heat;
            aging_sum += update.servers.iter().map(|s| s.aging_accrual).sum::<f64>();
            temperature_clamped |= update.any_clamped();
            racks.push(RackReport {
                heat_load: update.heat_load(),
                heat_removed: update.heat_removed(),
                max_temperature: rack.max_temperature(),
                energy_residual_j: update.energy_residual_j(thermal_mass, dt),
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let n = self.layout.num_servers as f64;
        let mean_aging_accrual = aging_sum / n;
        let mean_action_delta = self.previous_action.as_ref().map_or(0.0, |prev| {
            #[allow(clippy::cast_precision_loss)]
            let len = setpoints.len().max(1) as f64;
            prev.iter().zip(&setpoints).map(|(a, b)| (a - b).abs()).sum::<f64>() / len
        });

        let max_temperature = self.max_temperature();
        let breakdown = self.reward.evaluate(&RewardInputs {
            max_temperature,
            total_power: power.total(),
            mean_aging_accrual,
            mean_action_delta,
        });

        let episode_length = self.config.episode.episode_length;
        let termination = {
            let Some(episode) = self.episode.as_mut() else {
                return Err(SimError::NotReset);
            };
            episode.record(
                power.server_total(),
                power.cooling,
                dt,
                breakdown.total,
                max_temperature,
                breakdown.zone.is_violation(),
            );
            episode.termination = if breakdown.terminates() {
                Some(TerminationReason::Catastrophic)
            } else if episode.step >= episode_length {
                Some(TerminationReason::EpisodeLength)
            } else {
                None
            };
            episode.termination
        };

        if breakdown.zone == Zone::Catastrophic {
            tracing::warn!(
                step = step_index,
                max_temperature,
                "catastrophic temperature; terminating episode"
            );
        } else if breakdown.zone.is_violation() {
            tracing::warn!(step = step_index, max_temperature, "critical temperature");
        }
        tracing::debug!(
            step = step_index,
            zone = %breakdown.zone,
            reward = breakdown.total,
            max_temperature,
            total_power = power.total(),
            "step"
        );

        self.push_history();
        self.previous_action = Some(setpoints);

        let info = StepInfo {
            step: step_index,
            zone: breakdown.zone,
            reward: Some(breakdown),
            power,
            max_temperature,
            mean_temperature: self.mean_temperature(),
            mean_aging_accrual,
            energy_residual_j: racks.iter().map(|r| r.energy_residual_j).sum(),
            racks,
            temperature_clamped,
            clipped_components: clipped.clipped_components,
            economizer_active: self.cooling.economizer_active(),
            degradation_factor: self.cooling.degradation_factor(),
            termination,
            fault: None,
        };

        if self.sink.is_some() {
            let record = StepRecord {
                seed: self.episode.as_ref().map_or(0, |e| e.seed),
                step: step_index,
                zone: breakdown.zone,
                reward: breakdown,
                max_temperature,
                mean_temperature: info.mean_temperature,
                it_power: power.server_total(),
                cooling_power: power.cooling,
                pue: power.pue(),
                mean_health: self.servers().map(Server::health).sum::<f64>() / n,
                mean_aging_accrual,
                degradation_factor: info.degradation_factor,
                economizer_active: info.economizer_active,
                termination,
            };
            self.publish_step(&record);
        }
        if termination.is_some() {
            self.publish_episode();
        }

        Ok(Step {
            observation: self.observe(),
            reward: Reward(breakdown.total),
            terminated: termination.is_some_and(TerminationReason::is_failure),
            truncated: termination == Some(TerminationReason::EpisodeLength),
            info,
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{ConstantWorkload, ReplayWorkload};
    use approx::assert_relative_eq;

    fn small_config() -> SimConfig {
        let mut config = SimConfig::default();
        config.topology.num_racks = 2;
        config.topology.servers_per_rack = 3;
        config.episode.episode_length = 20;
        config
    }

    #[test]
    fn test_spaces_match_layout() {
        let env = DataCenterEnv::new(small_config()).unwrap();
        let layout = env.observation_layout();
        assert_eq!(env.action_space().dim(), 2);
        assert_eq!(env.observation_space().shape(), vec![layout.dim()]);
        assert_eq!(layout.dim(), 6 * 3 + 2 + 3 + 4);
    }

    #[test]
    fn test_unbounded_recirculation_radius_builds() {
        let mut config = small_config();
        config.topology.recirculation_radius = usize::MAX;
        let mut env = DataCenterEnv::new(config).unwrap();
        env.reset(Some(2)).unwrap();
        assert!(env.step(&ContinuousAction::splat(2, 0.5)).is_ok());
    }

    #[test]
    fn test_step_before_reset_fails() {
        let mut env = DataCenterEnv::new(small_config()).unwrap();
        let err = env.step(&ContinuousAction::splat(2, 0.5)).unwrap_err();
        assert!(matches!(err, SimError::NotReset));
    }

    #[test]
    fn test_wrong_dimension_is_rejected_without_side_effects() {
        let mut env = DataCenterEnv::new(small_config()).unwrap();
        env.reset(Some(1)).unwrap();
        let before = env.raw_state();
        let err = env.step(&ContinuousAction::splat(3, 0.5)).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(env.raw_state(), before);
        assert_eq!(env.episode_state().unwrap().step, 0);
    }

    #[test]
    fn test_out_of_range_action_is_clipped_and_counted() {
        let mut env = DataCenterEnv::new(small_config()).unwrap();
        env.reset(Some(1)).unwrap();
        let step = env
            .step(&ContinuousAction(vec![f64::INFINITY, -3.0]))
            .unwrap();
        assert_eq!(step.info.clipped_components, 2);
        assert_eq!(env.raw_state().setpoints, vec![1.0, 0.0]);
    }

    #[test]
    fn test_truncates_at_episode_length_then_refuses() {
        let mut env = DataCenterEnv::new(small_config()).unwrap();
        env.reset(Some(3)).unwrap();
        let action = ContinuousAction::splat(2, 0.6);
        for _ in 0..19 {
            assert!(!env.step(&action).unwrap().is_done());
        }
        let last = env.step(&action).unwrap();
        assert!(last.truncated);
        assert!(!last.terminated);
        assert_eq!(last.info.termination, Some(TerminationReason::EpisodeLength));
        assert!(matches!(env.step(&action), Err(SimError::EpisodeFinished)));
    }

    #[test]
    fn test_nan_workload_faults_without_committing() {
        let config = small_config();
        let rows = vec![vec![0.5; 6], vec![f64::NAN; 6]];
        let workload = ReplayWorkload::new(rows).unwrap();
        let mut env = DataCenterEnv::with_workload(config, Box::new(workload)).unwrap();
        env.reset(Some(9)).unwrap();
        let before = env.raw_state();

        let step = env.step(&ContinuousAction::splat(2, 0.5)).unwrap();
        assert!(step.terminated);
        assert_eq!(step.info.termination, Some(TerminationReason::NumericalFault));
        assert!(step.info.fault.is_some());
        assert_eq!(step.reward, Reward(0.0));
        assert_eq!(env.raw_state().temperatures, before.temperatures);
        assert!(step.observation.data.iter().all(|x| x.is_finite()));
    }

    /// Workload that only starts once.
    struct OneShotWorkload {
        started: bool,
    }

    impl WorkloadTrace for OneShotWorkload {
        fn reset(&mut self, _seed: u64, out: &mut [f64]) -> Result<()> {
            if self.started {
                return Err(SimError::config("trace exhausted"));
            }
            self.started = true;
            out.fill(0.5);
            Ok(())
        }

        fn advance(&mut self, out: &mut [f64]) {
            out.fill(0.5);
        }

        fn name(&self) -> &str {
            "one_shot"
        }
    }

    #[test]
    fn test_failed_reset_keeps_running_episode() {
        let workload = OneShotWorkload { started: false };
        let mut env = DataCenterEnv::with_workload(small_config(), Box::new(workload)).unwrap();
        env.reset(Some(4)).unwrap();
        for _ in 0..3 {
            env.step(&ContinuousAction::splat(2, 0.5)).unwrap();
        }
        let before = env.raw_state();

        assert!(matches!(env.reset(Some(5)), Err(SimError::InvalidConfig(_))));
        assert_eq!(env.raw_state(), before);
        let episode = env.episode_state().unwrap();
        assert_eq!(episode.seed, 4);
        assert_eq!(episode.step, 3);
        assert!(env.step(&ContinuousAction::splat(2, 0.5)).is_ok());
    }

    #[test]
    fn test_observation_stays_in_unit_box() {
        let mut env =
            DataCenterEnv::with_workload(small_config(), Box::new(ConstantWorkload::new(1.0)))
                .unwrap();
        let space = env.observation_space();
        let obs = env.reset(Some(5)).unwrap();
        assert!(space.contains(&obs));
        for _ in 0..20 {
            let step = env.step(&ContinuousAction::splat(2, 0.0)).unwrap();
            assert!(space.contains(&step.observation));
            if step.is_done() {
                break;
            }
        }
    }

    #[test]
    fn test_reset_none_draws_distinct_seeds() {
        let mut env = DataCenterEnv::new(small_config()).unwrap();
        env.reset(None).unwrap();
        let first = env.episode_state().unwrap().seed;
        env.reset(None).unwrap();
        let second = env.episode_state().unwrap().seed;
        assert_ne!(first, second);
    }

    #[test]
    fn test_power_breakdown_pue() {
        let power = PowerBreakdown {
            it: 800.0,
            leakage: 200.0,
            cooling: 250.0,
            economizer_heat: 0.0,
        };
        assert_relative_eq!(power.total(), 1250.0);
        assert_relative_eq!(power.pue(), 1.25);
    }

    #[test]
    fn test_layout_temperature_round_trip() {
        let env = DataCenterEnv::new(small_config()).unwrap();
        let layout = env.observation_layout();
        let x = layout.normalise_temperature(50.0);
        assert_relative_eq!(layout.denormalise_temperature(x), 50.0, epsilon = 1e-9);
    }
}
