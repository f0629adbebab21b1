//! Simulation configuration
//!
//! Every physical and reward constant the engine uses lives here. Configs
//! are plain serde structs so they can be loaded from TOML or JSON, and
//! `SimConfig::validate` rejects contradictory values before a run starts.

use std::path::Path;

use anyhow::Context;
use dcsim_core::{Result, SimError};
use serde::{Deserialize, Serialize};

/// Largest leakage exponent allowed anywhere inside the temperature clamp range.
pub const MAX_LEAKAGE_EXPONENT: f64 = 50.0;

/// Cooling modality of the facility
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoolingMode {
    /// Fans only
    #[default]
    Air,
    /// Pumped liquid loop only
    Liquid,
    /// Fans and liquid loop with independent setpoints
    Hybrid,
}

impl CoolingMode {
    /// Number of action channels per rack
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Air | Self::Liquid => 1,
            Self::Hybrid => 2,
        }
    }

    /// Stable lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Liquid => "liquid",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Server power and thermal constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Supply air / outside ambient temperature (°C).
    pub ambient_temp: f64,
    /// Simulated seconds per step.
    pub dt_s: f64,
    /// Server thermal mass (J/K).
    pub thermal_mass: f64,
    /// IT power at zero utilization (W).
    pub idle_power: f64,
    /// IT power at full utilization (W).
    pub max_power: f64,
    /// Exponent `r` of the dynamic power curve `2u - u^r`, in (0, 1).
    pub dynamic_exponent: f64,
    /// Leakage power at the leakage reference temperature (W).
    pub leakage_base_w: f64,
    /// Exponential leakage growth per kelvin (1/K).
    pub leakage_coeff: f64,
    /// Reference temperature for leakage (°C).
    pub leakage_ref_temp: f64,
    /// Temperature above which aging accelerates (°C).
    pub aging_ref_temp: f64,
    /// Kelvin above the aging reference for the wear rate to double.
    pub aging_doubling_c: f64,
    /// Wear accrued per second at one doubling above the reference.
    pub aging_rate: f64,
    /// Lower temperature clamp, kelvin below ambient.
    pub min_temp_offset: f64,
    /// Upper temperature clamp, kelvin above ambient.
    pub max_temp_offset: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            ambient_temp: 22.0,
            dt_s: 1.0,
            thermal_mass: 2000.0,
            idle_power: 200.0,
            max_power: 800.0,
            dynamic_exponent: 0.75,
            leakage_base_w: 10.0,
            leakage_coeff: 0.03,
            leakage_ref_temp: 45.0,
            aging_ref_temp: 45.0,
            aging_doubling_c: 10.0,
            aging_rate: 1.0 / 3600.0,
            min_temp_offset: 5.0,
            max_temp_offset: 150.0,
        }
    }
}

/// Rack layout and recirculation topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Number of racks.
    pub num_racks: usize,
    /// Servers in each rack.
    pub servers_per_rack: usize,
    /// Share of neighbour outlet heat that reaches a server's inlet, in [0, 1).
    pub recirculation: f64,
    /// Per-rack override of `recirculation` (one entry per rack).
    pub rack_recirculation: Option<Vec<f64>>,
    /// Furthest slot distance that still recirculates; anything past the rack
    /// width couples every slot.
    pub recirculation_radius: usize,
    /// Geometric weight decay per extra slot of distance, in (0, 1].
    pub recirculation_decay: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_racks: 1,
            servers_per_rack: 10,
            recirculation: 0.1,
            rack_recirculation: None,
            recirculation_radius: 2,
            recirculation_decay: 0.5,
        }
    }
}

impl TopologyConfig {
    /// Total number of servers
    #[must_use]
    pub fn num_servers(&self) -> usize {
        self.num_racks * self.servers_per_rack
    }

    /// Recirculation coefficient of one rack
    #[must_use]
    pub fn recirculation_for(&self, rack: usize) -> f64 {
        self.rack_recirculation
            .as_ref()
            .and_then(|per_rack| per_rack.get(rack).copied())
            .unwrap_or(self.recirculation)
    }
}

/// Cooling apparatus constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoolingConfig {
    /// Cooling modality.
    pub mode: CoolingMode,
    /// Fan power per rack at full speed, before curve losses (W).
    pub max_fan_power: f64,
    /// Fan speed below which slowing the fan saves nothing further.
    pub fan_deadband: f64,
    /// Static-pressure loss as a share of `max_fan_power` per unit speed.
    pub fan_static_fraction: f64,
    /// Fan speed with the lowest curve loss.
    pub fan_sweet_spot: f64,
    /// Curve loss per unit distance from the sweet spot.
    pub fan_efficiency_penalty: f64,
    /// Pump power per rack at full flow above base (W).
    pub max_pump_power: f64,
    /// Constant pump draw while circulating (W).
    pub base_pump_power: f64,
    /// Flow below which the pump idles at half base power.
    pub pump_min_flow: f64,
    /// Pump best efficiency point (flow fraction).
    pub pump_bep: f64,
    /// Curve loss per squared distance from the BEP.
    pub pump_efficiency_penalty: f64,
    /// Server-to-air conductance at full fan speed (W/K per server).
    pub air_conductance: f64,
    /// Server-to-coolant conductance at full pump flow (W/K per server).
    pub liquid_conductance: f64,
    /// Natural convection conductance, always present (W/K per server).
    pub passive_conductance: f64,
    /// Ambient temperature below which the economizer engages (°C).
    pub economizer_threshold: f64,
    /// Free heat absorption per kelvin of ambient margin (W/K per server).
    pub economizer_w_per_k: f64,
    /// Effectiveness lost per step.
    pub degradation_rate: f64,
    /// Floor of cooling effectiveness.
    pub min_effectiveness: f64,
}

impl Default for CoolingConfig {
    fn default() -> Self {
        Self {
            mode: CoolingMode::Air,
            max_fan_power: 500.0,
            fan_deadband: 0.05,
            fan_static_fraction: 0.05,
            fan_sweet_spot: 0.75,
            fan_efficiency_penalty: 0.15,
            max_pump_power: 50.0,
            base_pump_power: 10.0,
            pump_min_flow: 0.1,
            pump_bep: 0.65,
            pump_efficiency_penalty: 0.2,
            air_conductance: 40.0,
            liquid_conductance: 120.0,
            passive_conductance: 2.0,
            economizer_threshold: 18.0,
            economizer_w_per_k: 15.0,
            degradation_rate: 1.0e-5,
            min_effectiveness: 0.8,
        }
    }
}

impl CoolingConfig {
    /// Largest per-server conductance the configured mode can reach (W/K)
    #[must_use]
    pub fn max_conductance(&self) -> f64 {
        let active = match self.mode {
            CoolingMode::Air => self.air_conductance,
            CoolingMode::Liquid => self.liquid_conductance,
            CoolingMode::Hybrid => self.air_conductance + self.liquid_conductance,
        };
        self.passive_conductance + active
    }
}

/// Zone thresholds and reward weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Upper bound (inclusive) of the optimal zone (°C).
    pub optimal_max: f64,
    /// Upper bound (inclusive) of the good zone; also the safety gate (°C).
    pub good_max: f64,
    /// Lower bound (inclusive) of the critical zone (°C).
    pub critical_temp: f64,
    /// Hard safety ceiling; at or above it the episode terminates (°C).
    pub max_temp: f64,
    /// Reward for the optimal zone.
    pub optimal_bonus: f64,
    /// Reward for the good zone.
    pub good_bonus: f64,
    /// Quadratic penalty weight above `good_max`.
    pub caution_coefficient: f64,
    /// Fixed penalty in the critical zone.
    pub critical_penalty: f64,
    /// Fixed terminal penalty in the catastrophic zone.
    pub catastrophic_penalty: f64,
    /// Weight of the normalised total-power penalty.
    pub energy_coefficient: f64,
    /// Weight of the mean per-step aging accrual.
    pub health_coefficient: f64,
    /// Weight of the action-smoothness bonus.
    pub smoothness_coefficient: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            optimal_max: 45.0,
            good_max: 55.0,
            critical_temp: 60.0,
            max_temp: 65.0,
            optimal_bonus: 5.0,
            good_bonus: 2.0,
            caution_coefficient: 1.0,
            critical_penalty: 50.0,
            catastrophic_penalty: 1000.0,
            energy_coefficient: 10.0,
            health_coefficient: 100.0,
            smoothness_coefficient: 0.5,
        }
    }
}

/// How server temperatures are initialised at reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InitialState {
    /// Every server starts at ambient.
    Ambient,
    /// Each server starts at ambient plus a seeded uniform draw in `[0, spread]`.
    Randomized {
        /// Largest offset above ambient (K).
        spread: f64,
    },
}

impl Default for InitialState {
    fn default() -> Self {
        Self::Ambient
    }
}

/// Episode-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Steps before the episode is truncated.
    pub episode_length: u64,
    /// Number of past maximum temperatures included in the observation.
    pub history_len: usize,
    /// Initial temperature policy.
    pub initial_state: InitialState,
    /// Seeded per-episode ambient offset drawn from `[-jitter, +jitter]` (K).
    pub ambient_jitter: f64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            episode_length: 1000,
            history_len: 4,
            initial_state: InitialState::Ambient,
            ambient_jitter: 0.0,
        }
    }
}

/// Parameters of the built-in random-walk workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Lower bound of the initial utilization draw.
    pub min_initial_load: f64,
    /// Upper bound of the initial utilization draw.
    pub max_initial_load: f64,
    /// Standard deviation of the per-step Gaussian increment.
    pub load_std: f64,
    /// Largest absolute utilization change per step.
    pub max_load_change_per_step: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            min_initial_load: 0.6,
            max_initial_load: 0.9,
            load_std: 0.05,
            max_load_change_per_step: 0.05,
        }
    }
}

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Server physics.
    pub physics: PhysicsConfig,
    /// Rack topology.
    pub topology: TopologyConfig,
    /// Cooling apparatus.
    pub cooling: CoolingConfig,
    /// Reward shaping.
    pub reward: RewardConfig,
    /// Episode settings.
    pub episode: EpisodeConfig,
    /// Built-in workload generator.
    pub workload: WorkloadConfig,
}

impl SimConfig {
    /// Load a config from a `.toml` or `.json` file and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(SimError::config(format!(
                    "unsupported config extension {other:?} (expected .toml or .json)"
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Render the config as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SimError::Other(e.into()))
    }

    /// Width of the action vector
    #[must_use]
    pub fn action_dim(&self) -> usize {
        self.topology.num_racks * self.cooling.mode.channels()
    }

    /// Reject invalid or mutually contradictory settings.
    pub fn validate(&self) -> Result<()> {
        self.validate_physics()?;
        self.validate_topology()?;
        self.validate_cooling()?;
        self.validate_reward()?;
        self.validate_episode()?;
        self.validate_workload()
    }

    fn validate_physics(&self) -> Result<()> {
        let p = &self.physics;
        for (name, value) in [
            ("physics.ambient_temp", p.ambient_temp),
            ("physics.leakage_ref_temp", p.leakage_ref_temp),
            ("physics.aging_ref_temp", p.aging_ref_temp),
        ] {
            ensure_finite(name, value)?;
        }
        ensure_positive("physics.dt_s", p.dt_s)?;
        ensure_positive("physics.thermal_mass", p.thermal_mass)?;
        ensure_non_negative("physics.idle_power", p.idle_power)?;
        ensure_non_negative("physics.max_power", p.max_power)?;
        if p.idle_power > p.max_power {
            return Err(SimError::config(format!(
                "physics.idle_power ({}) exceeds physics.max_power ({})",
                p.idle_power, p.max_power
            )));
        }
        ensure_finite("physics.dynamic_exponent", p.dynamic_exponent)?;
        if p.dynamic_exponent <= 0.0 || p.dynamic_exponent >= 1.0 {
            return Err(SimError::config(
                "physics.dynamic_exponent must lie strictly between 0 and 1 \
                 for a convex power curve",
            ));
        }
        ensure_non_negative("physics.leakage_base_w", p.leakage_base_w)?;
        ensure_non_negative("physics.leakage_coeff", p.leakage_coeff)?;
        ensure_positive("physics.aging_doubling_c", p.aging_doubling_c)?;
        ensure_non_negative("physics.aging_rate", p.aging_rate)?;
        ensure_non_negative("physics.min_temp_offset", p.min_temp_offset)?;
        ensure_positive("physics.max_temp_offset", p.max_temp_offset)?;

        let hottest = p.ambient_temp + self.episode.ambient_jitter + p.max_temp_offset;
        let exponent = p.leakage_coeff * (hottest - p.leakage_ref_temp);
        if exponent > MAX_LEAKAGE_EXPONENT {
            return Err(SimError::config(format!(
                "leakage exponent reaches {exponent:.1} at the clamp ceiling \
                 (limit {MAX_LEAKAGE_EXPONENT})"
            )));
        }
        Ok(())
    }

    fn validate_topology(&self) -> Result<()> {
        let t = &self.topology;
        if t.num_racks == 0 || t.servers_per_rack == 0 {
            return Err(SimError::config(
                "topology needs at least one rack and one server per rack",
            ));
        }
        if let Some(per_rack) = &t.rack_recirculation {
            if per_rack.len() != t.num_racks {
                return Err(SimError::config(format!(
                    "topology.rack_recirculation has {} entries for {} racks",
                    per_rack.len(),
                    t.num_racks
                )));
            }
        }
        for rack in 0..t.num_racks {
            let c = t.recirculation_for(rack);
            ensure_finite("topology.recirculation", c)?;
            if !(0.0..1.0).contains(&c) {
                return Err(SimError::config(format!(
                    "recirculation of rack {rack} is {c}; must lie in [0, 1)"
                )));
            }
        }
        ensure_finite("topology.recirculation_decay", t.recirculation_decay)?;
        if t.recirculation_decay <= 0.0 || t.recirculation_decay > 1.0 {
            return Err(SimError::config("topology.recirculation_decay must lie in (0, 1]"));
        }
        Ok(())
    }

    fn validate_cooling(&self) -> Result<()> {
        let c = &self.cooling;
        for (name, value) in [
            ("cooling.max_fan_power", c.max_fan_power),
            ("cooling.fan_static_fraction", c.fan_static_fraction),
            ("cooling.fan_efficiency_penalty", c.fan_efficiency_penalty),
            ("cooling.max_pump_power", c.max_pump_power),
            ("cooling.base_pump_power", c.base_pump_power),
            ("cooling.pump_efficiency_penalty", c.pump_efficiency_penalty),
            ("cooling.air_conductance", c.air_conductance),
            ("cooling.liquid_conductance", c.liquid_conductance),
            ("cooling.passive_conductance", c.passive_conductance),
            ("cooling.economizer_w_per_k", c.economizer_w_per_k),
            ("cooling.degradation_rate", c.degradation_rate),
        ] {
            ensure_non_negative(name, value)?;
        }
        ensure_finite("cooling.economizer_threshold", c.economizer_threshold)?;
        for (name, value) in [
            ("cooling.fan_deadband", c.fan_deadband),
            ("cooling.pump_min_flow", c.pump_min_flow),
            ("cooling.fan_sweet_spot", c.fan_sweet_spot),
            ("cooling.pump_bep", c.pump_bep),
        ] {
            ensure_finite(name, value)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::config(format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        ensure_finite("cooling.min_effectiveness", c.min_effectiveness)?;
        if c.min_effectiveness <= 0.0 || c.min_effectiveness > 1.0 {
            return Err(SimError::config("cooling.min_effectiveness must lie in (0, 1]"));
        }

        let courant = c.max_conductance() * self.physics.dt_s / self.physics.thermal_mass;
        if courant >= 1.0 {
            return Err(SimError::config(format!(
                "explicit thermal update is unstable: \
                 conductance * dt / thermal_mass = {courant:.3} (must be < 1)"
            )));
        }
        Ok(())
    }

    fn validate_reward(&self) -> Result<()> {
        let r = &self.reward;
        for (name, value) in [
            ("reward.optimal_max", r.optimal_max),
            ("reward.good_max", r.good_max),
            ("reward.critical_temp", r.critical_temp),
            ("reward.max_temp", r.max_temp),
            ("reward.optimal_bonus", r.optimal_bonus),
            ("reward.good_bonus", r.good_bonus),
        ] {
            ensure_finite(name, value)?;
        }
        for (name, value) in [
            ("reward.caution_coefficient", r.caution_coefficient),
            ("reward.critical_penalty", r.critical_penalty),
            ("reward.catastrophic_penalty", r.catastrophic_penalty),
            ("reward.energy_coefficient", r.energy_coefficient),
            ("reward.health_coefficient", r.health_coefficient),
            ("reward.smoothness_coefficient", r.smoothness_coefficient),
        ] {
            ensure_non_negative(name, value)?;
        }
        if !(r.optimal_max < r.good_max
            && r.good_max < r.critical_temp
            && r.critical_temp < r.max_temp)
        {
            return Err(SimError::config(format!(
                "zone thresholds must increase strictly: \
                 optimal {} < good {} < critical {} < max {}",
                r.optimal_max, r.good_max, r.critical_temp, r.max_temp
            )));
        }
        let ceiling = self.physics.ambient_temp - self.episode.ambient_jitter
            + self.physics.max_temp_offset;
        if r.max_temp >= ceiling {
            return Err(SimError::config(format!(
                "reward.max_temp ({}) is unreachable below the physical clamp ({ceiling})",
                r.max_temp
            )));
        }
        if r.max_temp <= self.physics.ambient_temp + self.episode.ambient_jitter {
            return Err(SimError::config("reward.max_temp must lie above the ambient temperature"));
        }
        Ok(())
    }

    fn validate_episode(&self) -> Result<()> {
        let e = &self.episode;
        if e.episode_length == 0 {
            return Err(SimError::config("episode.episode_length must be at least 1"));
        }
        ensure_non_negative("episode.ambient_jitter", e.ambient_jitter)?;
        if let InitialState::Randomized { spread } = e.initial_state {
            ensure_non_negative("episode.initial_state.spread", spread)?;
            let warmest = self.physics.ambient_temp + e.ambient_jitter + spread;
            if warmest >= self.reward.max_temp {
                return Err(SimError::config(format!(
                    "initial temperatures can reach {warmest} which is already catastrophic"
                )));
            }
        }
        Ok(())
    }

    fn validate_workload(&self) -> Result<()> {
        let w = &self.workload;
        for (name, value) in [
            ("workload.min_initial_load", w.min_initial_load),
            ("workload.max_initial_load", w.max_initial_load),
        ] {
            ensure_finite(name, value)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(SimError::config(format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        if w.min_initial_load > w.max_initial_load {
            return Err(SimError::config(
                "workload.min_initial_load exceeds workload.max_initial_load",
            ));
        }
        ensure_non_negative("workload.load_std", w.load_std)?;
        ensure_non_negative("workload.max_load_change_per_step", w.max_load_change_per_step)
    }
}

fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::config(format!("{name} must be finite, got {value}")))
    }
}

fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value < 0.0 {
        return Err(SimError::config(format!("{name} must be non-negative, got {value}")));
    }
    Ok(())
}

fn ensure_positive(name: &str, value: f64) -> Result<()> {
    ensure_finite(name, value)?;
    if value <= 0.0 {
        return Err(SimError::config(format!("{name} must be positive, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_non_increasing_zones() {
        let mut config = SimConfig::default();
        config.reward.critical_temp = 55.0;
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_linear_or_concave_power_curve() {
        let mut config = SimConfig::default();
        config.physics.dynamic_exponent = 1.0;
        assert!(config.validate().is_err());
        config.physics.dynamic_exponent = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_idle_above_max_power() {
        let mut config = SimConfig::default();
        config.physics.idle_power = 900.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unstable_time_step() {
        let mut config = SimConfig::default();
        config.physics.thermal_mass = 30.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("unstable"), "{err}");
    }

    #[test]
    fn test_rejects_runaway_leakage_exponent() {
        let mut config = SimConfig::default();
        config.physics.leakage_coeff = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_recirculation_out_of_range() {
        let mut config = SimConfig::default();
        config.topology.recirculation = 1.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.topology.num_racks = 2;
        config.topology.rack_recirculation = Some(vec![0.1]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_catastrophic_initial_state() {
        let mut config = SimConfig::default();
        config.episode.initial_state = InitialState::Randomized { spread: 60.0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_nan_constants() {
        let mut config = SimConfig::default();
        config.cooling.air_conductance = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_action_dim_follows_mode() {
        let mut config = SimConfig::default();
        config.topology.num_racks = 3;
        assert_eq!(config.action_dim(), 3);
        config.cooling.mode = CoolingMode::Hybrid;
        assert_eq!(config.action_dim(), 6);
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let mut config = SimConfig::default();
        config.cooling.mode = CoolingMode::Liquid;
        config.episode.initial_state = InitialState::Randomized { spread: 3.0 };
        let text = config.to_toml_string().unwrap();
        let parsed: SimConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: SimConfig = toml::from_str(
            r#"
            [physics]
            ambient_temp = 16.0

            [cooling]
            mode = "hybrid"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.physics.ambient_temp, 16.0);
        assert_eq!(parsed.cooling.mode, CoolingMode::Hybrid);
        assert_eq!(parsed.reward, RewardConfig::default());
    }

    #[test]
    fn test_from_path_reads_json_and_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("sim.json");
        std::fs::write(&json, r#"{"episode": {"episode_length": 50}}"#).unwrap();
        let config = SimConfig::from_path(&json).unwrap();
        assert_eq!(config.episode.episode_length, 50);

        let yaml = dir.path().join("sim.yaml");
        std::fs::write(&yaml, "episode: {}").unwrap();
        assert!(matches!(SimConfig::from_path(&yaml), Err(SimError::InvalidConfig(_))));
    }
}
