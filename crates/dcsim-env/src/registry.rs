//! Named configuration presets

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use dcsim_core::{Result, SimError};

use crate::config::{CoolingMode, SimConfig};
use crate::env::DataCenterEnv;

lazy_static::lazy_static! {
    static ref REGISTRY: RwLock<PresetRegistry> = RwLock::new(PresetRegistry::with_builtins());
}

/// Registry of named simulator configurations
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: BTreeMap<String, SimConfig>,
}

impl PresetRegistry {
    /// Registry holding only the built-in presets
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut presets = BTreeMap::new();
        for (name, config) in builtin_presets() {
            presets.insert(name.to_string(), config);
        }
        Self { presets }
    }

    /// Register or replace a preset after validating it
    pub fn register(&mut self, name: impl Into<String>, config: SimConfig) -> Result<()> {
        config.validate()?;
        self.presets.insert(name.into(), config);
        Ok(())
    }

    /// Look up a preset by name
    pub fn get(&self, name: &str) -> Result<SimConfig> {
        self.presets
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::UnknownPreset(name.to_string()))
    }

    /// Preset names in sorted order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }
}

fn builtin_presets() -> Vec<(&'static str, SimConfig)> {
    let default = SimConfig::default();

    // Leans on energy savings and tolerates warmer operation.
    let mut aggressive = default.clone();
    aggressive.reward.energy_coefficient = 20.0;
    aggressive.reward.caution_coefficient = 0.5;

    // Weighs thermal margin over savings.
    let mut conservative = default.clone();
    conservative.reward.energy_coefficient = 5.0;
    conservative.reward.caution_coefficient = 1.5;
    conservative.reward.critical_penalty = 75.0;

    let mut production = default.clone();
    production.physics.ambient_temp = 24.0;
    production.physics.idle_power = 250.0;
    production.reward.energy_coefficient = 15.0;
    production.episode.ambient_jitter = 1.0;
    production.episode.initial_state = crate::config::InitialState::Randomized { spread: 5.0 };

    let mut single_server = default.clone();
    single_server.topology.num_racks = 1;
    single_server.topology.servers_per_rack = 1;
    single_server.topology.recirculation = 0.0;
    single_server.physics.idle_power = 50.0;
    single_server.physics.max_power = 800.0;

    let mut liquid = default.clone();
    liquid.cooling.mode = CoolingMode::Liquid;

    let mut hybrid = default.clone();
    hybrid.cooling.mode = CoolingMode::Hybrid;

    vec![
        ("default", default),
        ("aggressive", aggressive),
        ("conservative", conservative),
        ("production", production),
        ("single-server", single_server),
        ("liquid", liquid),
        ("hybrid", hybrid),
    ]
}

fn poisoned<T>(_: PoisonError<T>) -> SimError {
    SimError::Other(anyhow::anyhow!("preset registry lock poisoned"))
}

/// Register a preset globally
pub fn register_preset(name: impl Into<String>, config: SimConfig) -> Result<()> {
    REGISTRY.write().map_err(poisoned)?.register(name, config)
}

/// Fetch a preset's configuration
pub fn preset(name: &str) -> Result<SimConfig> {
    REGISTRY.read().map_err(poisoned)?.get(name)
}

/// List all registered presets
pub fn list_presets() -> Result<Vec<String>> {
    Ok(REGISTRY.read().map_err(poisoned)?.names())
}

/// Build an environment from a named preset
pub fn make_env(name: &str) -> Result<DataCenterEnv> {
    DataCenterEnv::new(preset(name)?)
}
