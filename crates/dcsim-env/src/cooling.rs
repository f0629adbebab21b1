//! Cooling apparatus physics
//!
//! Converts per-rack setpoints into electrical power and per-server heat
//! removal. Fans follow a cubic law with a deadband and a sweet spot, the
//! liquid loop a quadratic pump curve around its best efficiency point.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::config::{CoolingConfig, CoolingMode};

/// Setpoints of one rack, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    /// Fan speed fraction
    pub fan: f64,
    /// Pump flow fraction
    pub pump: f64,
}

/// Cooling result for one rack and one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackCooling {
    /// Heat removed from each server, signed (W)
    pub heat_removed: Vec<f64>,
    /// Fan draw before economizer and degradation (W)
    pub fan_power: f64,
    /// Pump draw before economizer and degradation (W)
    pub pump_power: f64,
    /// Electrical power actually drawn (W)
    pub power: f64,
    /// Heat absorbed for free by the economizer (W)
    pub economizer_heat: f64,
}

/// Stateless power and conductance curves
#[derive(Debug, Clone, PartialEq)]
pub struct CoolingCurves {
    config: CoolingConfig,
}

impl CoolingCurves {
    /// Wrap a validated cooling config
    #[must_use]
    pub fn new(config: CoolingConfig) -> Self {
        Self { config }
    }

    /// Fan power at a speed fraction (W)
    #[must_use]
    pub fn fan_power(&self, speed: f64) -> f64 {
        let c = &self.config;
        // Inside the deadband the fan idles at its deadband-edge draw.
        let speed = speed.max(c.fan_deadband);
        let curve_loss = 1.0 + c.fan_efficiency_penalty * (speed - c.fan_sweet_spot).abs();
        c.max_fan_power * (speed.powi(3) + c.fan_static_fraction * speed) * curve_loss
    }

    /// Pump power at a flow fraction (W)
    #[must_use]
    pub fn pump_power(&self, flow: f64) -> f64 {
        let c = &self.config;
        if flow < c.pump_min_flow {
            return c.base_pump_power * 0.5;
        }
        let curve_loss = 1.0 + c.pump_efficiency_penalty * (flow - c.pump_bep).powi(2);
        c.base_pump_power + c.max_pump_power * flow.powi(2) * curve_loss
    }

    /// Active (setpoint-driven) conductance per server (W/K)
    #[must_use]
    pub fn active_conductance(&self, setpoints: Setpoints) -> f64 {
        let c = &self.config;
        match c.mode {
            CoolingMode::Air => c.air_conductance * setpoints.fan,
            CoolingMode::Liquid => c.liquid_conductance * setpoints.pump,
            CoolingMode::Hybrid => {
                c.air_conductance * setpoints.fan + c.liquid_conductance * setpoints.pump
            }
        }
    }

    /// Raw power of one rack's active equipment `(fan, pump)` (W)
    #[must_use]
    pub fn rack_power(&self, setpoints: Setpoints) -> (f64, f64) {
        match self.config.mode {
            CoolingMode::Air => (self.fan_power(setpoints.fan), 0.0),
            CoolingMode::Liquid => (0.0, self.pump_power(setpoints.pump)),
            CoolingMode::Hybrid => (self.fan_power(setpoints.fan), self.pump_power(setpoints.pump)),
        }
    }

    /// Rack power at full setpoints with fresh equipment (W)
    #[must_use]
    pub fn max_rack_power(&self) -> f64 {
        let (fan, pump) = self.rack_power(Setpoints { fan: 1.0, pump: 1.0 });
        fan + pump
    }
}

/// Facility cooling state for one episode
#[derive(Debug, Clone)]
pub struct CoolingSystem {
    curves: CoolingCurves,
    config: CoolingConfig,
    setpoints: Vec<Setpoints>,
    ambient: f64,
    steps: u64,
}

impl CoolingSystem {
    /// Create the cooling plant for `num_racks` racks
    #[must_use]
    pub fn new(config: CoolingConfig, num_racks: usize, ambient: f64) -> Self {
        Self {
            curves: CoolingCurves::new(config.clone()),
            config,
            setpoints: vec![Setpoints::default(); num_racks],
            ambient,
            steps: 0,
        }
    }

    /// Restore fresh equipment at a new ambient temperature
    pub fn reset(&mut self, ambient: f64) {
        self.ambient = ambient;
        self.steps = 0;
        self.setpoints.iter_mut().for_each(|s| *s = Setpoints::default());
    }

    /// Power and conductance curves
    #[must_use]
    pub fn curves(&self) -> &CoolingCurves {
        &self.curves
    }

    /// Cooling modality
    #[must_use]
    pub fn mode(&self) -> CoolingMode {
        self.config.mode
    }

    /// Current setpoints per rack
    #[must_use]
    pub fn setpoints(&self) -> &[Setpoints] {
        &self.setpoints
    }

    /// Ambient temperature (°C)
    #[must_use]
    pub fn ambient(&self) -> f64 {
        self.ambient
    }

    /// Whether free ambient cooling is available
    #[must_use]
    pub fn economizer_active(&self) -> bool {
        self.ambient < self.config.economizer_threshold
    }

    /// Free heat absorption per server (W)
    #[must_use]
    pub fn economizer_capacity_per_server(&self) -> f64 {
        if self.economizer_active() {
            self.config.economizer_w_per_k * (self.config.economizer_threshold - self.ambient)
        } else {
            0.0
        }
    }

    /// Remaining cooling effectiveness in `[min_effectiveness, 1]`
    #[must_use]
    pub fn effectiveness(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let lost = self.config.degradation_rate * self.steps as f64;
        (1.0 - lost).max(self.config.min_effectiveness)
    }

    /// Power multiplier from degradation, `>= 1` and non-decreasing
    #[must_use]
    pub fn degradation_factor(&self) -> f64 {
        1.0 / self.effectiveness()
    }

    /// Degradation mapped to [0, 1] (0 fresh, 1 at the effectiveness floor)
    #[must_use]
    pub fn degradation_level(&self) -> f64 {
        let span = 1.0 / self.config.min_effectiveness - 1.0;
        if span <= 0.0 {
            0.0
        } else {
            ((self.degradation_factor() - 1.0) / span).clamp(0.0, 1.0)
        }
    }

    /// Apply a clipped action and age the equipment by one step.
    ///
    /// The action carries one value per rack per channel: `fan` for air,
    /// `pump` for liquid, `fan, pump` for hybrid.
    pub fn apply(&mut self, action: &[f64]) {
        let mode = self.config.mode;
        let channels = mode.channels();
        for (setpoints, values) in self.setpoints.iter_mut().zip(action.chunks_exact(channels)) {
            *setpoints = match mode {
                CoolingMode::Air => Setpoints {
                    fan: values[0],
                    pump: 0.0,
                },
                CoolingMode::Liquid => Setpoints {
                    fan: 0.0,
                    pump: values[0],
                },
                CoolingMode::Hybrid => Setpoints {
                    fan: values[0],
                    pump: values[1],
                },
            };
        }
        self.steps += 1;
    }

    /// Cooling of one rack given its current temperatures and inlets.
    ///
    /// Evaluated on pre-step temperatures so the server update stays explicit.
    #[must_use]
    pub fn evaluate_rack(
        &self,
        rack: usize,
        temperatures: &Array1<f64>,
        inlets: &Array1<f64>,
    ) -> RackCooling {
        let setpoints = self.setpoints.get(rack).copied().unwrap_or_default();
        let active = self.curves.active_conductance(setpoints);
        let passive = self.config.passive_conductance;

        let mut active_load = 0.0;
        let heat_removed = temperatures
            .iter()
            .zip(inlets)
            .map(|(&t, &inlet)| {
                let gradient = t - inlet;
                active_load += (active * gradient).max(0.0);
                (passive + active) * gradient
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let capacity = self.economizer_capacity_per_server() * temperatures.len() as f64;
        let economizer_heat = capacity.min(active_load);
        let uncovered = if active_load > 0.0 {
            (active_load - economizer_heat) / active_load
        } else if self.economizer_active() {
            0.0
        } else {
            1.0
        };

        let (fan_power, pump_power) = self.curves.rack_power(setpoints);
        let power = (fan_power + pump_power) * self.degradation_factor() * uncovered;

        RackCooling {
            heat_removed,
            fan_power,
            pump_power,
            power,
            economizer_heat,
        }
    }
}
