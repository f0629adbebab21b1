//! Per-server power and thermal model
//!
//! Each step is evaluated in two phases. [`ServerThermalModel::evaluate`] is
//! a pure function of the current [`Server`] state and the step inputs; the
//! returned [`ServerUpdate`] is only committed once every server in the room
//! produced finite values.

use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;

/// Live state of one compute node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Temperature (°C)
    pub temperature: f64,
    /// Utilization in [0, 1]
    pub utilization: f64,
    /// IT power drawn during the last step (W)
    pub it_power: f64,
    /// Leakage power during the last step (W)
    pub leakage_power: f64,
    /// Cumulative aging, monotonically non-decreasing
    pub aging: f64,
    /// Aging accrued during the last step
    pub last_aging_accrual: f64,
}

impl Server {
    /// Fresh server at the given temperature
    #[must_use]
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            utilization: 0.0,
            it_power: 0.0,
            leakage_power: 0.0,
            aging: 0.0,
            last_aging_accrual: 0.0,
        }
    }

    /// Health in (0, 1]; 1 means no accumulated wear
    #[must_use]
    pub fn health(&self) -> f64 {
        1.0 / (1.0 + self.aging)
    }

    /// Total electrical power (IT + leakage) during the last step
    #[must_use]
    pub fn total_power(&self) -> f64 {
        self.it_power + self.leakage_power
    }

    /// Apply an evaluated update.
    ///
    /// Callers must check [`ServerUpdate::is_finite`] first.
    pub fn commit(&mut self, update: &ServerUpdate) {
        self.temperature = update.temperature;
        self.utilization = update.utilization;
        self.it_power = update.it_power;
        self.leakage_power = update.leakage_power;
        self.aging += update.aging_accrual;
        self.last_aging_accrual = update.aging_accrual;
    }
}

/// Outcome of evaluating one server for one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerUpdate {
    /// Utilization used for the step
    pub utilization: f64,
    /// IT power (W)
    pub it_power: f64,
    /// Leakage power at the pre-step temperature (W)
    pub leakage_power: f64,
    /// Heat generated, IT plus leakage (W)
    pub heat_generated: f64,
    /// Heat removed by cooling (W)
    pub heat_removed: f64,
    /// Temperature before the step (°C)
    pub previous_temperature: f64,
    /// Temperature before clamping (°C)
    pub unclamped_temperature: f64,
    /// Committed temperature (°C)
    pub temperature: f64,
    /// Whether the physical clamp moved the temperature
    pub clamped: bool,
    /// Aging accrued this step
    pub aging_accrual: f64,
}

impl ServerUpdate {
    /// Whether every computed quantity is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.utilization,
            self.it_power,
            self.leakage_power,
            self.heat_generated,
            self.heat_removed,
            self.unclamped_temperature,
            self.aging_accrual,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// Heat retained in thermal mass over the step (J)
    #[must_use]
    pub fn heat_retained_j(&self, thermal_mass: f64) -> f64 {
        thermal_mass * (self.temperature - self.previous_temperature)
    }
}

/// Closed-form server physics for one ambient condition
#[derive(Debug, Clone, PartialEq)]
pub struct ServerThermalModel {
    physics: PhysicsConfig,
    ambient: f64,
}

impl ServerThermalModel {
    /// Create a model for the episode's ambient temperature
    #[must_use]
    pub fn new(physics: PhysicsConfig, ambient: f64) -> Self {
        Self { physics, ambient }
    }

    /// Ambient temperature the clamp range is anchored to
    #[must_use]
    pub fn ambient(&self) -> f64 {
        self.ambient
    }

    /// Thermal mass (J/K)
    #[must_use]
    pub fn thermal_mass(&self) -> f64 {
        self.physics.thermal_mass
    }

    /// Step length (s)
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.physics.dt_s
    }

    /// Physically plausible temperature range `(low, high)`
    #[must_use]
    pub fn temperature_bounds(&self) -> (f64, f64) {
        (
            self.ambient - self.physics.min_temp_offset,
            self.ambient + self.physics.max_temp_offset,
        )
    }

    /// Convex dynamic power curve `2u - u^r`, clamped to [0, 1].
    ///
    /// Slope is `2 - r·u^(r-1)`, which grows with `u`: the last points of
    /// utilization cost the most power.
    #[must_use]
    pub fn dynamic_fraction(&self, utilization: f64) -> f64 {
        let u = utilization.clamp(0.0, 1.0);
        (2.0 * u - u.powf(self.physics.dynamic_exponent)).clamp(0.0, 1.0)
    }

    /// IT power at a utilization (W)
    #[must_use]
    pub fn it_power(&self, utilization: f64) -> f64 {
        let p = &self.physics;
        p.idle_power + (p.max_power - p.idle_power) * self.dynamic_fraction(utilization)
    }

    /// Temperature-dependent leakage power (W)
    #[must_use]
    pub fn leakage_power(&self, temperature: f64) -> f64 {
        let p = &self.physics;
        p.leakage_base_w * (p.leakage_coeff * (temperature - p.leakage_ref_temp)).exp()
    }

    /// Wear accrued over one step at a temperature.
    ///
    /// Zero at or below the aging reference, doubling every
    /// `aging_doubling_c` kelvin above it.
    #[must_use]
    pub fn aging_accrual(&self, temperature: f64) -> f64 {
        let p = &self.physics;
        let acceleration = ((temperature - p.aging_ref_temp) / p.aging_doubling_c).exp2() - 1.0;
        p.aging_rate * p.dt_s * acceleration.max(0.0)
    }

    /// Evaluate one explicit step without mutating the server.
    ///
    /// Leakage and aging use the pre-step temperature, so the
    /// leakage/temperature feedback is resolved by a single evaluation.
    #[must_use]
    pub fn evaluate(&self, server: &Server, utilization: f64, heat_removed: f64) -> ServerUpdate {
        let p = &self.physics;
        // NaN survives the clamp and is reported through `is_finite`.
        let utilization = utilization.clamp(0.0, 1.0);

        let it_power = self.it_power(utilization);
        let leakage_power = self.leakage_power(server.temperature);
        let heat_generated = it_power + leakage_power;

        let delta = (heat_generated - heat_removed) * p.dt_s / p.thermal_mass;
        let unclamped_temperature = server.temperature + delta;
        let (low, high) = self.temperature_bounds();
        let temperature = unclamped_temperature.clamp(low, high);

        ServerUpdate {
            utilization,
            it_power,
            leakage_power,
            heat_generated,
            heat_removed,
            previous_temperature: server.temperature,
            unclamped_temperature,
            temperature,
            clamped: temperature != unclamped_temperature,
            aging_accrual: self.aging_accrual(server.temperature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> ServerThermalModel {
        ServerThermalModel::new(PhysicsConfig::default(), 22.0)
    }

    #[test]
    fn test_power_curve_endpoints() {
        let m = model();
        assert_relative_eq!(m.it_power(0.0), 200.0);
        assert_relative_eq!(m.it_power(1.0), 800.0);
    }

    #[test]
    fn test_power_curve_is_convex() {
        let m = model();
        let mut previous_slope = f64::NEG_INFINITY;
        for i in 1..100 {
            let u = f64::from(i) / 100.0;
            let slope = m.it_power(u + 0.01) - m.it_power(u);
            assert!(slope >= previous_slope - 1e-9, "slope decreased at u={u}");
            previous_slope = slope;
        }
    }

    #[test]
    fn test_leakage_grows_with_temperature() {
        let m = model();
        assert_relative_eq!(m.leakage_power(45.0), 10.0);
        assert!(m.leakage_power(70.0) > m.leakage_power(45.0));
    }

    #[test]
    fn test_aging_is_zero_below_reference_and_accelerates() {
        let m = model();
        assert_eq!(m.aging_accrual(40.0), 0.0);
        let one = m.aging_accrual(55.0);
        let two = m.aging_accrual(65.0);
        assert_relative_eq!(one, 1.0 / 3600.0);
        assert_relative_eq!(two, 3.0 / 3600.0);
    }

    #[test]
    fn test_evaluate_conserves_energy() {
        let m = model();
        let server = Server::new(30.0);
        let update = m.evaluate(&server, 0.5, 150.0);
        assert!(!update.clamped);
        let generated = update.heat_generated * m.dt();
        let removed = update.heat_removed * m.dt();
        assert_relative_eq!(
            generated,
            update.heat_retained_j(m.thermal_mass()) + removed,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_evaluate_clamps_to_physical_range() {
        let m = model();
        let server = Server::new(171.9);
        let update = m.evaluate(&server, 1.0, 0.0);
        assert!(update.clamped);
        assert_relative_eq!(update.temperature, 172.0);
    }

    #[test]
    fn test_evaluate_does_not_mutate_and_commit_applies() {
        let m = model();
        let mut server = Server::new(50.0);
        let update = m.evaluate(&server, 0.8, 100.0);
        assert_relative_eq!(server.temperature, 50.0);
        server.commit(&update);
        assert_relative_eq!(server.temperature, update.temperature);
        assert_relative_eq!(server.aging, update.aging_accrual);
        assert!(server.health() < 1.0);
    }

    #[test]
    fn test_nan_utilization_is_not_finite() {
        let m = model();
        let update = m.evaluate(&Server::new(30.0), f64::NAN, 0.0);
        assert!(!update.is_finite());
    }
}
