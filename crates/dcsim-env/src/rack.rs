//! Rack aggregation and heat recirculation
//!
//! Servers are stored in an arena (`Vec<Server>`) and coupled through a dense
//! recirculation matrix over their slot indices. A server's effective inlet is
//! the supply temperature plus a weighted share of its neighbours' excess
//! temperature:
//!
//! ```text
//! inlet_i = supply + Σ_j R[i, j] · (T_j − supply)
//! ```

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::server::{Server, ServerThermalModel, ServerUpdate};

/// Neighbour coupling matrix of one rack
#[derive(Debug, Clone, PartialEq)]
pub struct RecirculationMatrix {
    weights: Array2<f64>,
}

impl RecirculationMatrix {
    /// Build the coupling for `n` slots.
    ///
    /// Neighbours within `radius` slots get weight `decay^(distance - 1)`;
    /// every row with at least one neighbour is scaled to sum to
    /// `coefficient`, so edge slots see the same total recirculation.
    #[must_use]
    pub fn new(n: usize, coefficient: f64, radius: usize, decay: f64) -> Self {
        let mut weights = Array2::<f64>::zeros((n, n));
        // Anything wider than the rack couples every slot.
        let radius = radius.min(n.saturating_sub(1));
        if coefficient > 0.0 && radius > 0 {
            for i in 0..n {
                let lo = i.saturating_sub(radius);
                let hi = i.saturating_add(radius).min(n - 1);
                for j in lo..=hi {
                    if j != i {
                        let distance = i.abs_diff(j);
                        weights[[i, j]] =
                            i32::try_from(distance - 1).map_or(0.0, |e| decay.powi(e));
                    }
                }
                let row_sum = weights.row(i).sum();
                if row_sum > 0.0 {
                    weights.row_mut(i).mapv_inplace(|w| w * coefficient / row_sum);
                }
            }
        }
        Self { weights }
    }

    /// Raw weights
    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Effective inlet temperature of every slot
    #[must_use]
    pub fn inlets(&self, supply: f64, temperatures: &Array1<f64>) -> Array1<f64> {
        let excess = temperatures.mapv(|t| t - supply);
        self.weights.dot(&excess) + supply
    }
}

/// Evaluated rack step, committed only when finite
#[derive(Debug, Clone, PartialEq)]
pub struct RackUpdate {
    /// Per-server updates in slot order
    pub servers: Vec<ServerUpdate>,
}

impl RackUpdate {
    /// Whether every server produced finite values
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.servers.iter().all(ServerUpdate::is_finite)
    }

    /// Rack heat load: sum of server heat generated (W)
    #[must_use]
    pub fn heat_load(&self) -> f64 {
        self.servers.iter().map(|s| s.heat_generated).sum()
    }

    /// Sum of heat removed by cooling (W)
    #[must_use]
    pub fn heat_removed(&self) -> f64 {
        self.servers.iter().map(|s| s.heat_removed).sum()
    }

    /// Energy balance error over the step (J).
    ///
    /// Generated minus retained minus removed. Zero up to rounding unless a
    /// server hit the physical clamp.
    #[must_use]
    pub fn energy_residual_j(&self, thermal_mass: f64, dt: f64) -> f64 {
        self.servers
            .iter()
            .map(|s| (s.heat_generated - s.heat_removed) * dt - s.heat_retained_j(thermal_mass))
            .sum()
    }

    /// Whether any server was held by the physical clamp
    #[must_use]
    pub fn any_clamped(&self) -> bool {
        self.servers.iter().any(|s| s.clamped)
    }
}

/// Ordered collection of servers sharing one supply stream
#[derive(Debug, Clone)]
pub struct Rack {
    servers: Vec<Server>,
    recirculation: RecirculationMatrix,
    heat_load: f64,
}

impl Rack {
    /// Create a rack from its servers and coupling
    #[must_use]
    pub fn new(servers: Vec<Server>, recirculation: RecirculationMatrix) -> Self {
        Self {
            servers,
            recirculation,
            heat_load: 0.0,
        }
    }

    /// Replace every server with a fresh one at the given temperature
    pub fn reset_servers(&mut self, temperatures: &[f64]) {
        self.servers = temperatures.iter().map(|&t| Server::new(t)).collect();
        self.heat_load = 0.0;
    }

    /// Mutable access for initial conditions set at reset
    pub fn servers_mut(&mut self) -> &mut [Server] {
        &mut self.servers
    }

    /// Servers in slot order
    #[must_use]
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// Number of servers
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether the rack holds no servers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Heat load committed by the last step (W)
    #[must_use]
    pub fn heat_load(&self) -> f64 {
        self.heat_load
    }

    /// Current temperatures as a vector
    #[must_use]
    pub fn temperatures(&self) -> Array1<f64> {
        self.servers.iter().map(|s| s.temperature).collect()
    }

    /// Hottest server temperature
    #[must_use]
    pub fn max_temperature(&self) -> f64 {
        self.servers
            .iter()
            .map(|s| s.temperature)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Effective inlet temperatures for the current state
    #[must_use]
    pub fn inlet_temperatures(&self, supply: f64) -> Array1<f64> {
        self.recirculation.inlets(supply, &self.temperatures())
    }

    /// Evaluate all servers without mutating the rack.
    ///
    /// `utilizations` and `heat_removed` are indexed by slot.
    #[must_use]
    pub fn evaluate(
        &self,
        model: &ServerThermalModel,
        utilizations: &[f64],
        heat_removed: &[f64],
    ) -> RackUpdate {
        let servers = self
            .servers
            .iter()
            .zip(utilizations)
            .zip(heat_removed)
            .map(|((server, &u), &q)| model.evaluate(server, u, q))
            .collect();
        RackUpdate { servers }
    }

    /// Apply a finite update
    pub fn commit(&mut self, update: &RackUpdate) {
        for (server, server_update) in self.servers.iter_mut().zip(&update.servers) {
            server.commit(server_update);
        }
        self.heat_load = update.heat_load();
    }
}

/// Per-rack figures reported in step diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RackReport {
    /// Heat generated by all servers (W)
    pub heat_load: f64,
    /// Heat removed by cooling (W)
    pub heat_removed: f64,
    /// Hottest server (°C)
    pub max_temperature: f64,
    /// Energy balance error (J)
    pub energy_residual_j: f64,
}
