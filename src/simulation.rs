//! Timelike geodesics in the equatorial plane of a Schwarzschild black hole,
//! integrated in proper time τ.
//!
//! State vector: `[t, r, φ, v_r]` with `v_r = dr/dτ`. The conserved energy
//! E and angular momentum L are fixed by the initial conditions and enter the
//! equations of motion as constants.

use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::integrator::{OdeSystem, Rk45, Stats, Status, Tolerances};
use crate::metrics::schwarzschild::Schwarzschild;

pub const STATE_DIM: usize = 4;

/// Integration stops once r falls to within this fraction of the horizon
/// radius, before f(r) reaches zero. The margin also has to keep the inner
/// stages of the final step outside r = 2M, or dt/dτ turns negative there.
const HORIZON_MARGIN: f64 = 1e-3;

/// E = sqrt(v_r0² + V_eff(r0, L)).
///
/// Fails when the radicand is negative, i.e. no real energy matches the
/// initial conditions.
pub fn derive_energy(
    metric: &Schwarzschild,
    r0: f64,
    vr0: f64,
    angular_momentum: f64,
) -> Result<f64> {
    let radicand = vr0 * vr0 + metric.effective_potential(r0, angular_momentum);
    if radicand.is_nan() || radicand < 0.0 {
        return Err(Error::NegativeEnergyRadicand { radicand });
    }
    Ok(radicand.sqrt())
}

/// Equations of motion for one particle with fixed E and L.
#[derive(Debug, Clone, Copy)]
pub struct GeodesicSystem {
    metric: Schwarzschild,
    angular_momentum: f64,
    energy: f64,
}

impl GeodesicSystem {
    /// Validates the initial conditions and derives the conserved energy.
    pub fn new(metric: Schwarzschild, r0: f64, vr0: f64, angular_momentum: f64) -> Result<Self> {
        let horizon = metric.horizon_radius();
        if r0.is_nan() || r0 <= horizon {
            return Err(Error::InsideHorizon { r0, horizon });
        }
        let energy = derive_energy(&metric, r0, vr0, angular_momentum)?;
        Ok(Self {
            metric,
            angular_momentum,
            energy,
        })
    }

    pub fn metric(&self) -> &Schwarzschild {
        &self.metric
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn angular_momentum(&self) -> f64 {
        self.angular_momentum
    }

    /// (dt/dτ, dr/dτ, dφ/dτ, dv_r/dτ) at `state`.
    pub fn state_derivative(&self, state: &[f64; STATE_DIM]) -> [f64; STATE_DIM] {
        let [_t, r, _phi, vr] = *state;
        let m = self.metric.mass;
        let l = self.angular_momentum;
        let r2 = r * r;

        [
            self.energy / self.metric.metric_function(r),
            vr,
            l / r2,
            -(l * l * (3.0 * m - r) + m * r2) / (r2 * r2),
        ]
    }

    /// v_r² + V_eff(r, L); equals E² along an exact trajectory.
    pub fn energy_squared_at(&self, state: &[f64; STATE_DIM]) -> f64 {
        let [_t, r, _phi, vr] = *state;
        vr * vr + self.metric.effective_potential(r, self.angular_momentum)
    }

    fn capture_radius(&self) -> f64 {
        self.metric.horizon_radius() * (1.0 + HORIZON_MARGIN)
    }
}

impl OdeSystem<STATE_DIM> for GeodesicSystem {
    fn rhs(&self, _tau: f64, y: &[f64; STATE_DIM], dydt: &mut [f64; STATE_DIM]) {
        *dydt = self.state_derivative(y);
    }

    fn should_terminate(&self, _tau: f64, y: &[f64; STATE_DIM]) -> bool {
        y[1] <= self.capture_radius()
    }
}

/// Integrator output for one orbit.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub system: GeodesicSystem,
    pub tau: Vec<f64>,
    pub states: Vec<[f64; STATE_DIM]>,
    pub status: Status,
    pub stats: Stats,
}

impl Trajectory {
    pub fn radii(&self) -> Vec<f64> {
        self.states.iter().map(|s| s[1]).collect()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.states.iter().map(|s| s[2]).collect()
    }

    /// Whether the particle reached the horizon before the end of the span.
    pub fn plunged(&self) -> bool {
        self.status == Status::Terminated
    }

    /// Cartesian samples (x, y) of the path in the orbital plane.
    pub fn cartesian(&self) -> (Vec<f64>, Vec<f64>) {
        to_cartesian(&self.radii(), &self.angles())
    }

    pub fn summary(&self) -> OrbitSummary {
        let e2 = self.system.energy * self.system.energy;
        let mut periapsis = f64::INFINITY;
        let mut apoapsis = f64::NEG_INFINITY;
        let mut max_energy_drift: f64 = 0.0;

        for state in &self.states {
            periapsis = periapsis.min(state[1]);
            apoapsis = apoapsis.max(state[1]);
            let drift = (self.system.energy_squared_at(state) - e2).abs() / e2;
            max_energy_drift = max_energy_drift.max(drift);
        }

        OrbitSummary {
            samples: self.tau.len(),
            periapsis,
            apoapsis,
            max_energy_drift,
            final_tau: self.tau.last().copied().unwrap_or(0.0),
            final_coordinate_time: self.states.last().map_or(0.0, |s| s[0]),
            plunged: self.plunged(),
        }
    }
}

/// Diagnostics of a finished run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSummary {
    pub samples: usize,
    /// Smallest sampled r
    pub periapsis: f64,
    /// Largest sampled r
    pub apoapsis: f64,
    /// max |v_r² + V_eff - E²| / E² over all samples
    pub max_energy_drift: f64,
    pub final_tau: f64,
    pub final_coordinate_time: f64,
    pub plunged: bool,
}

/// Elementwise x = r cos φ, y = r sin φ.
pub fn to_cartesian(r: &[f64], phi: &[f64]) -> (Vec<f64>, Vec<f64>) {
    r.iter()
        .zip(phi)
        .map(|(&r, &phi)| {
            let (sin, cos) = phi.sin_cos();
            (r * cos, r * sin)
        })
        .unzip()
}

/// Integrates the geodesic for `config` over τ ∈ [0, tau_max].
///
/// A solver failure is returned as an error. Reaching the horizon is not an
/// error; the returned trajectory then ends there and [`Trajectory::plunged`]
/// is set.
pub fn simulate(config: &SimulationConfig) -> Result<Trajectory> {
    config.validate()?;

    let metric = Schwarzschild::new(config.mass);
    let system = GeodesicSystem::new(metric, config.r0, config.vr0, config.angular_momentum)?;

    log::debug!(
        "horizon r = {}, photon sphere r = {}, ISCO r = {}",
        metric.horizon_radius(),
        metric.photon_sphere_radius(),
        metric.isco_radius()
    );
    log::info!(
        "M = {}, r0 = {}, vr0 = {}, L = {}, E = {:.9}",
        config.mass,
        config.r0,
        config.vr0,
        config.angular_momentum,
        system.energy()
    );

    let solver = Rk45::new(
        Tolerances {
            rtol: config.rtol,
            atol: config.atol,
        },
        config.max_step,
    );
    let y0 = [0.0, config.r0, 0.0, config.vr0];
    let solution = solver.integrate(&system, 0.0, y0, config.tau_max);

    if let Status::Failed(message) = &solution.status {
        return Err(Error::IntegrationFailed {
            tau: solution.t.last().copied().unwrap_or(0.0),
            message: message.clone(),
        });
    }

    let trajectory = Trajectory {
        system,
        tau: solution.t,
        states: solution.y,
        status: solution.status,
        stats: solution.stats,
    };

    let summary = trajectory.summary();
    log::info!(
        "{} samples, r in [{:.4}, {:.4}], coordinate time {:.3} at tau {:.3}",
        summary.samples,
        summary.periapsis,
        summary.apoapsis,
        summary.final_coordinate_time,
        summary.final_tau
    );
    if summary.plunged {
        log::warn!(
            "particle reached the event horizon at tau = {:.6}; trajectory ends there",
            summary.final_tau
        );
    }
    if summary.max_energy_drift > config.rtol {
        log::warn!(
            "relative energy drift {:.3e} exceeds rtol {:.1e}",
            summary.max_energy_drift,
            config.rtol
        );
    }

    Ok(trajectory)
}
