/// Parameters for the Schwarzschild metric in geometrized units (G = c = 1).
///
/// ds² = -f(r)dt² + f(r)⁻¹dr² + r²(dθ² + sin²θ dφ²),  f(r) = 1 - 2M/r
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schwarzschild {
    /// Black hole mass M
    pub mass: f64,
}

impl Default for Schwarzschild {
    fn default() -> Self {
        Self { mass: 1.0 }
    }
}

impl Schwarzschild {
    pub fn new(mass: f64) -> Self {
        Self { mass }
    }

    /// Metric function f(r) = 1 - 2M/r. Vanishes at the horizon.
    pub fn metric_function(&self, r: f64) -> f64 {
        1.0 - 2.0 * self.mass / r
    }

    /// Effective potential for massive particles: V(r) = f(r)(1 + L²/r²)
    pub fn effective_potential(&self, r: f64, angular_momentum: f64) -> f64 {
        let l = angular_momentum;
        self.metric_function(r) * (1.0 + l * l / (r * r))
    }

    /// Event horizon radius: r = 2M
    pub fn horizon_radius(&self) -> f64 {
        2.0 * self.mass
    }

    /// Photon sphere radius: r = 3M
    pub fn photon_sphere_radius(&self) -> f64 {
        3.0 * self.mass
    }

    /// Innermost stable circular orbit: r = 6M
    pub fn isco_radius(&self) -> f64 {
        6.0 * self.mass
    }

    /// Angular momentum of the circular orbit at radius r: L² = M r² / (r - 3M).
    ///
    /// Circular timelike orbits only exist outside the photon sphere, so this
    /// returns `None` for r <= 3M.
    pub fn circular_orbit_angular_momentum(&self, r: f64) -> Option<f64> {
        let denom = r - self.photon_sphere_radius();
        if denom <= 0.0 {
            return None;
        }
        Some((self.mass * r * r / denom).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_function_between_zero_and_one_outside_horizon() {
        let bh = Schwarzschild::new(1.0);
        let mut prev = 0.0;
        let mut r = bh.horizon_radius() + 1e-3;
        while r < 1000.0 {
            let f = bh.metric_function(r);
            assert!(f > 0.0 && f < 1.0, "f({r}) = {f}");
            assert!(f > prev, "f not increasing at r = {r}");
            prev = f;
            r *= 1.05;
        }
    }

    #[test]
    fn metric_function_vanishes_at_horizon() {
        let bh = Schwarzschild::new(2.5);
        assert!(bh.metric_function(bh.horizon_radius()).abs() < 1e-15);
    }

    #[test]
    fn circular_orbit_is_stationary_point_of_potential() {
        let bh = Schwarzschild::new(1.0);
        let r = 12.0;
        let l = bh.circular_orbit_angular_momentum(r).unwrap();
        assert!((l - 4.0).abs() < 1e-12);

        let h = 1e-5;
        let dv = (bh.effective_potential(r + h, l) - bh.effective_potential(r - h, l)) / (2.0 * h);
        assert!(dv.abs() < 1e-9, "dV/dr = {dv}");
    }

    #[test]
    fn no_circular_orbit_inside_photon_sphere() {
        let bh = Schwarzschild::new(1.0);
        assert!(bh.circular_orbit_angular_momentum(3.0).is_none());
        assert!(bh.circular_orbit_angular_momentum(2.5).is_none());
    }
}
