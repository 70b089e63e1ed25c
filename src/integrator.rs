//! Explicit Runge-Kutta 5(4) integrator (Dormand-Prince) with adaptive step
//! control and an upper step-size bound.
//!
//! Error is controlled per component against `atol + rtol * |y|` using the RMS
//! norm, and the fifth-order solution is propagated (local extrapolation).
//! Only the accepted step points are returned; there is no dense output.

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side into `dydt`.
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);

    /// Terminal condition. When an accepted step ends where this holds, the
    /// step is cut back to the first point where it switches on and the
    /// integration stops with [`Status::Terminated`].
    fn should_terminate(&self, _t: f64, _y: &[f64; N]) -> bool {
        false
    }
}

const STAGES: usize = 6;

const C: [f64; STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [[f64; 5]; STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];

const B: [f64; STAGES] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];

/// Difference between the 5th and embedded 4th order weights, including the
/// FSAL stage evaluated at the new point.
const E: [f64; STAGES + 1] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

/// Order of the embedded error estimator.
const ERROR_ESTIMATOR_ORDER: f64 = 4.0;
const ERROR_EXPONENT: f64 = -1.0 / (ERROR_ESTIMATOR_ORDER + 1.0);

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Bisections of the final step when locating a terminal event.
const EVENT_BISECTIONS: usize = 64;

/// Error tolerances: a component is accepted when
/// `|err| <= atol + rtol * max(|y_old|, |y_new|)` on RMS average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
        }
    }
}

/// Solver counters, reported after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// The end of the span was reached.
    Finished,
    /// [`OdeSystem::should_terminate`] fired; the last sample sits on the event.
    Terminated,
    /// The solver gave up; the samples up to the failure are kept.
    Failed(String),
}

/// Accepted sample points of one integration run.
#[derive(Debug, Clone)]
pub struct Solution<const N: usize> {
    pub t: Vec<f64>,
    pub y: Vec<[f64; N]>,
    pub status: Status,
    pub stats: Stats,
}

/// Dormand-Prince RK45 solver.
#[derive(Debug, Clone)]
pub struct Rk45 {
    tol: Tolerances,
    /// Upper bound on |h|.
    pub max_step: f64,
}

impl Rk45 {
    pub fn new(tol: Tolerances, max_step: f64) -> Self {
        Self { tol, max_step }
    }

    /// Integrate `sys` from `t0` to `t_end` starting at `y0`.
    ///
    /// The returned solution always starts with `(t0, y0)`. Integration
    /// backwards in time (`t_end < t0`) is supported.
    pub fn integrate<S, const N: usize>(
        &self,
        sys: &S,
        t0: f64,
        y0: [f64; N],
        t_end: f64,
    ) -> Solution<N>
    where
        S: OdeSystem<N>,
    {
        let mut stats = Stats::default();
        let mut ts = vec![t0];
        let mut ys = vec![y0];

        if t0 == t_end {
            return Solution {
                t: ts,
                y: ys,
                status: Status::Finished,
                stats,
            };
        }

        let direction = (t_end - t0).signum();
        let mut t = t0;
        let mut y = y0;
        let mut f = [0.0; N];
        sys.rhs(t, &y, &mut f);
        stats.fn_evals += 1;

        let mut h_abs = self.initial_step(sys, t0, &y0, &f, t_end, &mut stats);

        let status = loop {
            let min_step = 10.0 * (next_toward(t, direction) - t).abs();
            if h_abs > self.max_step {
                h_abs = self.max_step;
            } else if h_abs < min_step {
                h_abs = min_step;
            }

            let mut step_rejected = false;
            let accepted = loop {
                if h_abs < min_step {
                    break None;
                }

                let mut t_new = t + direction * h_abs;
                if direction * (t_new - t_end) > 0.0 {
                    t_new = t_end;
                }
                let h = t_new - t;
                h_abs = h.abs();

                let (y_new, f_new, error_norm) = self.step(sys, t, &y, &f, h, &mut stats);

                if error_norm < 1.0 {
                    let factor = if error_norm == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * error_norm.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
                    };
                    let factor = if step_rejected { factor.min(1.0) } else { factor };
                    h_abs *= factor;
                    stats.accepted_steps += 1;
                    break Some((t_new, y_new, f_new));
                }

                // NaN error norms land here too and shrink the step until the
                // spacing limit is hit.
                let factor = if error_norm.is_nan() {
                    MIN_FACTOR
                } else {
                    (SAFETY * error_norm.powf(ERROR_EXPONENT)).max(MIN_FACTOR)
                };
                h_abs *= factor;
                step_rejected = true;
                stats.rejected_steps += 1;
            };

            let Some((t_new, y_new, f_new)) = accepted else {
                break Status::Failed(
                    "required step size is less than spacing between numbers".to_string(),
                );
            };

            if y_new.iter().any(|v| !v.is_finite()) {
                break Status::Failed(format!("non-finite state at t = {t_new}"));
            }

            if sys.should_terminate(t_new, &y_new) {
                let (t_event, y_event) =
                    self.locate_event(sys, t, &y, &f, (t_new, y_new), &mut stats);
                ts.push(t_event);
                ys.push(y_event);
                break Status::Terminated;
            }

            t = t_new;
            y = y_new;
            f = f_new;
            ts.push(t);
            ys.push(y);

            if direction * (t - t_end) >= 0.0 {
                break Status::Finished;
            }
        };

        log::debug!(
            "rk45: {:?} after {} accepted / {} rejected steps, {} evaluations",
            status,
            stats.accepted_steps,
            stats.rejected_steps,
            stats.fn_evals
        );

        Solution {
            t: ts,
            y: ys,
            status,
            stats,
        }
    }

    /// One Dormand-Prince step of signed size `h`. Returns the new state, the
    /// derivative there and the scaled RMS error norm.
    fn step<S, const N: usize>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        f: &[f64; N],
        h: f64,
        stats: &mut Stats,
    ) -> ([f64; N], [f64; N], f64)
    where
        S: OdeSystem<N>,
    {
        let mut k = [[0.0; N]; STAGES + 1];
        k[0] = *f;

        for s in 1..STAGES {
            let mut y_stage = *y;
            for (i, y_i) in y_stage.iter_mut().enumerate() {
                let dy: f64 = (0..s).map(|j| A[s][j] * k[j][i]).sum();
                *y_i += h * dy;
            }
            sys.rhs(t + C[s] * h, &y_stage, &mut k[s]);
        }

        let mut y_new = *y;
        for (i, y_i) in y_new.iter_mut().enumerate() {
            let dy: f64 = (0..STAGES).map(|j| B[j] * k[j][i]).sum();
            *y_i += h * dy;
        }

        let mut f_new = [0.0; N];
        sys.rhs(t + h, &y_new, &mut f_new);
        k[STAGES] = f_new;
        stats.fn_evals += STAGES as u64;

        let mut sum = 0.0;
        for i in 0..N {
            let err: f64 = h * (0..=STAGES).map(|j| E[j] * k[j][i]).sum::<f64>();
            let scale = self.tol.atol + y[i].abs().max(y_new[i].abs()) * self.tol.rtol;
            sum += (err / scale).powi(2);
        }
        let error_norm = (sum / N as f64).sqrt();

        (y_new, f_new, error_norm)
    }

    /// Bisects the step from `(t, y)` to `past`, where the terminal condition
    /// holds, down to the shortest step that still triggers it. Every trial is
    /// a fresh step from `(t, y)`, so no state past the event is ever kept.
    fn locate_event<S, const N: usize>(
        &self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        f: &[f64; N],
        past: (f64, [f64; N]),
        stats: &mut Stats,
    ) -> (f64, [f64; N])
    where
        S: OdeSystem<N>,
    {
        let mut before = 0.0;
        let mut after = past.0 - t;
        let mut event = past;

        for _ in 0..EVENT_BISECTIONS {
            let h = 0.5 * (before + after);
            if h == before || h == after {
                break;
            }
            let (y_mid, _, _) = self.step(sys, t, y, f, h, stats);
            let finite = y_mid.iter().all(|v| v.is_finite());
            if finite && !sys.should_terminate(t + h, &y_mid) {
                before = h;
            } else {
                after = h;
                if finite {
                    event = (t + h, y_mid);
                }
            }
        }

        event
    }

    /// Starting step from the local scale of the solution and its first two
    /// derivatives (Hairer, Nørsett & Wanner, II.4).
    fn initial_step<S, const N: usize>(
        &self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        f0: &[f64; N],
        t_end: f64,
        stats: &mut Stats,
    ) -> f64
    where
        S: OdeSystem<N>,
    {
        let interval = (t_end - t0).abs();
        let direction = (t_end - t0).signum();
        let scale: Vec<f64> = y0
            .iter()
            .map(|v| self.tol.atol + v.abs() * self.tol.rtol)
            .collect();

        let d0 = rms(y0.iter().zip(&scale).map(|(v, s)| v / s));
        let d1 = rms(f0.iter().zip(&scale).map(|(v, s)| v / s));

        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(interval);

        let mut y1 = *y0;
        for (y1_i, f0_i) in y1.iter_mut().zip(f0) {
            *y1_i += h0 * direction * f0_i;
        }
        let mut f1 = [0.0; N];
        sys.rhs(t0 + h0 * direction, &y1, &mut f1);
        stats.fn_evals += 1;

        let d2 = rms(
            f1.iter()
                .zip(f0)
                .zip(&scale)
                .map(|((a, b), s)| (a - b) / s),
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / (ERROR_ESTIMATOR_ORDER + 1.0))
        };

        (100.0 * h0).min(h1).min(interval)
    }
}

fn rms(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v * v, n + 1));
    if n == 0 {
        0.0
    } else {
        (sum / n as f64).sqrt()
    }
}

/// The adjacent representable float from `t` in the direction of `direction`.
fn next_toward(t: f64, direction: f64) -> f64 {
    if t == 0.0 {
        return direction * f64::from_bits(1);
    }
    let bits = t.to_bits();
    let away_from_zero = (t > 0.0) == (direction > 0.0);
    if away_from_zero {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay {
        rate: f64,
    }

    impl OdeSystem<1> for Decay {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = -self.rate * y[0];
        }
    }

    struct HarmonicOscillator {
        omega: f64,
    }

    impl OdeSystem<2> for HarmonicOscillator {
        fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
            dydt[0] = y[1];
            dydt[1] = -self.omega * self.omega * y[0];
        }
    }

    /// y' = y², blows up at t = 1 for y(0) = 1.
    struct BlowUp;

    impl OdeSystem<1> for BlowUp {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = y[0] * y[0];
        }
    }

    struct StopBelow {
        threshold: f64,
    }

    impl OdeSystem<1> for StopBelow {
        fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = -1.0;
        }

        fn should_terminate(&self, _t: f64, y: &[f64; 1]) -> bool {
            y[0] <= self.threshold
        }
    }

    /// y' = -1/y, which reaches y = 0 at t = 1/2 for y(0) = 1.
    struct Singular {
        wall: f64,
    }

    impl OdeSystem<1> for Singular {
        fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = -1.0 / y[0];
        }

        fn should_terminate(&self, _t: f64, y: &[f64; 1]) -> bool {
            y[0] <= self.wall
        }
    }

    #[test]
    fn exponential_decay_matches_analytic() {
        let solver = Rk45::new(
            Tolerances {
                rtol: 1e-8,
                atol: 1e-10,
            },
            f64::INFINITY,
        );
        let sol = solver.integrate(&Decay { rate: 0.5 }, 0.0, [1.0], 10.0);

        assert_eq!(sol.status, Status::Finished);
        assert_eq!(*sol.t.last().unwrap(), 10.0);
        let expected = (-5.0f64).exp();
        assert!((sol.y.last().unwrap()[0] - expected).abs() < 1e-8);
    }

    #[test]
    fn starts_at_initial_condition() {
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&Decay { rate: 1.0 }, 2.0, [3.0], 3.0);
        assert_eq!(sol.t[0], 2.0);
        assert_eq!(sol.y[0], [3.0]);
        assert_eq!(sol.t.len(), sol.y.len());
    }

    #[test]
    fn honors_max_step() {
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&HarmonicOscillator { omega: 1.0 }, 0.0, [1.0, 0.0], 20.0);

        assert_eq!(sol.status, Status::Finished);
        assert!(sol.t.len() >= 200);
        for w in sol.t.windows(2) {
            let h = w[1] - w[0];
            assert!(h > 0.0 && h <= 0.1 + 1e-12, "step {h}");
        }
    }

    #[test]
    fn oscillator_energy_within_tolerance() {
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&HarmonicOscillator { omega: 1.0 }, 0.0, [1.0, 0.0], 50.0);

        let energy = |y: &[f64; 2]| 0.5 * y[1] * y[1] + 0.5 * y[0] * y[0];
        let e0 = energy(&sol.y[0]);
        for y in &sol.y {
            assert!((energy(y) - e0).abs() / e0 < 1e-3);
        }
    }

    #[test]
    fn integrates_backwards() {
        let solver = Rk45::new(
            Tolerances {
                rtol: 1e-9,
                atol: 1e-12,
            },
            f64::INFINITY,
        );
        let sol = solver.integrate(&Decay { rate: 1.0 }, 1.0, [1.0], 0.0);
        assert_eq!(sol.status, Status::Finished);
        assert!((sol.y.last().unwrap()[0] - 1.0f64.exp()).abs() < 1e-7);
        assert!(sol.t.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn empty_span_returns_initial_point() {
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&Decay { rate: 1.0 }, 0.0, [1.0], 0.0);
        assert_eq!(sol.t.len(), 1);
        assert_eq!(sol.status, Status::Finished);
    }

    #[test]
    fn blow_up_reports_failure() {
        let solver = Rk45::new(Tolerances::default(), f64::INFINITY);
        let sol = solver.integrate(&BlowUp, 0.0, [1.0], 2.0);

        assert!(matches!(sol.status, Status::Failed(_)));
        assert!(*sol.t.last().unwrap() < 1.0);
    }

    #[test]
    fn terminal_condition_stops_early() {
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&StopBelow { threshold: 0.5 }, 0.0, [1.0], 10.0);

        assert_eq!(sol.status, Status::Terminated);
        let last = sol.y.last().unwrap()[0];
        assert!(last <= 0.5 && last > 0.5 - 1e-9, "stopped at {last}");
        assert!((sol.t.last().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn terminal_step_never_passes_the_event() {
        // y' = -1/y is undefined at y = 0; stop just short of it.
        let solver = Rk45::new(Tolerances::default(), 0.1);
        let sol = solver.integrate(&Singular { wall: 1e-3 }, 0.0, [1.0], 10.0);

        assert_eq!(sol.status, Status::Terminated);
        let (last, earlier) = sol.y.split_last().unwrap();
        assert!(last[0] > 0.0 && last[0] <= 1e-3, "stopped at {}", last[0]);
        assert!(earlier.iter().all(|y| y[0] > 1e-3));
        assert!(sol.t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn next_toward_steps_one_ulp() {
        assert!(next_toward(1.0, 1.0) > 1.0);
        assert!(next_toward(1.0, -1.0) < 1.0);
        assert!(next_toward(-1.0, -1.0) < -1.0);
        assert!(next_toward(0.0, -1.0) < 0.0);
    }
}
