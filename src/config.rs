use std::path::PathBuf;

use crate::error::{Error, Result};

/// Physical and numerical parameters of one run (G = c = 1).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Black hole mass M
    pub mass: f64,
    /// Initial radius, must lie outside r = 2M
    pub r0: f64,
    /// Initial radial velocity dr/dτ
    pub vr0: f64,
    /// Angular momentum per unit mass
    pub angular_momentum: f64,
    /// End of the proper-time span [0, tau_max]
    pub tau_max: f64,
    /// Integrator step-size ceiling
    pub max_step: f64,
    pub rtol: f64,
    pub atol: f64,
}

/// Default initial radius in units of M.
pub const DEFAULT_R0_PER_MASS: f64 = 10.0;
/// Default angular momentum in units of M.
pub const DEFAULT_ANGULAR_MOMENTUM_PER_MASS: f64 = 4.0;

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::for_mass(1.0)
    }
}

impl SimulationConfig {
    /// Reference run around a hole of the given mass: r0 = 10 M, L = 4 M.
    pub fn for_mass(mass: f64) -> Self {
        Self {
            mass,
            r0: DEFAULT_R0_PER_MASS * mass,
            vr0: 0.0,
            angular_momentum: DEFAULT_ANGULAR_MOMENTUM_PER_MASS * mass,
            tau_max: 500.0,
            max_step: 0.1,
            rtol: 1e-3,
            atol: 1e-6,
        }
    }

    /// Checks the parameters that do not depend on the metric. Horizon and
    /// energy checks happen when the geodesic system is built.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("mass", self.mass),
            ("r0", self.r0),
            ("tau_max", self.tau_max),
            ("max_step", self.max_step),
            ("rtol", self.rtol),
            ("atol", self.atol),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidParameter {
                    name,
                    value,
                    reason: "must be positive",
                });
            }
        }

        for (name, value) in [("vr0", self.vr0), ("angular_momentum", self.angular_momentum)] {
            if !value.is_finite() {
                return Err(Error::InvalidParameter {
                    name,
                    value,
                    reason: "must be finite",
                });
            }
        }
        Ok(())
    }
}

/// Everything the binary needs: the simulation plus where to render it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub simulation: SimulationConfig,
    /// Render to this PNG instead of opening a window.
    pub output: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            output: None,
            width: 1280,
            height: 720,
        }
    }
}

pub const USAGE: &str = "\
Usage: schwarzschild-orbit [options]

Options:
  --mass <M>                black hole mass (default 1.0)
  --r0 <r>                  initial radius, > 2M (default 10 M)
  --vr0 <v>                 initial radial velocity dr/dtau (default 0.0)
  --angular-momentum <L>    angular momentum per unit mass (default 4 M)
  --tau-max <tau>           proper-time span (default 500.0)
  --max-step <h>            integrator step ceiling (default 0.1)
  --rtol <tol>              relative tolerance (default 1e-3)
  --atol <tol>              absolute tolerance (default 1e-6)
  --output <file.png>       render to a PNG file instead of a window
  --width <px>              image width (default 1280)
  --height <px>             image height (default 720)
  -h, --help                print this message

The r0 and L defaults scale with --mass unless given explicitly.
";

/// Builds a [`Config`] from command-line arguments (program name excluded).
///
/// Returns `Ok(None)` when `--help` was requested. Anything that is not a
/// known flag or the value following one is rejected.
pub fn parse_args(args: &[String]) -> Result<Option<Config>> {
    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(None);
    }

    let mut config = Config::default();
    let sim = &mut config.simulation;
    let mut r0: Option<f64> = None;
    let mut angular_momentum: Option<f64> = None;

    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--mass" => sim.mass = value(&mut rest, "--mass")?,
            "--r0" => r0 = Some(value(&mut rest, "--r0")?),
            "--vr0" => sim.vr0 = value(&mut rest, "--vr0")?,
            "--angular-momentum" => {
                angular_momentum = Some(value(&mut rest, "--angular-momentum")?)
            }
            "--tau-max" => sim.tau_max = value(&mut rest, "--tau-max")?,
            "--max-step" => sim.max_step = value(&mut rest, "--max-step")?,
            "--rtol" => sim.rtol = value(&mut rest, "--rtol")?,
            "--atol" => sim.atol = value(&mut rest, "--atol")?,
            "--output" => config.output = Some(value(&mut rest, "--output")?),
            "--width" => config.width = value(&mut rest, "--width")?,
            "--height" => config.height = value(&mut rest, "--height")?,
            other => return Err(Error::UnexpectedArgument(other.to_string())),
        }
    }

    let scaled = SimulationConfig::for_mass(sim.mass);
    sim.r0 = r0.unwrap_or(scaled.r0);
    sim.angular_momentum = angular_momentum.unwrap_or(scaled.angular_momentum);

    Ok(Some(config))
}

/// Takes and parses the value following `flag`.
fn value<'a, T: std::str::FromStr>(
    rest: &mut impl Iterator<Item = &'a String>,
    flag: &'static str,
) -> Result<T> {
    let raw = rest.next().ok_or(Error::MissingValue(flag))?;
    raw.parse().map_err(|_| Error::InvalidFlag {
        flag,
        value: raw.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_reference_run() {
        let config = parse_args(&[]).unwrap().unwrap();
        let sim = &config.simulation;
        assert_eq!(sim.mass, 1.0);
        assert_eq!(sim.r0, 10.0);
        assert_eq!(sim.vr0, 0.0);
        assert_eq!(sim.angular_momentum, 4.0);
        assert_eq!(sim.tau_max, 500.0);
        assert_eq!(sim.max_step, 0.1);
        assert!(config.output.is_none());
        assert!(sim.validate().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse_args(&args(&[
            "--mass",
            "2",
            "--angular-momentum",
            "-3.5",
            "--output",
            "orbit.png",
            "--width",
            "640",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.simulation.mass, 2.0);
        assert_eq!(config.simulation.angular_momentum, -3.5);
        assert_eq!(config.output, Some(PathBuf::from("orbit.png")));
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 720);
    }

    #[test]
    fn mass_scales_default_radius_and_angular_momentum() {
        let config = parse_args(&args(&["--mass", "2"])).unwrap().unwrap();
        assert_eq!(config.simulation.r0, 20.0);
        assert_eq!(config.simulation.angular_momentum, 8.0);

        let config = parse_args(&args(&["--r0", "15", "--mass", "2"]))
            .unwrap()
            .unwrap();
        assert_eq!(config.simulation.r0, 15.0);
        assert_eq!(config.simulation.angular_momentum, 8.0);
    }

    #[test]
    fn help_returns_none() {
        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
        assert!(parse_args(&args(&["--mass", "2", "-h"])).unwrap().is_none());
        assert!(USAGE.contains("-h, --help"));
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let err = parse_args(&args(&["--R0", "5"])).unwrap_err();
        assert!(matches!(err, Error::UnexpectedArgument(ref a) if a == "--R0"));

        let err = parse_args(&args(&["--mass", "1", "5"])).unwrap_err();
        assert!(matches!(err, Error::UnexpectedArgument(ref a) if a == "5"));
    }

    #[test]
    fn bad_value_is_an_error() {
        let err = parse_args(&args(&["--r0", "ten"])).unwrap_err();
        assert!(matches!(err, Error::InvalidFlag { flag: "--r0", .. }));
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = parse_args(&args(&["--tau-max"])).unwrap_err();
        assert!(matches!(err, Error::MissingValue("--tau-max")));
    }

    #[test]
    fn validate_rejects_non_positive_step() {
        let sim = SimulationConfig {
            max_step: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            sim.validate(),
            Err(Error::InvalidParameter {
                name: "max_step",
                ..
            })
        ));
    }
}
