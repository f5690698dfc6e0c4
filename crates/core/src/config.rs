//! Simulation tunables.
//!
//! `SimulationConfig` is owned by the scheduler and passed by reference into
//! every frame. It is constant for the process lifetime apart from
//! [`SimulationConfig::toggle_density_dissipation`], the single runtime
//! mutation driven by an external input-sequence detector.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capability::Precision;
use crate::error::FluidError;
use crate::params::{param_f32, param_str, param_u32};

/// Default simulation grid edge length (velocity, pressure, divergence, curl).
pub const DEFAULT_SIM_RESOLUTION: u32 = 128;
/// Default dye grid edge length.
pub const DEFAULT_DYE_RESOLUTION: u32 = 512;
/// Default Jacobi relaxation passes per frame.
pub const DEFAULT_JACOBI_ITERATIONS: u32 = 3;
/// Default timestep.
pub const DEFAULT_DT: f32 = 0.016;
/// Default vorticity confinement strength.
pub const DEFAULT_CURL_STRENGTH: f32 = 20.0;
/// Default per-frame velocity retention.
pub const DEFAULT_VELOCITY_DISSIPATION: f32 = 0.9;
/// Default per-frame dye retention.
pub const DEFAULT_DENSITY_DISSIPATION: f32 = 0.93;
/// Dye retention while the cheat toggle is active.
pub const BOOSTED_DENSITY_DISSIPATION: f32 = 0.99;
/// Default fraction of last frame's pressure kept as a warm start.
pub const DEFAULT_PRESSURE_DISSIPATION: f32 = 0.8;
/// Default splat radius, in hundredths of the squared normalized distance.
pub const DEFAULT_SPLAT_RADIUS: f32 = 0.3;

/// Tunables for one fluid simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Edge length of the square simulation grid.
    pub sim_resolution: u32,
    /// Edge length of the square dye grid. Independent of `sim_resolution`.
    pub dye_resolution: u32,
    /// Jacobi passes per frame. Zero leaves the warm-started pressure untouched.
    pub jacobi_iterations: u32,
    pub dt: f32,
    pub curl_strength: f32,
    pub velocity_dissipation: f32,
    pub density_dissipation: f32,
    pub pressure_dissipation: f32,
    /// Splat size as exposed to users; the kernel uses `splat_radius / 100`.
    pub splat_radius: f32,
    /// Float precision requested from the device.
    pub precision: Precision,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sim_resolution: DEFAULT_SIM_RESOLUTION,
            dye_resolution: DEFAULT_DYE_RESOLUTION,
            jacobi_iterations: DEFAULT_JACOBI_ITERATIONS,
            dt: DEFAULT_DT,
            curl_strength: DEFAULT_CURL_STRENGTH,
            velocity_dissipation: DEFAULT_VELOCITY_DISSIPATION,
            density_dissipation: DEFAULT_DENSITY_DISSIPATION,
            pressure_dissipation: DEFAULT_PRESSURE_DISSIPATION,
            splat_radius: DEFAULT_SPLAT_RADIUS,
            precision: Precision::Half,
        }
    }
}

impl SimulationConfig {
    /// Builds a config from a JSON object, falling back to defaults per key.
    ///
    /// Unknown precision names fall back to half precision.
    pub fn from_json(params: &Value) -> Self {
        let d = Self::default();
        Self {
            sim_resolution: param_u32(params, "sim_resolution", d.sim_resolution),
            dye_resolution: param_u32(params, "dye_resolution", d.dye_resolution),
            jacobi_iterations: param_u32(params, "jacobi_iterations", d.jacobi_iterations),
            dt: param_f32(params, "dt", d.dt),
            curl_strength: param_f32(params, "curl_strength", d.curl_strength),
            velocity_dissipation: param_f32(params, "velocity_dissipation", d.velocity_dissipation),
            density_dissipation: param_f32(params, "density_dissipation", d.density_dissipation),
            pressure_dissipation: param_f32(params, "pressure_dissipation", d.pressure_dissipation),
            splat_radius: param_f32(params, "splat_radius", d.splat_radius),
            precision: Precision::from_name(param_str(params, "precision", "half"))
                .unwrap_or(d.precision),
        }
    }

    /// Checks ranges that would make the grids or kernels meaningless.
    ///
    /// Large timesteps and strong curl are accepted: the solver has no
    /// stability clamp and will visibly diverge instead.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::InvalidDimensions`] for zero resolutions and
    /// [`FluidError::InvalidConfig`] for non-finite or negative scalars.
    pub fn validate(&self) -> Result<(), FluidError> {
        if self.sim_resolution == 0 || self.dye_resolution == 0 {
            return Err(FluidError::InvalidDimensions);
        }
        let non_negative = [
            ("dt", self.dt),
            ("curl_strength", self.curl_strength),
            ("velocity_dissipation", self.velocity_dissipation),
            ("density_dissipation", self.density_dissipation),
            ("pressure_dissipation", self.pressure_dissipation),
        ];
        if let Some((name, value)) = non_negative
            .iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(FluidError::InvalidConfig(format!(
                "{name} must be finite and non-negative, got {value}"
            )));
        }
        if !self.splat_radius.is_finite() || self.splat_radius <= 0.0 {
            return Err(FluidError::InvalidConfig(format!(
                "splat_radius must be positive, got {}",
                self.splat_radius
            )));
        }
        Ok(())
    }

    /// Radius uniform fed to the splat kernel `exp(-d² / r)`.
    pub fn splat_kernel_radius(&self) -> f32 {
        self.splat_radius / 100.0
    }

    /// Flips dye retention between the default and the boosted value.
    ///
    /// Any value other than the boosted one switches to boosted, so a custom
    /// starting value toggles to 0.99 and then back to 0.93.
    pub fn toggle_density_dissipation(&mut self) {
        self.density_dissipation = if self.density_dissipation == BOOSTED_DENSITY_DISSIPATION {
            DEFAULT_DENSITY_DISSIPATION
        } else {
            BOOSTED_DENSITY_DISSIPATION
        };
        log::debug!("density dissipation toggled to {}", self.density_dissipation);
    }

    /// Current values as a JSON object.
    pub fn to_json(&self) -> Value {
        json!({
            "sim_resolution": self.sim_resolution,
            "dye_resolution": self.dye_resolution,
            "jacobi_iterations": self.jacobi_iterations,
            "dt": self.dt,
            "curl_strength": self.curl_strength,
            "velocity_dissipation": self.velocity_dissipation,
            "density_dissipation": self.density_dissipation,
            "pressure_dissipation": self.pressure_dissipation,
            "splat_radius": self.splat_radius,
            "precision": self.precision,
        })
    }

    /// Schema describing every key, its type, range and default.
    pub fn param_schema() -> Value {
        json!({
            "sim_resolution": {
                "type": "integer",
                "default": DEFAULT_SIM_RESOLUTION,
                "min": 1,
                "description": "Edge length of the velocity/pressure grid"
            },
            "dye_resolution": {
                "type": "integer",
                "default": DEFAULT_DYE_RESOLUTION,
                "min": 1,
                "description": "Edge length of the dye grid"
            },
            "jacobi_iterations": {
                "type": "integer",
                "default": DEFAULT_JACOBI_ITERATIONS,
                "min": 0,
                "description": "Pressure relaxation passes per frame"
            },
            "dt": {
                "type": "number",
                "default": DEFAULT_DT,
                "min": 0.0,
                "description": "Timestep per frame"
            },
            "curl_strength": {
                "type": "number",
                "default": DEFAULT_CURL_STRENGTH,
                "min": 0.0,
                "description": "Vorticity confinement strength"
            },
            "velocity_dissipation": {
                "type": "number",
                "default": DEFAULT_VELOCITY_DISSIPATION,
                "min": 0.0,
                "max": 1.0,
                "description": "Fraction of velocity kept per frame"
            },
            "density_dissipation": {
                "type": "number",
                "default": DEFAULT_DENSITY_DISSIPATION,
                "min": 0.0,
                "max": 1.0,
                "description": "Fraction of dye kept per frame"
            },
            "pressure_dissipation": {
                "type": "number",
                "default": DEFAULT_PRESSURE_DISSIPATION,
                "min": 0.0,
                "max": 1.0,
                "description": "Fraction of pressure kept as the next solve's starting point"
            },
            "splat_radius": {
                "type": "number",
                "default": DEFAULT_SPLAT_RADIUS,
                "min": 0.0,
                "description": "Pointer splat size"
            },
            "precision": {
                "type": "string",
                "default": "half",
                "enum": ["half", "full"],
                "description": "Float texture precision requested from the device"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let c = SimulationConfig::default();
        assert_eq!(c.sim_resolution, 128);
        assert_eq!(c.dye_resolution, 512);
        assert_eq!(c.jacobi_iterations, 3);
        assert!((c.dt - 0.016).abs() < f32::EPSILON);
        assert!((c.curl_strength - 20.0).abs() < f32::EPSILON);
        assert!((c.velocity_dissipation - 0.9).abs() < f32::EPSILON);
        assert!((c.density_dissipation - 0.93).abs() < f32::EPSILON);
        assert!((c.pressure_dissipation - 0.8).abs() < f32::EPSILON);
        assert!((c.splat_radius - 0.3).abs() < f32::EPSILON);
        assert_eq!(c.precision, Precision::Half);
    }

    #[test]
    fn default_validates() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn splat_kernel_radius_is_hundredth() {
        let c = SimulationConfig::default();
        assert!((c.splat_kernel_radius() - 0.003).abs() < 1e-7);
    }

    #[test]
    fn toggle_switches_between_fixed_values() {
        let mut c = SimulationConfig::default();
        c.toggle_density_dissipation();
        assert_eq!(c.density_dissipation, BOOSTED_DENSITY_DISSIPATION);
        c.toggle_density_dissipation();
        assert_eq!(c.density_dissipation, DEFAULT_DENSITY_DISSIPATION);
    }

    #[test]
    fn toggle_touches_nothing_else() {
        let mut c = SimulationConfig::default();
        c.toggle_density_dissipation();
        let expected = SimulationConfig {
            density_dissipation: BOOSTED_DENSITY_DISSIPATION,
            ..SimulationConfig::default()
        };
        assert_eq!(c, expected);
    }

    #[test]
    fn toggle_from_custom_value_goes_to_boosted() {
        let mut c = SimulationConfig {
            density_dissipation: 0.5,
            ..SimulationConfig::default()
        };
        c.toggle_density_dissipation();
        assert_eq!(c.density_dissipation, BOOSTED_DENSITY_DISSIPATION);
    }

    #[test]
    fn from_json_empty_object_is_default() {
        assert_eq!(
            SimulationConfig::from_json(&json!({})),
            SimulationConfig::default()
        );
    }

    #[test]
    fn from_json_reads_overrides() {
        let c = SimulationConfig::from_json(&json!({
            "sim_resolution": 64,
            "dye_resolution": 256,
            "jacobi_iterations": 20,
            "dt": 0.02,
            "curl_strength": 0,
            "precision": "full",
        }));
        assert_eq!(c.sim_resolution, 64);
        assert_eq!(c.dye_resolution, 256);
        assert_eq!(c.jacobi_iterations, 20);
        assert!((c.dt - 0.02).abs() < f32::EPSILON);
        assert_eq!(c.curl_strength, 0.0);
        assert_eq!(c.precision, Precision::Full);
    }

    #[test]
    fn from_json_unknown_precision_falls_back() {
        let c = SimulationConfig::from_json(&json!({"precision": "double"}));
        assert_eq!(c.precision, Precision::Half);
    }

    #[test]
    fn validate_rejects_zero_resolution() {
        let c = SimulationConfig {
            dye_resolution: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(c.validate(), Err(FluidError::InvalidDimensions)));
    }

    #[test]
    fn validate_rejects_nan_and_negative() {
        let c = SimulationConfig {
            dt: f32::NAN,
            ..SimulationConfig::default()
        };
        assert!(matches!(c.validate(), Err(FluidError::InvalidConfig(_))));

        let c = SimulationConfig {
            velocity_dissipation: -0.1,
            ..SimulationConfig::default()
        };
        let err = c.validate().unwrap_err();
        assert!(format!("{err}").contains("velocity_dissipation"));
    }

    #[test]
    fn validate_rejects_non_positive_radius() {
        let c = SimulationConfig {
            splat_radius: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(c.validate(), Err(FluidError::InvalidConfig(_))));
    }

    #[test]
    fn validate_accepts_large_dt() {
        let c = SimulationConfig {
            dt: 10.0,
            ..SimulationConfig::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn to_json_round_trips_through_from_json() {
        let c = SimulationConfig {
            sim_resolution: 32,
            jacobi_iterations: 7,
            precision: Precision::Full,
            ..SimulationConfig::default()
        };
        assert_eq!(SimulationConfig::from_json(&c.to_json()), c);
    }

    #[test]
    fn serde_derive_matches_to_json_keys() {
        let value = serde_json::to_value(SimulationConfig::default()).unwrap();
        assert_eq!(value, SimulationConfig::default().to_json());
    }

    #[test]
    fn param_schema_covers_every_key() {
        let schema = SimulationConfig::param_schema();
        for key in SimulationConfig::default().to_json().as_object().unwrap().keys() {
            assert!(schema.get(key).is_some(), "schema missing {key}");
            assert!(schema[key].get("default").is_some(), "{key} missing default");
            assert!(schema[key].get("description").is_some(), "{key} missing description");
        }
    }
}
