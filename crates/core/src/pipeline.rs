//! The per-frame solver pipeline.
//!
//! A frame is an ordered list of [`Pass`]es. Every pass reads the fully
//! written output of the one before it, so a backend executes them strictly
//! in sequence; each pass that produces a new double-buffered state swaps
//! that buffer before returning.
//!
//! Order: splats, curl, vorticity confinement, divergence, pressure warm
//! start, Jacobi relaxation, gradient subtraction, velocity self-advection,
//! dye advection.

use crate::config::SimulationConfig;
use crate::error::FluidError;
use crate::impulse::Impulse;

/// One solver stage and the uniforms it needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pass {
    /// Adds an impulse into velocity, then dye, swapping each.
    Splat { impulse: Impulse, aspect_ratio: f32 },
    /// Velocity -> curl.
    Curl,
    /// Velocity + curl -> velocity.
    Vorticity { curl_strength: f32, dt: f32 },
    /// Velocity -> divergence, with reflected edge samples.
    Divergence,
    /// Pressure *= `dissipation`.
    ClearPressure { dissipation: f32 },
    /// One relaxation step of pressure against divergence.
    Jacobi,
    /// Velocity -= grad(pressure).
    SubtractGradient,
    /// Velocity advected by itself.
    AdvectVelocity { dt: f32, dissipation: f32 },
    /// Dye advected by velocity.
    AdvectDye { dt: f32, dissipation: f32 },
}

/// Executes solver passes against backend-owned field storage.
pub trait FluidBackend {
    /// Handle through which the dye field is published.
    type Dye: ?Sized;

    /// Runs one pass to completion.
    ///
    /// # Errors
    ///
    /// Backends may fail on GPU submission; the CPU backend never does.
    fn execute(&mut self, pass: &Pass) -> Result<(), FluidError>;

    /// The dye field's current `read` side.
    fn dye(&self) -> &Self::Dye;
}

/// Solver passes for one frame, excluding splats.
pub fn solver_passes(config: &SimulationConfig) -> Vec<Pass> {
    let mut passes = vec![
        Pass::Curl,
        Pass::Vorticity {
            curl_strength: config.curl_strength,
            dt: config.dt,
        },
        Pass::Divergence,
        Pass::ClearPressure {
            dissipation: config.pressure_dissipation,
        },
    ];
    passes.extend((0..config.jacobi_iterations).map(|_| Pass::Jacobi));
    passes.extend([
        Pass::SubtractGradient,
        Pass::AdvectVelocity {
            dt: config.dt,
            dissipation: config.velocity_dissipation,
        },
        Pass::AdvectDye {
            dt: config.dt,
            dissipation: config.density_dissipation,
        },
    ]);
    passes
}

/// Full pass list for one frame: one splat per impulse, then the solver.
pub fn frame_passes(
    config: &SimulationConfig,
    impulses: &[Impulse],
    aspect_ratio: f32,
) -> Vec<Pass> {
    impulses
        .iter()
        .map(|&impulse| Pass::Splat {
            impulse,
            aspect_ratio,
        })
        .chain(solver_passes(config))
        .collect()
}

/// Executes `passes` in order, stopping at the first error.
///
/// # Errors
///
/// Propagates the backend's error.
pub fn run_passes<B: FluidBackend + ?Sized>(
    backend: &mut B,
    passes: &[Pass],
) -> Result<(), FluidError> {
    passes.iter().try_for_each(|pass| backend.execute(pass))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    /// Backend that only records which passes ran.
    #[derive(Default)]
    struct Recorder {
        log: Vec<Pass>,
        fail_on: Option<usize>,
    }

    impl FluidBackend for Recorder {
        type Dye = [Pass];

        fn execute(&mut self, pass: &Pass) -> Result<(), FluidError> {
            if self.fail_on == Some(self.log.len()) {
                return Err(FluidError::Gpu("lost context".into()));
            }
            self.log.push(*pass);
            Ok(())
        }

        fn dye(&self) -> &[Pass] {
            &self.log
        }
    }

    fn impulse(x: f32) -> Impulse {
        Impulse {
            position: Vec2::new(x, 0.5),
            velocity_delta: Vec2::ONE,
            color: Vec3::ONE,
            radius: 0.003,
        }
    }

    fn kind(pass: &Pass) -> &'static str {
        match pass {
            Pass::Splat { .. } => "splat",
            Pass::Curl => "curl",
            Pass::Vorticity { .. } => "vorticity",
            Pass::Divergence => "divergence",
            Pass::ClearPressure { .. } => "clear",
            Pass::Jacobi => "jacobi",
            Pass::SubtractGradient => "gradient",
            Pass::AdvectVelocity { .. } => "advect-velocity",
            Pass::AdvectDye { .. } => "advect-dye",
        }
    }

    #[test]
    fn solver_order_is_fixed() {
        let passes = solver_passes(&SimulationConfig::default());
        let kinds: Vec<_> = passes.iter().map(kind).collect();
        assert_eq!(
            kinds,
            vec![
                "curl",
                "vorticity",
                "divergence",
                "clear",
                "jacobi",
                "jacobi",
                "jacobi",
                "gradient",
                "advect-velocity",
                "advect-dye",
            ]
        );
    }

    #[test]
    fn jacobi_count_follows_config() {
        for n in [0, 1, 20] {
            let config = SimulationConfig {
                jacobi_iterations: n,
                ..SimulationConfig::default()
            };
            let jacobi = solver_passes(&config)
                .iter()
                .filter(|p| matches!(p, Pass::Jacobi))
                .count();
            assert_eq!(jacobi, n as usize);
        }
    }

    #[test]
    fn uniforms_come_from_config() {
        let config = SimulationConfig {
            dt: 0.5,
            curl_strength: 7.0,
            velocity_dissipation: 0.1,
            density_dissipation: 0.2,
            pressure_dissipation: 0.3,
            ..SimulationConfig::default()
        };
        let passes = solver_passes(&config);
        assert!(passes.contains(&Pass::Vorticity {
            curl_strength: 7.0,
            dt: 0.5
        }));
        assert!(passes.contains(&Pass::ClearPressure { dissipation: 0.3 }));
        assert!(passes.contains(&Pass::AdvectVelocity {
            dt: 0.5,
            dissipation: 0.1
        }));
        assert!(passes.contains(&Pass::AdvectDye {
            dt: 0.5,
            dissipation: 0.2
        }));
    }

    #[test]
    fn splats_precede_solver() {
        let impulses = [impulse(0.1), impulse(0.2)];
        let passes = frame_passes(&SimulationConfig::default(), &impulses, 1.5);
        assert_eq!(
            passes[0],
            Pass::Splat {
                impulse: impulses[0],
                aspect_ratio: 1.5
            }
        );
        assert_eq!(kind(&passes[1]), "splat");
        assert_eq!(kind(&passes[2]), "curl");
        assert_eq!(kind(passes.last().unwrap()), "advect-dye");
    }

    #[test]
    fn run_passes_executes_in_order() {
        let mut backend = Recorder::default();
        let passes = frame_passes(&SimulationConfig::default(), &[impulse(0.3)], 1.0);
        run_passes(&mut backend, &passes).unwrap();
        assert_eq!(backend.dye(), passes.as_slice());
    }

    #[test]
    fn run_passes_stops_at_first_error() {
        let mut backend = Recorder {
            fail_on: Some(2),
            ..Recorder::default()
        };
        let passes = solver_passes(&SimulationConfig::default());
        assert!(run_passes(&mut backend, &passes).is_err());
        assert_eq!(backend.log.len(), 2);
    }

    #[test]
    fn backend_is_usable_as_trait_object() {
        let mut backend = Recorder::default();
        let dynamic: &mut dyn FluidBackend<Dye = [Pass]> = &mut backend;
        run_passes(dynamic, &[Pass::Curl]).unwrap();
        assert_eq!(dynamic.dye(), &[Pass::Curl]);
    }
}
