//! CPU reference backend.
//!
//! Each pass is written as the fragment program it mirrors: a function of
//! the texel-center coordinate that reads source grids through GL-style
//! sampling and returns the texel to write. [`Grid::render`] plays the role
//! of the fullscreen draw. Results are deterministic, which makes this
//! backend the oracle for the solver's numerical properties and the engine
//! behind headless runs.

use glam::{Vec2, Vec4};

use crate::capability::{FilterMode, NegotiatedFormats};
use crate::config::SimulationConfig;
use crate::error::FluidError;
use crate::grid::Grid;
use crate::impulse::Impulse;
use crate::pipeline::{FluidBackend, Pass};
use crate::state::{FieldLayout, FluidState};

/// Guard against normalising a zero vorticity gradient.
const VORTICITY_EPSILON: f32 = 0.0001;

/// Four-neighbour sample coordinates around a texel center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub center: Vec2,
    pub left: Vec2,
    pub right: Vec2,
    pub top: Vec2,
    pub bottom: Vec2,
}

impl Stencil {
    /// Offsets `uv` by one `texel` along each axis.
    pub fn new(uv: Vec2, texel: Vec2) -> Self {
        Self {
            center: uv,
            left: uv - Vec2::new(texel.x, 0.0),
            right: uv + Vec2::new(texel.x, 0.0),
            top: uv + Vec2::new(0.0, texel.y),
            bottom: uv - Vec2::new(0.0, texel.y),
        }
    }
}

/// Half the central-difference vorticity of `velocity` at `s`.
pub fn curl_at(velocity: &Grid, s: &Stencil) -> f32 {
    let l = velocity.sample(s.left).y;
    let r = velocity.sample(s.right).y;
    let t = velocity.sample(s.top).x;
    let b = velocity.sample(s.bottom).x;
    0.5 * (r - l - t + b)
}

/// Velocity after one step of vorticity confinement at `s`.
pub fn vorticity_at(velocity: &Grid, curl: &Grid, s: &Stencil, curl_strength: f32, dt: f32) -> Vec2 {
    let l = curl.sample(s.left).x;
    let r = curl.sample(s.right).x;
    let t = curl.sample(s.top).x;
    let b = curl.sample(s.bottom).x;
    let c = curl.sample(s.center).x;

    let mut force = 0.5 * Vec2::new(t.abs() - b.abs(), r.abs() - l.abs());
    force /= force.length() + VORTICITY_EPSILON;
    force *= curl_strength * c;
    force.y = -force.y;

    velocity.sample(s.center).truncate().truncate() + force * dt
}

/// Velocity neighbours used by the divergence stencil, with out-of-domain
/// samples replaced by the negated center component on that axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DivergenceSamples {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl DivergenceSamples {
    pub fn gather(velocity: &Grid, s: &Stencil) -> Self {
        let c = velocity.sample(s.center);
        let pick = |outside: bool, at: Vec2, reflected: f32, axis: usize| {
            if outside {
                reflected
            } else {
                velocity.sample(at)[axis]
            }
        };
        Self {
            left: pick(s.left.x < 0.0, s.left, -c.x, 0),
            right: pick(s.right.x > 1.0, s.right, -c.x, 0),
            top: pick(s.top.y > 1.0, s.top, -c.y, 1),
            bottom: pick(s.bottom.y < 0.0, s.bottom, -c.y, 1),
        }
    }

    pub fn divergence(&self) -> f32 {
        0.5 * (self.right - self.left + self.top - self.bottom)
    }
}

/// Free-slip divergence of `velocity` at `s`.
pub fn divergence_at(velocity: &Grid, s: &Stencil) -> f32 {
    DivergenceSamples::gather(velocity, s).divergence()
}

/// One Jacobi update of pressure at `s`.
pub fn jacobi_at(pressure: &Grid, divergence: &Grid, s: &Stencil) -> f32 {
    let l = pressure.sample(s.left).x;
    let r = pressure.sample(s.right).x;
    let t = pressure.sample(s.top).x;
    let b = pressure.sample(s.bottom).x;
    let div = divergence.sample(s.center).x;
    (l + r + b + t - div) * 0.25
}

/// Velocity minus the pressure gradient at `s`.
pub fn subtract_gradient_at(velocity: &Grid, pressure: &Grid, s: &Stencil) -> Vec2 {
    let l = pressure.sample(s.left).x;
    let r = pressure.sample(s.right).x;
    let t = pressure.sample(s.top).x;
    let b = pressure.sample(s.bottom).x;
    velocity.sample(s.center).truncate().truncate() - Vec2::new(r - l, t - b)
}

/// Mean absolute free-slip divergence over every texel of `velocity`.
pub fn mean_abs_divergence(velocity: &Grid) -> f32 {
    let texel = velocity.texel_size();
    let mut total = 0.0_f64;
    for y in 0..velocity.height() {
        for x in 0..velocity.width() {
            let s = Stencil::new(velocity.texel_center(x, y), texel);
            total += f64::from(divergence_at(velocity, &s).abs());
        }
    }
    (total / (f64::from(velocity.width()) * f64::from(velocity.height()))) as f32
}

/// Reference backend holding every field as a [`Grid`].
#[derive(Debug, Clone)]
pub struct CpuFluid {
    state: FluidState<Grid>,
    filter_mode: FilterMode,
}

impl CpuFluid {
    /// Allocates zeroed fields sized from `config` and `formats`.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::InvalidDimensions`] for zero resolutions.
    pub fn new(config: &SimulationConfig, formats: &NegotiatedFormats) -> Result<Self, FluidError> {
        let layout = FieldLayout::new(config, formats);
        Ok(Self {
            state: FluidState::allocate(&layout, |spec| Grid::new(*spec))?,
            filter_mode: formats.filter_mode,
        })
    }

    pub fn state(&self) -> &FluidState<Grid> {
        &self.state
    }

    /// Direct field access for seeding initial conditions.
    pub fn state_mut(&mut self) -> &mut FluidState<Grid> {
        &mut self.state
    }

    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Simulation texel size; every stencil offsets by this.
    fn sim_texel(&self) -> Vec2 {
        self.state.velocity.read().texel_size()
    }

    fn splat(&mut self, impulse: &Impulse, aspect_ratio: f32) {
        let (base, target) = self.state.velocity.split();
        let payload = impulse.velocity_payload();
        target.render(|uv| impulse.apply(base.sample(uv), payload, uv, aspect_ratio));
        self.state.velocity.swap();

        let (base, target) = self.state.dye.split();
        target.render(|uv| impulse.apply(base.sample(uv), impulse.color, uv, aspect_ratio));
        self.state.dye.swap();
    }

    fn curl(&mut self) {
        let texel = self.sim_texel();
        let velocity = self.state.velocity.read();
        self.state.curl.render(|uv| {
            let s = Stencil::new(uv, texel);
            Vec4::new(curl_at(velocity, &s), 0.0, 0.0, 1.0)
        });
    }

    fn vorticity(&mut self, curl_strength: f32, dt: f32) {
        let texel = self.sim_texel();
        let curl = &self.state.curl;
        let (velocity, target) = self.state.velocity.split();
        target.render(|uv| {
            let s = Stencil::new(uv, texel);
            vorticity_at(velocity, curl, &s, curl_strength, dt).extend(0.0).extend(1.0)
        });
        self.state.velocity.swap();
    }

    fn divergence(&mut self) {
        let texel = self.sim_texel();
        let velocity = self.state.velocity.read();
        self.state.divergence.render(|uv| {
            let s = Stencil::new(uv, texel);
            Vec4::new(divergence_at(velocity, &s), 0.0, 0.0, 1.0)
        });
    }

    fn clear_pressure(&mut self, dissipation: f32) {
        let (pressure, target) = self.state.pressure.split();
        target.render(|uv| dissipation * pressure.sample(uv));
        self.state.pressure.swap();
    }

    fn jacobi(&mut self) {
        let texel = self.sim_texel();
        let divergence = &self.state.divergence;
        let (pressure, target) = self.state.pressure.split();
        target.render(|uv| {
            let s = Stencil::new(uv, texel);
            Vec4::new(jacobi_at(pressure, divergence, &s), 0.0, 0.0, 1.0)
        });
        self.state.pressure.swap();
    }

    fn subtract_gradient(&mut self) {
        let texel = self.sim_texel();
        let pressure = self.state.pressure.read();
        let (velocity, target) = self.state.velocity.split();
        target.render(|uv| {
            let s = Stencil::new(uv, texel);
            subtract_gradient_at(velocity, pressure, &s).extend(0.0).extend(1.0)
        });
        self.state.velocity.swap();
    }

    fn advect_velocity(&mut self, dt: f32, dissipation: f32) {
        let texel = self.sim_texel();
        let mode = self.filter_mode;
        let (velocity, target) = self.state.velocity.split();
        target.render(|uv| advect(velocity, velocity, uv, texel, dt, dissipation, mode));
        self.state.velocity.swap();
    }

    fn advect_dye(&mut self, dt: f32, dissipation: f32) {
        let texel = self.sim_texel();
        let mode = self.filter_mode;
        let velocity = self.state.velocity.read();
        let (dye, target) = self.state.dye.split();
        target.render(|uv| advect(velocity, dye, uv, texel, dt, dissipation, mode));
        self.state.dye.swap();
    }
}

/// Semi-Lagrangian backtrace: sample `source` where the flow at `uv` came from.
///
/// The backtrace always uses the simulation texel size; `source` is sampled
/// at its own resolution.
fn advect(
    velocity: &Grid,
    source: &Grid,
    uv: Vec2,
    sim_texel: Vec2,
    dt: f32,
    dissipation: f32,
    mode: FilterMode,
) -> Vec4 {
    let out = match mode {
        FilterMode::Hardware => {
            let coord = uv - dt * velocity.sample(uv).truncate().truncate() * sim_texel;
            dissipation * source.sample(coord)
        }
        FilterMode::Manual => {
            let v = velocity.bilerp(uv, sim_texel).truncate().truncate();
            let coord = uv - dt * v * sim_texel;
            dissipation * source.bilerp(coord, source.texel_size())
        }
    };
    out.truncate().extend(1.0)
}

impl FluidBackend for CpuFluid {
    type Dye = Grid;

    fn execute(&mut self, pass: &Pass) -> Result<(), FluidError> {
        match *pass {
            Pass::Splat {
                ref impulse,
                aspect_ratio,
            } => self.splat(impulse, aspect_ratio),
            Pass::Curl => self.curl(),
            Pass::Vorticity { curl_strength, dt } => self.vorticity(curl_strength, dt),
            Pass::Divergence => self.divergence(),
            Pass::ClearPressure { dissipation } => self.clear_pressure(dissipation),
            Pass::Jacobi => self.jacobi(),
            Pass::SubtractGradient => self.subtract_gradient(),
            Pass::AdvectVelocity { dt, dissipation } => self.advect_velocity(dt, dissipation),
            Pass::AdvectDye { dt, dissipation } => self.advect_dye(dt, dissipation),
        }
        Ok(())
    }

    fn dye(&self) -> &Grid {
        self.state.dye.read()
    }
}
