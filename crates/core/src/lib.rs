#![deny(unsafe_code)]
//! Real-time 2D stable-fluids solver.
//!
//! The solver advances a velocity field and a dye field once per frame:
//! pointer impulses are splatted in, vorticity is confined, the velocity is
//! projected towards divergence-free with a Jacobi pressure solve, and both
//! fields are advected semi-Lagrangianly. The dye field is what the host
//! displays.
//!
//! The frame is data ([`Pass`]) run by a [`FluidBackend`]. [`CpuFluid`] is
//! the deterministic reference; with the `render` feature, `render::GlFluid`
//! runs the same passes as GLSL programs. Both allocate through
//! [`FluidState`] after [`negotiate`] picks float formats the device can
//! render to.

pub mod capability;
pub mod config;
pub mod cpu;
pub mod double_buffer;
pub mod error;
pub mod grid;
pub mod impulse;
pub mod params;
pub mod pipeline;
pub mod scheduler;
pub mod state;

#[cfg(feature = "render")]
pub mod render;

pub use capability::{
    negotiate, Channels, DeviceCapabilities, FilterMode, HeadlessDevice, NegotiatedFormats,
    Precision, TextureFormat,
};
pub use config::SimulationConfig;
pub use cpu::CpuFluid;
pub use double_buffer::DoubleBuffer;
pub use error::FluidError;
pub use grid::{Filter, Grid, GridSpec};
pub use impulse::{Impulse, ImpulseInjector, Viewport};
pub use pipeline::{frame_passes, run_passes, solver_passes, FluidBackend, Pass};
pub use scheduler::{FrameStatus, Phase, Simulation, PHONE_BREAKPOINT};
pub use state::{FieldLayout, FluidState};
