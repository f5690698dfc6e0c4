//! OpenGL ES 3.0 / WebGL2 backend.
//!
//! Only compiled with the `render` feature.
//!
//! - [`context`]: live context, probed as a `DeviceCapabilities`.
//! - [`texture`]: float texture formats per field.
//! - [`target`]: framebuffer + texture per field.
//! - [`shader`]: compilation, linking and uniform binding.
//! - [`programs`]: GLSL sources for every pass.
//! - [`backend`]: `GlFluid`, the `FluidBackend` over all of the above.

pub mod backend;
pub mod context;
pub mod programs;
pub mod shader;
pub mod target;
pub mod texture;

pub use backend::GlFluid;
pub use context::GpuContext;
pub use programs::{SolverProgram, BASE_VERTEX_SHADER};
pub use shader::{Program, ShaderError};
pub use target::RenderTarget;
pub use texture::{create_texture, TextureConfig};
