//! Live GL context as a [`DeviceCapabilities`] implementation.
//!
//! Format support is decided empirically: a 4x4 texture of the format is
//! allocated and attached to a framebuffer, and the format counts as
//! renderable only if the framebuffer is complete. Extension strings decide
//! linear filtering and derivatives.

use std::collections::HashSet;
use std::rc::Rc;

use super::target::RenderTarget;
use super::texture::TextureConfig;
use crate::capability::{DeviceCapabilities, Precision, TextureFormat};
use crate::grid::Filter;

const PROBE_SIZE: u32 = 4;

/// Shared handle to a `glow::Context` plus its extension list.
///
/// Cloning is cheap; the simulation backend and the capability probe hold
/// the same context.
#[derive(Clone)]
pub struct GpuContext {
    gl: Rc<glow::Context>,
    extensions: HashSet<String>,
}

impl GpuContext {
    pub fn new(gl: glow::Context) -> Self {
        use glow::HasContext;

        let extensions = gl.supported_extensions().clone();
        log::debug!("GL extensions: {}", extensions.len());
        Self {
            gl: Rc::new(gl),
            extensions,
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    /// Matches both WebGL (`OES_x`) and native (`GL_OES_x`) spellings.
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name) || self.extensions.contains(&format!("GL_{name}"))
    }

    pub fn supports_color_buffer_float(&self) -> bool {
        self.has_extension("EXT_color_buffer_float")
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

impl DeviceCapabilities for GpuContext {
    fn supports_render_format(&self, format: TextureFormat) -> bool {
        let config = TextureConfig {
            width: PROBE_SIZE,
            height: PROBE_SIZE,
            format,
            filter: Filter::Nearest,
        };
        match RenderTarget::new(self.gl(), config) {
            Ok(target) => {
                target.destroy(self.gl());
                true
            }
            Err(e) => {
                log::debug!("probe {format:?}: {e}");
                false
            }
        }
    }

    fn supports_float_linear_filtering(&self, precision: Precision) -> bool {
        match precision {
            // Half-float filtering is core in GLES 3.0 / WebGL2.
            Precision::Half => true,
            Precision::Full => self.has_extension("OES_texture_float_linear"),
        }
    }

    fn supports_standard_derivatives(&self) -> bool {
        // Core in GLSL ES 3.00; the extension only exists on WebGL1.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_context_is_a_capability_source() {
        fn _assert_api(ctx: &GpuContext) {
            let _device: &dyn DeviceCapabilities = ctx;
            let _gl: &glow::Context = ctx.gl();
            let _cloned: GpuContext = ctx.clone();
        }
    }

    #[test]
    #[ignore = "requires GL context"]
    fn probe_accepts_rgba16f_with_color_buffer_float() {
        // Would test: supports_render_format(Rgba/Half) is true when
        // EXT_color_buffer_float is present.
    }

    #[test]
    #[ignore = "requires GL context"]
    fn probe_leaves_no_bound_framebuffer() {
        // Would test: FRAMEBUFFER_BINDING is null after a probe.
    }
}
