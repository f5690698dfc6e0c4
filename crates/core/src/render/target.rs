//! Framebuffer + texture pair backing one solver field.

use glam::Vec2;

use super::texture::{create_texture, TextureConfig};
use crate::capability::Precision;
use crate::error::FluidError;
use crate::grid::GridSpec;

/// An off-screen float render target.
///
/// Targets are sized once from their [`GridSpec`] and never resized; a
/// viewport change does not touch simulation storage.
#[derive(Debug)]
pub struct RenderTarget {
    fbo: glow::Framebuffer,
    texture: glow::Texture,
    config: TextureConfig,
}

impl RenderTarget {
    /// Creates the texture, attaches it as `COLOR_ATTACHMENT0` and checks
    /// framebuffer completeness.
    ///
    /// # Errors
    ///
    /// Returns [`FluidError::Gpu`] when allocation fails or the framebuffer
    /// is incomplete, which is how an unrenderable format shows up.
    #[allow(unsafe_code)]
    pub fn new(gl: &glow::Context, config: TextureConfig) -> Result<Self, FluidError> {
        use glow::HasContext;

        let texture = create_texture(gl, &config)?;

        // SAFETY: texture is a live handle from create_texture; the FBO is
        // unbound again before returning and both are deleted on failure.
        let fbo = match unsafe { gl.create_framebuffer() } {
            Ok(fbo) => fbo,
            Err(e) => {
                unsafe { gl.delete_texture(texture) };
                return Err(FluidError::Gpu(e));
            }
        };

        let status = unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            status
        };

        if status != glow::FRAMEBUFFER_COMPLETE {
            unsafe {
                gl.delete_framebuffer(fbo);
                gl.delete_texture(texture);
            }
            return Err(FluidError::Gpu(format!(
                "{:?} framebuffer incomplete: status 0x{status:04X}",
                config.format
            )));
        }

        Ok(Self {
            fbo,
            texture,
            config,
        })
    }

    /// Target for a field spec at the negotiated precision.
    ///
    /// # Errors
    ///
    /// See [`RenderTarget::new`].
    pub fn for_spec(
        gl: &glow::Context,
        spec: &GridSpec,
        precision: Precision,
    ) -> Result<Self, FluidError> {
        Self::new(gl, TextureConfig::from_spec(spec, precision))
    }

    /// Makes this target the draw framebuffer and matches the viewport to it.
    #[allow(unsafe_code)]
    pub fn bind(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.fbo is a live handle created in new().
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.viewport(0, 0, self.config.width as i32, self.config.height as i32);
        }
    }

    pub fn texture(&self) -> glow::Texture {
        self.texture
    }

    pub fn config(&self) -> &TextureConfig {
        &self.config
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.config.width as f32, 1.0 / self.config.height as f32)
    }

    /// Releases the framebuffer and texture. GL objects are not freed on drop.
    #[allow(unsafe_code)]
    pub fn destroy(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: both handles were created in new() and are deleted once.
        unsafe {
            gl.delete_framebuffer(self.fbo);
            gl.delete_texture(self.texture);
        }
    }
}
