//! Float texture creation for solver fields.
//!
//! A [`TextureConfig`] is derived from a field's [`GridSpec`] and the
//! negotiated precision, and maps onto the sized GL internal formats
//! (`R16F`, `RG16F`, `RGBA16F` and their 32-bit counterparts).

use crate::capability::{Channels, Precision, TextureFormat};
use crate::error::FluidError;
use crate::grid::{Filter, GridSpec};

/// Everything needed to allocate one field texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureConfig {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: Filter,
}

impl TextureConfig {
    pub fn from_spec(spec: &GridSpec, precision: Precision) -> Self {
        Self {
            width: spec.width,
            height: spec.height,
            format: TextureFormat::new(spec.channels, precision),
            filter: spec.filter,
        }
    }

    /// Sized internal format, e.g. `glow::RG16F`.
    pub fn internal_format(&self) -> u32 {
        match (self.format.channels, self.format.precision) {
            (Channels::Rgba, Precision::Half) => glow::RGBA16F,
            (Channels::Rg, Precision::Half) => glow::RG16F,
            (Channels::R, Precision::Half) => glow::R16F,
            (Channels::Rgba, Precision::Full) => glow::RGBA32F,
            (Channels::Rg, Precision::Full) => glow::RG32F,
            (Channels::R, Precision::Full) => glow::R32F,
        }
    }

    /// Unsized pixel format matching the channel layout.
    pub fn pixel_format(&self) -> u32 {
        match self.format.channels {
            Channels::Rgba => glow::RGBA,
            Channels::Rg => glow::RG,
            Channels::R => glow::RED,
        }
    }

    pub fn pixel_type(&self) -> u32 {
        match self.format.precision {
            Precision::Half => glow::HALF_FLOAT,
            Precision::Full => glow::FLOAT,
        }
    }

    /// GL min/mag filter.
    pub fn gl_filter(&self) -> u32 {
        match self.filter {
            Filter::Linear => glow::LINEAR,
            Filter::Nearest => glow::NEAREST,
        }
    }
}

/// Allocates an uninitialised `CLAMP_TO_EDGE` texture for `config`.
///
/// # Errors
///
/// Returns [`FluidError::Gpu`] if the driver refuses to create the texture.
#[allow(unsafe_code)]
pub fn create_texture(
    gl: &glow::Context,
    config: &TextureConfig,
) -> Result<glow::Texture, FluidError> {
    use glow::HasContext;

    // SAFETY: glow exposes GL calls as unsafe; every enum passed below comes
    // from TextureConfig and the texture is unbound before returning.
    let texture = unsafe { gl.create_texture() }.map_err(FluidError::Gpu)?;

    unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        for (param, value) in [
            (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
            (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
            (glow::TEXTURE_MIN_FILTER, config.gl_filter()),
            (glow::TEXTURE_MAG_FILTER, config.gl_filter()),
        ] {
            gl.tex_parameter_i32(glow::TEXTURE_2D, param, value as i32);
        }
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            config.internal_format() as i32,
            config.width as i32,
            config.height as i32,
            0,
            config.pixel_format(),
            config.pixel_type(),
            glow::PixelUnpackData::Slice(None),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
    }

    Ok(texture)
}
