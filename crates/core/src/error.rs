//! Error types for the fluid core.

use crate::capability::Channels;
use thiserror::Error;

#[cfg(feature = "render")]
use crate::render::ShaderError;

/// Errors produced while building or running a fluid simulation.
///
/// Everything except [`FluidError::Gpu`] surfaces at initialization time.
/// Numerical blow-up is never reported.
#[derive(Debug, Error)]
pub enum FluidError {
    /// No texture format in the fallback chain could be rendered to.
    /// The simulation cannot start.
    #[error("no renderable float texture format for {requested:?} after exhausting the fallback chain")]
    UnsupportedFormat { requested: Channels },

    /// A grid or viewport was given a zero width or height.
    #[error("invalid dimensions: width and height must be non-zero")]
    InvalidDimensions,

    /// A configuration value is out of its accepted range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A grid was created with a channel count other than 1, 2 or 4.
    #[error("unsupported channel count {0}: grids store 1, 2 or 4 channels")]
    ChannelMismatch(usize),

    /// A GL object could not be created or a framebuffer was incomplete.
    #[error("gpu error: {0}")]
    Gpu(String),

    /// A solver program failed to compile or link.
    #[cfg(feature = "render")]
    #[error(transparent)]
    Shader(#[from] ShaderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_requested_channels() {
        let err = FluidError::UnsupportedFormat {
            requested: Channels::Rgba,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Rgba"), "missing channel name in: {msg}");
        assert!(msg.contains("fallback"), "missing fallback hint in: {msg}");
    }

    #[test]
    fn invalid_dimensions_displays_readable_message() {
        let msg = format!("{}", FluidError::InvalidDimensions);
        assert!(
            msg.contains("width") && msg.contains("height"),
            "expected message mentioning width and height, got: {msg}"
        );
    }

    #[test]
    fn invalid_config_includes_message() {
        let err = FluidError::InvalidConfig("dt must be finite".into());
        assert!(format!("{err}").contains("dt must be finite"));
    }

    #[test]
    fn channel_mismatch_includes_count() {
        let msg = format!("{}", FluidError::ChannelMismatch(3));
        assert!(msg.contains('3'), "missing count in: {msg}");
    }

    #[test]
    fn gpu_error_includes_message() {
        let err = FluidError::Gpu("framebuffer incomplete: status 0x8CD6".into());
        assert!(format!("{err}").contains("0x8CD6"));
    }

    #[test]
    fn fluid_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FluidError>();
    }

    #[test]
    fn fluid_error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<FluidError>();
    }
}
