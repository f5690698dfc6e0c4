//! CLI errors and their exit codes.
//!
//! - 0:  success
//! - 2:  clap argument error (before our code runs)
//! - 10: solver error (unsupported device, bad dimensions, bad config)
//! - 11: I/O error (PNG write)
//! - 12: input error (bad JSON params, bad flag values)
//! - 13: serialization error

use distort_fluid_core::FluidError;
use std::fmt;

/// Errors produced by CLI operations, each mapped to a distinct exit code.
#[derive(Debug)]
pub enum CliError {
    Fluid(FluidError),
    Io(String),
    Input(String),
    Serialization(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Fluid(_) => 10,
            CliError::Io(_) => 11,
            CliError::Input(_) => 12,
            CliError::Serialization(_) => 13,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Fluid(e) => write!(f, "{e}"),
            CliError::Io(msg) | CliError::Input(msg) | CliError::Serialization(msg) => {
                write!(f, "{msg}")
            }
        }
    }
}

impl From<FluidError> for CliError {
    fn from(e: FluidError) -> Self {
        match e {
            FluidError::ChannelMismatch(_) => CliError::Input(e.to_string()),
            other => CliError::Fluid(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distort_fluid_core::Channels;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            CliError::Fluid(FluidError::InvalidDimensions).exit_code(),
            CliError::Io("disk full".into()).exit_code(),
            CliError::Input("bad json".into()).exit_code(),
            CliError::Serialization("oops".into()).exit_code(),
        ];
        assert_eq!(codes, [10, 11, 12, 13]);
    }

    #[test]
    fn unsupported_device_is_a_solver_error() {
        let err = CliError::from(FluidError::UnsupportedFormat {
            requested: Channels::Rgba,
        });
        assert_eq!(err.exit_code(), 10);
        assert!(err.to_string().contains("Rgba"));
    }

    #[test]
    fn bad_channel_count_is_an_input_error() {
        let err = CliError::from(FluidError::ChannelMismatch(3));
        assert_eq!(err.exit_code(), 12);
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn serde_errors_route_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        assert_eq!(CliError::from(bad).exit_code(), 13);
    }
}
