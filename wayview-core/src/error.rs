//! Error types for the wayview core layer.
//!
//! Defined with the `thiserror` crate. [`CoreError`] is the crate-level
//! error; [`ConfigError`] covers validation of the typed configuration.

use thiserror::Error;

/// Core error type for the wayview foundational layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration validation failed. Wraps a [`ConfigError`].
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The logging system could not be initialized.
    #[error("logging initialization failed: {0}")]
    LoggingInitialization(String),
}

/// Error type for configuration validation.
///
/// wayview carries no configuration files or CLI flags; these errors can
/// only arise from programmatic construction of a config value.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Window dimensions must both be at least 1 pixel.
    #[error("invalid window dimensions {width}x{height}: both must be >= 1")]
    InvalidDimensions { width: u32, height: u32 },

    /// The window title must not be empty.
    #[error("window title must not be empty")]
    EmptyTitle,

    /// The Vulkan application or engine name must not be empty.
    #[error("renderer {field} must not be empty")]
    EmptyName { field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn core_error_wraps_config_error_as_source() {
        let core_err = CoreError::from(ConfigError::EmptyTitle);

        assert_eq!(
            format!("{core_err}"),
            "configuration error: window title must not be empty"
        );
        assert!(core_err.source().is_some());
    }

    #[test]
    fn invalid_dimensions_display_names_both_axes() {
        let err = ConfigError::InvalidDimensions {
            width: 0,
            height: 300,
        };
        assert_eq!(
            format!("{err}"),
            "invalid window dimensions 0x300: both must be >= 1"
        );
    }
}
