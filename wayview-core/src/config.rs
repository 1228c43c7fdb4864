//! Typed configuration for wayview.
//!
//! The process boundary admits no command-line flags, environment
//! variables, or persisted state, so there is no loader here: every fixed
//! literal the client uses (window title, default geometry, Vulkan
//! application identity) lives in these structs' `Default` impls, and
//! `validate()` is the single place the invariants on them are stated.

use crate::error::ConfigError;

/// Default surface size in device pixels, used until the compositor
/// negotiates another one.
pub const DEFAULT_WIDTH: u32 = 200;
pub const DEFAULT_HEIGHT: u32 = 200;

/// Configuration for the on-screen window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Title handed to the shell on toplevel creation.
    pub title: String,
    /// Initial surface width in pixels; must be >= 1.
    pub width: u32,
    /// Initial surface height in pixels; must be >= 1.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "wayview".to_owned(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl WindowConfig {
    /// Checks the invariants on this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.is_empty() {
            return Err(ConfigError::EmptyTitle);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// Configuration for the Vulkan context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Application name reported in `VkApplicationInfo`.
    pub application_name: String,
    /// Engine name reported in `VkApplicationInfo`.
    pub engine_name: String,
    /// Whether the Khronos validation layer is required and enabled.
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "wayview".to_owned(),
            engine_name: "NoEngine".to_owned(),
            validation: cfg!(debug_assertions),
        }
    }
}

impl RendererConfig {
    /// Checks the invariants on this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::EmptyName {
                field: "application name",
            });
        }
        if self.engine_name.is_empty() {
            return Err(ConfigError::EmptyName {
                field: "engine name",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn window_defaults_are_valid() {
        let config = WindowConfig::default();
        assert_eq!(config.width, 200);
        assert_eq!(config.height, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_dimension_is_rejected() {
        let config = WindowConfig {
            height: 0,
            ..WindowConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions { width: 200, height: 0 })
        ));
    }

    #[test]
    fn empty_title_is_rejected() {
        let config = WindowConfig {
            title: String::new(),
            ..WindowConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTitle)));
    }

    #[test]
    fn renderer_defaults_are_valid() {
        let config = RendererConfig::default();
        assert_eq!(config.engine_name, "NoEngine");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_renderer_names_are_rejected() {
        let config = RendererConfig {
            application_name: String::new(),
            ..RendererConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
