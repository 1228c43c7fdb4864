//! # wayview-core
//!
//! Foundational layer for the wayview client: error types, logging
//! initialization, and the typed configuration defaults the rest of the
//! workspace reads its fixed literals from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{RendererConfig, WindowConfig};
pub use error::{ConfigError, CoreError};
