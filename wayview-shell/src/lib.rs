//! # wayview-shell
//!
//! The Wayland side of wayview: binds the compositor globals, manages the
//! shared-memory pixel buffer across resizes, drives the xdg-shell
//! configure/ack handshake and frame pacing, routes keyboard input to the
//! close flag, and owns the blocking dispatch loop plus ordered teardown.
//!
//! Everything runs on one thread. The [`Session`] is the single owned
//! state object handed to every protocol callback.

pub mod error;
mod input;
mod registry;
pub mod session;
mod shm;

pub use error::SessionError;
pub use session::Session;
