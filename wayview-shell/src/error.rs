//! Error types for the Wayland session.

use thiserror::Error;

/// Fatal session failures. Anything not represented here (unknown
/// globals, global removal, keymap/modifier/repeat events, seat names,
/// buffer releases) is deliberately accepted without effect.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connecting to the compositor socket failed.
    #[error("failed to connect to the Wayland display")]
    Connect(#[from] wayland_client::ConnectError),

    /// The dispatch loop hit a protocol or I/O error.
    #[error("wayland dispatch failed")]
    Dispatch(#[from] wayland_client::DispatchError),

    /// A required global was never advertised; surfaces at first use, not
    /// at bind time.
    #[error("required global `{0}` was never advertised by the compositor")]
    MissingGlobal(&'static str),

    /// Every randomized shared-memory name collided within the retry
    /// bound.
    #[error("shared memory object creation failed after {attempts} attempts")]
    ShmNameExhausted {
        attempts: u32,
        #[source]
        source: nix::Error,
    },

    /// A shared-memory syscall (open/truncate) failed.
    #[error("shared memory setup failed")]
    Shm(#[from] nix::Error),

    /// Mapping the pixel buffer into process memory failed.
    #[error("mapping the pixel buffer failed")]
    Map(#[from] std::io::Error),
}
