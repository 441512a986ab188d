//! Error types for the admission-control engine.

use thiserror::Error;

/// Errors surfaced by the core library.
///
/// `NotFound` replies from the shared store are never represented here: the
/// repository absorbs them into typed results (`Option`, `0`, `false`) at
/// its boundary. Everything else propagates.
#[derive(Debug, Error)]
pub enum Error {
    /// The shared store failed (connection, protocol, or command error).
    #[error("shared store: {0}")]
    Store(#[from] redis::RedisError),

    /// A sealed cookie could not be produced.
    #[error("cookie seal: {0}")]
    CookieSeal(String),

    /// A sealed cookie failed authentication or decoding.
    ///
    /// Handled in-band by the check protocol: the client is treated as
    /// fresh and the broken cookie is evicted.
    #[error("cookie open: {0}")]
    CookieOpen(String),

    /// The configuration is not usable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;
