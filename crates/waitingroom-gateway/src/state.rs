//! Shared state handed to every request handler.

use std::sync::Arc;

use waitingroom_core::{Config, CookieCodec, Waitingroom};

/// Everything a handler needs: the engine, the cookie codec, and the
/// configuration they were built from.
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Waitingroom>,
    pub codec: Arc<CookieCodec>,
}

/// Cheap-to-clone handle used as the axum state.
pub type SharedState = Arc<AppState>;
