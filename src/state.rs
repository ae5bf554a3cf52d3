use {
    crate::{Authentication, BlockFetcher, Config, Renderer, routes::RouteIndex},
    axum::extract::FromRef,
    std::{
        sync::{Arc, OnceLock},
        time::SystemTime,
    },
};

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub views: Renderer,
    pub auth: Authentication,
    pub blocks: Option<BlockFetcher>,
    /// Filled once the route table is assembled.
    pub paths: Arc<OnceLock<RouteIndex>>,
    pub started: SystemTime,
    /// `RUST_ENV` at startup.
    pub environment: String,
}

impl AppState {
    pub fn paths(&self) -> RouteIndex {
        self.paths.get().cloned().unwrap_or_default()
    }
}

impl FromRef<AppState> for Authentication {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Renderer {
    fn from_ref(state: &AppState) -> Self {
        state.views.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
