use std::sync::Arc;

use wk_domain::config::Config;
use wk_engine::Engine;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Engine,
}
