use std::sync::Arc;

use goldrush_engine::Engine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    /// Present only with the PostgreSQL backend; used by the health check.
    pub pool: Option<goldrush_db::DbPool>,
    pub config: Arc<ServerConfig>,
}
