use axum::routing::post;
use axum::Router;

use crate::handlers::generators;
use crate::state::AppState;

/// Routes mounted at `/generators`.
///
/// ```text
/// POST   /{kind}          -> generate
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{kind}", post(generators::generate))
}
