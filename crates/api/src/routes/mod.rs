pub mod auth;
pub mod generators;
pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /auth/signup                         create account (public)
/// /auth/signin                         sign in (public)
///
/// /subscription                        plan, balance, queue position
///
/// /generators/{kind}                   text | image | video | auto-content
///
/// /jobs                                list own jobs
/// /jobs/{id}                           get job
/// /jobs/{id}/cancel                    cancel a queued job
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .route(
            "/subscription",
            get(handlers::subscription::get_subscription),
        )
        .nest("/generators", generators::router())
        .nest("/jobs", jobs::router())
}
