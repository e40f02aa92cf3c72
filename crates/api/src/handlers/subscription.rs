use axum::extract::State;
use axum::Json;
use goldrush_engine::Subscription;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/subscription
///
/// The caller's plan tier, gold balance and best queue position.
pub async fn get_subscription(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Subscription>> {
    let subscription = state
        .engine
        .subscriptions
        .subscription(auth.account_id)
        .await?;
    Ok(Json(subscription))
}
