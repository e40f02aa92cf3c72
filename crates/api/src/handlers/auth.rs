//! Handlers for the `/auth` resource (signup, signin).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use goldrush_core::error::CoreError;
use goldrush_core::plan::PlanTier;
use goldrush_core::store::{normalize_email, Account, AccountView, NewAccount};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::state::AppState;

/// New accounts start on this tier.
const SIGNUP_TIER: PlanTier = PlanTier::Free;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/signup`.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
}

/// Request body for `POST /auth/signin`.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: AccountView,
    pub token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/auth/signup
///
/// Create an account on the free tier, credit its plan grant, and return a
/// token. An already registered email is a 400, as clients expect.
pub async fn signup(
    State(state): State<AppState>,
    AppJson(input): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))?;

    let grant = state.engine.plans.plan(SIGNUP_TIER)?.credit_grant;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))?;

    let (account, _) = state
        .engine
        .stores
        .accounts
        .create_with_ledger(
            NewAccount {
                email: normalize_email(&input.email),
                name: input.name.trim().to_string(),
                password_hash,
                plan: SIGNUP_TIER,
            },
            grant,
        )
        .await
        .map_err(|e| match e {
            CoreError::Conflict(_) => AppError::BadRequest("User already exists".into()),
            other => AppError::Core(other),
        })?;

    tracing::info!(account_id = account.id, plan = %account.plan, grant, "Account created");

    let response = auth_response(&state, &account)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/signin
pub async fn signin(
    State(state): State<AppState>,
    AppJson(input): AppJson<SigninRequest>,
) -> AppResult<Json<AuthResponse>> {
    let invalid = || AppError::Core(CoreError::Unauthorized("Invalid credentials".into()));

    let account = state
        .engine
        .stores
        .accounts
        .find_by_email(&input.email)
        .await?
        .ok_or_else(invalid)?;

    let valid = verify_password(&input.password, &account.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification failed: {e}")))?;
    if !valid {
        return Err(invalid());
    }

    if !account.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is disabled".into(),
        )));
    }

    tracing::info!(account_id = account.id, "Account signed in");
    Ok(Json(auth_response(&state, &account)?))
}

fn auth_response(state: &AppState, account: &Account) -> AppResult<AuthResponse> {
    let token = generate_token(account.id, &account.email, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation failed: {e}")))?;
    Ok(AuthResponse {
        user: AccountView::from(account),
        token,
    })
}
