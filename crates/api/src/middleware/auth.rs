//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use goldrush_core::context::RequestContext;
use goldrush_core::error::CoreError;
use goldrush_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated account extracted from a JWT Bearer token in the
/// `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// From `claims.sub`.
    pub account_id: DbId,
    pub email: String,
    /// The `x-request-id` assigned by the request-id layer.
    pub request_id: Option<String>,
}

impl AuthUser {
    /// Caller identity for engine calls.
    pub fn context(&self) -> RequestContext {
        let ctx = RequestContext::new(self.account_id);
        match &self.request_id {
            Some(id) => ctx.with_request_id(id.clone()),
            None => ctx,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(AuthUser {
            account_id: claims.sub,
            email: claims.email,
            request_id,
        })
    }
}
