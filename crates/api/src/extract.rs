//! Request extractors with `{error, code}` rejections.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` whose rejections (missing fields, bad syntax, wrong
/// content type) answer 400 `VALIDATION_ERROR` instead of axum's plain-text
/// 4xx.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
