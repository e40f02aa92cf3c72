//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the account behind a JWT Bearer token.

pub mod auth;
