//! Goldrush API server library.
//!
//! Exposes config, state, error handling, routes and background services so
//! integration tests and the binary entrypoint build the same app.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
