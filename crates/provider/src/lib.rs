//! Generation provider adapters.
//!
//! The worker pool talks to the model backend only through
//! [`GenerationProvider`]. Two adapters ship here: a deterministic
//! [`StubProvider`] for development and tests, and an [`HttpProvider`] that
//! forwards requests to an external generation service.

pub mod config;
pub mod error;
pub mod http;
pub mod output;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use goldrush_core::generation::GenerationKind;

pub use config::{ProviderConfig, ProviderKind};
pub use error::ProviderError;
pub use http::HttpProvider;
pub use output::GenerationOutput;
pub use stub::StubProvider;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Run one generation. The caller bounds the call with a timeout.
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &serde_json::Value,
    ) -> Result<GenerationOutput, ProviderError>;
}

/// Build the provider selected by configuration.
pub fn build_provider(config: &ProviderConfig) -> Arc<dyn GenerationProvider> {
    match config.kind {
        ProviderKind::Stub => {
            tracing::info!("Using stub generation provider");
            Arc::new(StubProvider::new())
        }
        ProviderKind::Http => {
            tracing::info!(url = %config.url, "Using HTTP generation provider");
            Arc::new(HttpProvider::new(config.url.clone(), config.api_key.clone()))
        }
    }
}
