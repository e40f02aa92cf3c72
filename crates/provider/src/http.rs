//! REST client for an external generation service.
//!
//! Sends `POST {base_url}/generate/{slug}` with the job payload as the JSON
//! body and expects a one-field output object such as `{"text": "..."}`.

use async_trait::async_trait;
use goldrush_core::generation::GenerationKind;

use crate::{GenerationOutput, GenerationProvider, ProviderError};

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Turn a non-2xx response into a classified error.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ProviderError::from_status(status, &body)
            .unwrap_or_else(|| ProviderError::Permanent(format!("Provider returned {status}"))))
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &serde_json::Value,
    ) -> Result<GenerationOutput, ProviderError> {
        let mut request = self
            .client
            .post(format!("{}/generate/{}", self.base_url, kind.slug()))
            .json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = Self::ensure_success(request.send().await?).await?;
        let output: GenerationOutput = response.json().await?;

        if output.kind() != kind {
            return Err(ProviderError::Permanent(format!(
                "Provider returned {} output for a {kind} job",
                output.kind()
            )));
        }
        Ok(output)
    }
}
