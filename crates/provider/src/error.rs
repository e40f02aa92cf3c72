/// Errors from a generation provider, classified for the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Worth retrying: network failures, 5xx, rate limiting.
    #[error("{0}")]
    Transient(String),

    /// Retrying will not help: the provider rejected the request.
    #[error("{0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify an HTTP status from the provider. `None` for success.
    pub fn from_status(status: u16, body: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            429 | 500..=599 => Some(ProviderError::Transient(format!(
                "Provider returned {status}: {body}"
            ))),
            _ => Some(ProviderError::Permanent(format!(
                "Provider returned {status}: {body}"
            ))),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() {
            ProviderError::Permanent(format!("Provider request failed: {e}"))
        } else {
            ProviderError::Transient(format!("Provider request failed: {e}"))
        }
    }
}
