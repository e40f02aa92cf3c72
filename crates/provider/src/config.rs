use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Stub,
    Http,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(ProviderKind::Stub),
            "http" => Ok(ProviderKind::Http),
            other => Err(format!("unknown provider '{other}' (expected stub or http)")),
        }
    }
}

/// Provider selection loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL of the generation service (HTTP provider only).
    pub url: String,
    /// Bearer token sent to the generation service, if any.
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Stub,
            url: String::new(),
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// | Env Var            | Default            |
    /// |--------------------|--------------------|
    /// | `PROVIDER`         | `stub`             |
    /// | `PROVIDER_URL`     | required for http  |
    /// | `PROVIDER_API_KEY` | (unset)            |
    pub fn from_env() -> Self {
        let kind: ProviderKind = std::env::var("PROVIDER")
            .unwrap_or_else(|_| "stub".into())
            .parse()
            .expect("PROVIDER must be 'stub' or 'http'");

        let url = std::env::var("PROVIDER_URL")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        if kind == ProviderKind::Http && url.is_empty() {
            panic!("PROVIDER_URL must be set when PROVIDER=http");
        }

        let api_key = std::env::var("PROVIDER_API_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        Self { kind, url, api_key }
    }
}
