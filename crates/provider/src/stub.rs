//! Deterministic provider returning placeholder outputs.

use async_trait::async_trait;
use chrono::Utc;
use goldrush_core::generation::{parse_payload, GenerationKind, GenerationRequest};

use crate::{GenerationOutput, GenerationProvider, ProviderError};

#[derive(Debug, Default, Clone)]
pub struct StubProvider;

impl StubProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    async fn generate(
        &self,
        kind: GenerationKind,
        payload: &serde_json::Value,
    ) -> Result<GenerationOutput, ProviderError> {
        let request =
            parse_payload(kind, payload).map_err(|e| ProviderError::Permanent(e.to_string()))?;
        let ts = Utc::now().timestamp_millis();

        let output = match request {
            GenerationRequest::Text(p) => GenerationOutput::Text(format!(
                "Generated text for prompt: {} using model: {}",
                p.prompt, p.model
            )),
            GenerationRequest::Image(_) => {
                GenerationOutput::ImageUrl(format!("https://example.com/generated-image-{ts}.jpg"))
            }
            GenerationRequest::Video(_) => {
                GenerationOutput::VideoUrl(format!("https://example.com/generated-video-{ts}.mp4"))
            }
            GenerationRequest::AutoContent(p) => GenerationOutput::Content(format!(
                "Generated {} content for topic: {}",
                p.content_type, p.topic
            )),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn text_echoes_prompt_and_model() {
        let out = StubProvider::new()
            .generate(GenerationKind::Text, &json!({ "prompt": "hello", "model": "gpt-4" }))
            .await
            .unwrap();
        assert_eq!(
            out,
            GenerationOutput::Text("Generated text for prompt: hello using model: gpt-4".into())
        );
    }

    #[tokio::test]
    async fn media_kinds_return_urls() {
        let provider = StubProvider::new();
        let image = provider
            .generate(GenerationKind::Image, &json!({ "prompt": "cat", "style": "anime" }))
            .await
            .unwrap();
        assert_matches!(image, GenerationOutput::ImageUrl(url) if url.starts_with("https://example.com/generated-image-") && url.ends_with(".jpg"));

        let video = provider
            .generate(GenerationKind::Video, &json!({ "prompt": "sea", "duration": 5 }))
            .await
            .unwrap();
        assert_matches!(video, GenerationOutput::VideoUrl(url) if url.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn auto_content_names_type_and_topic() {
        let out = StubProvider::new()
            .generate(GenerationKind::AutoContent, &json!({ "topic": "rust", "type": "blog" }))
            .await
            .unwrap();
        assert_eq!(out, GenerationOutput::Content("Generated blog content for topic: rust".into()));
    }

    #[tokio::test]
    async fn malformed_payload_is_permanent() {
        let err = StubProvider::new()
            .generate(GenerationKind::Text, &json!({}))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
