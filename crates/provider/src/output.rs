use goldrush_core::generation::GenerationKind;
use serde::{Deserialize, Serialize};

/// What a provider produced. Serializes as a one-field object keyed the way
/// the generator endpoints respond (`{"text": ...}`, `{"imageUrl": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GenerationOutput {
    Text(String),
    ImageUrl(String),
    VideoUrl(String),
    Content(String),
}

impl GenerationOutput {
    pub fn kind(&self) -> GenerationKind {
        match self {
            GenerationOutput::Text(_) => GenerationKind::Text,
            GenerationOutput::ImageUrl(_) => GenerationKind::Image,
            GenerationOutput::VideoUrl(_) => GenerationKind::Video,
            GenerationOutput::Content(_) => GenerationKind::AutoContent,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
