//! Generation kinds and their request payloads.
//!
//! Each kind accepts a fixed JSON shape. [`parse_payload`] turns the raw
//! request body into a typed [`GenerationRequest`], rejecting anything that
//! does not fit with [`CoreError::InvalidPayload`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a prompt or topic, in characters.
pub const MAX_PROMPT_LEN: usize = 4000;

/// Maximum length of short identifier-like fields (model, style).
const MAX_LABEL_LEN: usize = 64;

/// Video duration bounds in seconds (inclusive).
pub const MIN_VIDEO_DURATION_SECS: u32 = 1;
pub const MAX_VIDEO_DURATION_SECS: u32 = 60;

/// Content types accepted by the auto-content generator.
pub const AUTO_CONTENT_TYPES: &[&str] = &["blog", "social", "email", "script", "article"];

// ---------------------------------------------------------------------------
// GenerationKind
// ---------------------------------------------------------------------------

/// The kind of generation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationKind {
    Text,
    Image,
    Video,
    AutoContent,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 4] = [
        GenerationKind::Text,
        GenerationKind::Image,
        GenerationKind::Video,
        GenerationKind::AutoContent,
    ];

    /// Canonical upper-case name, also used as the database value.
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Text => "TEXT",
            GenerationKind::Image => "IMAGE",
            GenerationKind::Video => "VIDEO",
            GenerationKind::AutoContent => "AUTO_CONTENT",
        }
    }

    /// URL path segment, e.g. `auto-content` in `/api/generators/auto-content`.
    pub fn slug(self) -> &'static str {
        match self {
            GenerationKind::Text => "text",
            GenerationKind::Image => "image",
            GenerationKind::Video => "video",
            GenerationKind::AutoContent => "auto-content",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown generation kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub prompt: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub prompt: String,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPayload {
    pub prompt: String,
    /// Requested clip length in seconds.
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoContentPayload {
    pub topic: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// A validated, typed generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    Text(TextPayload),
    Image(ImagePayload),
    Video(VideoPayload),
    AutoContent(AutoContentPayload),
}

impl GenerationRequest {
    pub fn kind(&self) -> GenerationKind {
        match self {
            GenerationRequest::Text(_) => GenerationKind::Text,
            GenerationRequest::Image(_) => GenerationKind::Image,
            GenerationRequest::Video(_) => GenerationKind::Video,
            GenerationRequest::AutoContent(_) => GenerationKind::AutoContent,
        }
    }
}

/// Parse and validate a raw JSON payload for the given kind.
pub fn parse_payload(
    kind: GenerationKind,
    payload: &serde_json::Value,
) -> Result<GenerationRequest, CoreError> {
    if !payload.is_object() {
        return Err(CoreError::InvalidPayload(
            "Payload must be a JSON object".into(),
        ));
    }

    let request = match kind {
        GenerationKind::Text => {
            let p: TextPayload = decode(kind, payload)?;
            validate_text("prompt", &p.prompt, MAX_PROMPT_LEN)?;
            validate_text("model", &p.model, MAX_LABEL_LEN)?;
            GenerationRequest::Text(p)
        }
        GenerationKind::Image => {
            let p: ImagePayload = decode(kind, payload)?;
            validate_text("prompt", &p.prompt, MAX_PROMPT_LEN)?;
            validate_text("style", &p.style, MAX_LABEL_LEN)?;
            GenerationRequest::Image(p)
        }
        GenerationKind::Video => {
            let p: VideoPayload = decode(kind, payload)?;
            validate_text("prompt", &p.prompt, MAX_PROMPT_LEN)?;
            if !(MIN_VIDEO_DURATION_SECS..=MAX_VIDEO_DURATION_SECS).contains(&p.duration) {
                return Err(CoreError::InvalidPayload(format!(
                    "duration must be between {MIN_VIDEO_DURATION_SECS} and \
                     {MAX_VIDEO_DURATION_SECS} seconds"
                )));
            }
            GenerationRequest::Video(p)
        }
        GenerationKind::AutoContent => {
            let p: AutoContentPayload = decode(kind, payload)?;
            validate_text("topic", &p.topic, MAX_PROMPT_LEN)?;
            if !AUTO_CONTENT_TYPES.contains(&p.content_type.as_str()) {
                return Err(CoreError::InvalidPayload(format!(
                    "type must be one of: {}",
                    AUTO_CONTENT_TYPES.join(", ")
                )));
            }
            GenerationRequest::AutoContent(p)
        }
    };

    Ok(request)
}

/// Validate without keeping the typed request.
pub fn validate_payload(kind: GenerationKind, payload: &serde_json::Value) -> Result<(), CoreError> {
    parse_payload(kind, payload).map(|_| ())
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: GenerationKind,
    payload: &serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| CoreError::InvalidPayload(format!("{kind} payload: {e}")))
}

fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidPayload(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_len {
        return Err(CoreError::InvalidPayload(format!(
            "{field} must not exceed {max_len} characters"
        )));
    }
    Ok(())
}
