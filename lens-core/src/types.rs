//! Core types: role, generation settings, metadata record / patch, profile.

use serde::{Deserialize, Serialize};

/// Conversation key used when the host page does not expose a conversation id.
pub const DEFAULT_CONVERSATION: &str = "__default__";

/// Separator between requested and actual model in a composite model value.
pub const MODEL_SEPARATOR: &str = " → ";

/// Token that marks a model value as composite.
const COMPOSITE_TOKEN: char = '→';

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Bot,
    User,
}

impl Role {
    /// Maps the host's author labels to a role. Unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "bot" | "assistant" | "model" | "char" | "character" => Some(Role::Bot),
            "user" | "human" => Some(Role::User),
            _ => None,
        }
    }
}

/// Sampling parameters of a bot generation. Every field is optional; the host only reports what it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

impl GenerationSettings {
    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none()
            && self.temperature.is_none()
            && self.top_p.is_none()
            && self.top_k.is_none()
    }

    /// Fills fields that are `None` here from `other`. Returns true when anything changed.
    pub fn fill_missing(&mut self, other: &GenerationSettings) -> bool {
        let before = self.clone();
        self.max_tokens = self.max_tokens.or(other.max_tokens);
        self.temperature = self.temperature.or(other.temperature);
        self.top_p = self.top_p.or(other.top_p);
        self.top_k = self.top_k.or(other.top_k);
        *self != before
    }
}

/// Where a timestamp was observed. `Sent` is captured at send time and is the precise source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    Sent,
    #[default]
    Listed,
}

/// Stored metadata for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Message creation time, epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_source: Option<TimestampSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_alternative: Option<bool>,
}

impl MetadataRecord {
    pub fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
        }
    }

    pub fn set_settings(&mut self, settings: &GenerationSettings) {
        self.max_tokens = settings.max_tokens;
        self.temperature = settings.temperature;
        self.top_p = settings.top_p;
        self.top_k = settings.top_k;
    }

    /// True when `model` carries the "requested → actual" form.
    pub fn has_composite_model(&self) -> bool {
        self.model.as_deref().is_some_and(is_composite_model)
    }
}

impl From<MetadataPatch> for MetadataRecord {
    fn from(patch: MetadataPatch) -> Self {
        let settings = patch.settings.unwrap_or_default();
        Self {
            role: patch.role,
            model: patch.model,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            timestamp_source: patch.timestamp.map(|_| patch.timestamp_source),
            timestamp: patch.timestamp,
            is_alternative: patch.is_alternative,
        }
    }
}

/// Partial update for a [`MetadataRecord`]. Absent fields mean "unknown", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub settings: Option<GenerationSettings>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub timestamp_source: TimestampSource,
    #[serde(default)]
    pub is_alternative: Option<bool>,
}

impl MetadataPatch {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64, source: TimestampSource) -> Self {
        self.timestamp = Some(timestamp);
        self.timestamp_source = source;
        self
    }

    pub fn with_alternative(mut self, is_alternative: bool) -> Self {
        self.is_alternative = Some(is_alternative);
        self
    }

    pub fn has_composite_model(&self) -> bool {
        self.model.as_deref().is_some_and(is_composite_model)
    }
}

/// Named bundle of sampling parameters and a model, stored flat by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub settings: GenerationSettings,
}

pub fn is_composite_model(model: &str) -> bool {
    model.contains(COMPOSITE_TOKEN)
}

/// Display value for a generation's model.
///
/// `requested` when both agree or `actual` is unknown, `actual` when nothing was requested,
/// otherwise `"requested → actual"`.
pub fn compose_model(requested: Option<&str>, actual: Option<&str>) -> Option<String> {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty());
    let actual = actual.map(str::trim).filter(|s| !s.is_empty());
    match (requested, actual) {
        (None, None) => None,
        (Some(r), None) => Some(r.to_string()),
        (None, Some(a)) => Some(a.to_string()),
        (Some(r), Some(a)) if r == a => Some(r.to_string()),
        (Some(r), Some(a)) => Some(format!("{r}{MODEL_SEPARATOR}{a}")),
    }
}

/// Conversation key for storage: the given id, or [`DEFAULT_CONVERSATION`] when absent or blank.
pub fn conversation_key(conversation_id: Option<&str>) -> &str {
    match conversation_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => DEFAULT_CONVERSATION,
    }
}
