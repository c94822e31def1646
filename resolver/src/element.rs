//! Host DOM abstraction: what the resolver needs to know about a rendered message.

use lens_core::{GenerationSettings, MetadataRecord, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata rendered next to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub message_id: String,
    pub role: Option<Role>,
    pub model: Option<String>,
    pub settings: GenerationSettings,
    pub timestamp: Option<i64>,
    pub is_alternative: Option<bool>,
}

impl Annotation {
    pub fn new(message_id: impl Into<String>, record: &MetadataRecord) -> Self {
        Self {
            message_id: message_id.into(),
            role: record.role,
            model: record.model.clone(),
            settings: record.settings(),
            timestamp: record.timestamp,
            is_alternative: record.is_alternative,
        }
    }
}

/// A rendered node of the host page.
///
/// Handles are cheap clones pointing at the same node; equality means "same node".
/// Marker and annotation methods take `&self`: the page owns the node, the resolver only tags it.
pub trait MessageElement: Clone + PartialEq + Send + Sync {
    /// Attribute value on this node only.
    fn attribute(&self, name: &str) -> Option<String>;

    fn parent(&self) -> Option<Self>;

    /// Instance data the host's UI framework attached to this node, if any.
    fn framework_data(&self) -> Option<Value>;

    /// Serialized event-handler source of the interactive controls next to this message.
    fn handler_sources(&self) -> Vec<String>;

    /// True for bot messages, false for user messages.
    fn is_bot(&self) -> bool;

    /// False once the node was removed from the document.
    fn is_connected(&self) -> bool;

    fn is_processed(&self) -> bool;

    fn mark_processed(&self);

    fn clear_processed(&self);

    /// Model text of the annotation currently rendered on this node.
    fn rendered_model(&self) -> Option<String>;

    fn render(&self, annotation: &Annotation);
}
