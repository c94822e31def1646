//! Metadata events produced by the interceptor and the handler trait that consumes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{GenerationSettings, MetadataPatch, Role, TimestampSource};

/// One message of a list exchange, already translated into a patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedMessage {
    pub message_id: String,
    pub patch: MetadataPatch,
}

impl LoadedMessage {
    pub fn role(&self) -> Option<Role> {
        self.patch.role
    }
}

/// Discrete observation emitted by the interceptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MetadataEvent {
    /// A full message list was observed. `records` keep the server order (newest first).
    #[serde(rename_all = "camelCase")]
    MessagesLoaded {
        conversation_id: Option<String>,
        records: Vec<LoadedMessage>,
    },
    /// The bot reply of a send exchange.
    #[serde(rename_all = "camelCase")]
    NewMessage {
        message_id: String,
        conversation_id: Option<String>,
        model: Option<String>,
        settings: GenerationSettings,
        timestamp: Option<i64>,
        role: Role,
    },
    /// The user pressed send; the user message id is not known yet.
    #[serde(rename_all = "camelCase")]
    UserMessageSent {
        timestamp: i64,
        conversation_id: Option<String>,
    },
}

impl MetadataEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataEvent::MessagesLoaded { .. } => "MessagesLoaded",
            MetadataEvent::NewMessage { .. } => "NewMessage",
            MetadataEvent::UserMessageSent { .. } => "UserMessageSent",
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            MetadataEvent::MessagesLoaded { conversation_id, .. }
            | MetadataEvent::NewMessage { conversation_id, .. }
            | MetadataEvent::UserMessageSent { conversation_id, .. } => conversation_id.as_deref(),
        }
    }

    /// Patch carried by a `NewMessage` event. Send-time timestamps are the precise source,
    /// and a send never reports an alternative.
    pub fn new_message_patch(&self) -> Option<(&str, MetadataPatch)> {
        match self {
            MetadataEvent::NewMessage {
                message_id,
                model,
                settings,
                timestamp,
                role,
                ..
            } => {
                let mut patch = MetadataPatch::role(*role).with_alternative(false);
                patch.model = model.clone();
                if !settings.is_empty() {
                    patch.settings = Some(settings.clone());
                }
                if let Some(ts) = timestamp {
                    patch = patch.with_timestamp(*ts, TimestampSource::Sent);
                }
                Some((message_id.as_str(), patch))
            }
            _ => None,
        }
    }
}

/// Result of a handler for the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Pass to next handler.
    Continue,
    /// Stop the chain.
    Stop,
    /// This handler did not care about the event; try next.
    Ignore,
}

/// Consumer of metadata events: optional before / handle / after.
/// The chain runs all before → handle until Stop → all after (reverse).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Runs before the handle phase. Return false to stop the chain.
    async fn before(&self, _event: &MetadataEvent) -> crate::error::Result<bool> {
        Ok(true)
    }
    /// Processes the event. Default: Continue.
    async fn handle(&self, _event: &MetadataEvent) -> crate::error::Result<HandlerResponse> {
        Ok(HandlerResponse::Continue)
    }
    /// Runs after the handle phase (reverse order), with the final response.
    async fn after(
        &self,
        _event: &MetadataEvent,
        _response: &HandlerResponse,
    ) -> crate::error::Result<()> {
        Ok(())
    }
}
