//! Per-page session context: the store handle plus the state that lives only as long as the
//! page (positional index, last-seen settings, pending user timestamps).
//!
//! `Session` is the [`EventHandler`] that persists interceptor events. Register it in a
//! `HandlerChain` and call [`Session::navigate`] when the user switches conversation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use lens_core::{
    conversation_key, EventHandler, GenerationSettings, HandlerResponse, MetadataEvent,
    MetadataPatch, Result, Role, TimestampSource,
};
use storage::{MetadataStore, UpsertOutcome};
use tracing::{debug, info};
use uuid::Uuid;

use crate::index_map::IndexMap;

#[derive(Debug, Default)]
struct SessionState {
    character_id: Option<String>,
    conversation_id: Option<String>,
    index: IndexMap,
    last_settings: Option<GenerationSettings>,
    /// `(conversation key, timestamp)` of user sends whose message id is not known yet.
    pending_user_timestamps: VecDeque<(String, i64)>,
}

pub struct Session {
    id: Uuid,
    store: MetadataStore,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        store: MetadataStore,
        character_id: Option<String>,
        conversation_id: Option<String>,
    ) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            store,
            state: Mutex::new(SessionState::default()),
        };
        session.navigate(character_id, conversation_id);
        session
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Switches to another character or conversation. Page-lifetime state is dropped.
    pub fn navigate(&self, character_id: Option<String>, conversation_id: Option<String>) {
        let character_id = character_id.filter(|c| !c.trim().is_empty());
        info!(session = %self.id, ?character_id, ?conversation_id, "Session navigated");
        *self.state() = SessionState {
            character_id,
            conversation_id,
            ..SessionState::default()
        };
    }

    pub fn character_id(&self) -> Option<String> {
        self.state().character_id.clone()
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.state().conversation_id.clone()
    }

    pub fn index(&self) -> IndexMap {
        self.state().index.clone()
    }

    pub fn last_settings(&self) -> Option<GenerationSettings> {
        self.state().last_settings.clone()
    }

    pub fn pending_user_timestamps(&self) -> usize {
        self.state().pending_user_timestamps.len()
    }

    /// Oldest pending user send of `conversation_id`, removed from the queue.
    pub fn take_pending_user_timestamp(&self, conversation_id: Option<&str>) -> Option<i64> {
        let key = conversation_key(conversation_id);
        let mut state = self.state();
        let position = state
            .pending_user_timestamps
            .iter()
            .position(|(conversation, _)| conversation == key)?;
        state
            .pending_user_timestamps
            .remove(position)
            .map(|(_, timestamp)| timestamp)
    }

    /// Conversation an event belongs to: its own id, else the session's.
    fn event_conversation(&self, event: &MetadataEvent) -> Option<String> {
        event
            .conversation_id()
            .map(str::to_string)
            .or_else(|| self.conversation_id())
    }

    /// True when `conversation_id` is the one on screen. A session without a conversation
    /// adopts the first one it sees.
    fn is_current(&self, conversation_id: Option<&str>) -> bool {
        let mut state = self.state();
        if state.conversation_id.is_none() {
            if let Some(incoming) = conversation_id {
                state.conversation_id = Some(incoming.to_string());
                return true;
            }
        }
        conversation_key(state.conversation_id.as_deref()) == conversation_key(conversation_id)
    }

    async fn on_messages_loaded(
        &self,
        conversation_id: Option<String>,
        records: &[lens_core::LoadedMessage],
    ) {
        if self.is_current(conversation_id.as_deref()) {
            self.state().index.rebuild_from_newest_first(records);
        } else {
            debug!(session = %self.id, ?conversation_id, "List of another conversation; index kept");
        }

        let character_id = self.character_id();
        let mut written = 0usize;
        for loaded in records {
            let outcome = self
                .store
                .upsert(
                    character_id.as_deref(),
                    conversation_id.as_deref(),
                    &loaded.message_id,
                    loaded.patch.clone(),
                )
                .await;
            if outcome.is_write() {
                written += 1;
            }
        }
        info!(
            session = %self.id,
            ?conversation_id,
            count = records.len(),
            written,
            "step: list persisted"
        );
    }

    async fn on_new_message(&self, event: &MetadataEvent, conversation_id: Option<String>) {
        let Some((message_id, patch)) = event.new_message_patch() else {
            return;
        };
        if let Some(settings) = patch.settings.clone() {
            self.state().last_settings = Some(settings);
        }
        if self.is_current(conversation_id.as_deref()) {
            self.state().index.append(message_id, patch.role);
        }

        let character_id = self.character_id();
        let outcome = self
            .store
            .upsert(
                character_id.as_deref(),
                conversation_id.as_deref(),
                message_id,
                patch,
            )
            .await;
        info!(
            session = %self.id,
            message_id,
            outcome = outcome.as_str(),
            "step: new message persisted"
        );
    }

    /// Gives a user message its send-time timestamp if the store has none yet.
    pub async fn fill_user_timestamp(&self, message_id: &str) -> UpsertOutcome {
        let Some(character_id) = self.character_id() else {
            return UpsertOutcome::Rejected;
        };
        let conversation_id = self.conversation_id();
        let existing = self
            .store
            .get(&character_id, conversation_id.as_deref(), message_id)
            .await;
        if existing.and_then(|r| r.timestamp).is_some() {
            return UpsertOutcome::Unchanged;
        }
        let Some(timestamp) = self.take_pending_user_timestamp(conversation_id.as_deref()) else {
            return UpsertOutcome::Unchanged;
        };

        let patch = MetadataPatch::role(Role::User).with_timestamp(timestamp, TimestampSource::Sent);
        let outcome = self
            .store
            .upsert(
                Some(&character_id),
                conversation_id.as_deref(),
                message_id,
                patch,
            )
            .await;
        debug!(session = %self.id, message_id, timestamp, "User message timestamp assigned");
        outcome
    }
}

#[async_trait]
impl EventHandler for Session {
    async fn handle(&self, event: &MetadataEvent) -> Result<HandlerResponse> {
        let conversation_id = self.event_conversation(event);
        match event {
            MetadataEvent::MessagesLoaded { records, .. } => {
                self.on_messages_loaded(conversation_id, records).await;
            }
            MetadataEvent::NewMessage { .. } => {
                self.on_new_message(event, conversation_id).await;
            }
            MetadataEvent::UserMessageSent { timestamp, .. } => {
                let key = conversation_key(conversation_id.as_deref()).to_string();
                self.state().pending_user_timestamps.push_back((key, *timestamp));
                debug!(session = %self.id, timestamp, "User send queued");
            }
        }
        Ok(HandlerResponse::Continue)
    }
}
