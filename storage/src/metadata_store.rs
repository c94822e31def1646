//! # Metadata store
//!
//! Nested `character → conversation → message → MetadataRecord` map, persisted as one JSON blob
//! under [`METADATA_KEY`] in a [`KvStore`]. The backing store is the single source of truth:
//! every operation reads it, nothing is cached between calls.
//!
//! `upsert`, `get` and `clear` never fail towards the caller. Backend and decoding errors are
//! logged and degrade to [`UpsertOutcome::Failed`], `None` or a no-op; the `try_*` variants
//! return them for callers that can report them (the CLI).

use std::collections::BTreeMap;
use std::sync::Arc;

use lens_core::{conversation_key, MetadataPatch, MetadataRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::kv::{get_json, set_json, KvStore};
use crate::merge::{merge, UpsertOutcome};

/// Key of the metadata blob in the backing store.
pub const METADATA_KEY: &str = "messageMetadata";

type Conversations = BTreeMap<String, BTreeMap<String, MetadataRecord>>;
type MetadataTree = BTreeMap<String, Conversations>;

#[derive(Clone)]
pub struct MetadataStore {
    backend: Arc<dyn KvStore>,
    /// Serializes read-modify-write cycles issued from different tasks.
    write_lock: Arc<Mutex<()>>,
}

impl MetadataStore {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self) -> Result<MetadataTree, StorageError> {
        get_json(self.backend.as_ref(), METADATA_KEY).await
    }

    /// Merges `incoming` into the record at the given key, creating it if needed.
    ///
    /// A missing or blank `character_id` (or `message_id`) drops the write. A missing
    /// `conversation_id` stores under [`lens_core::DEFAULT_CONVERSATION`].
    pub async fn try_upsert(
        &self,
        character_id: Option<&str>,
        conversation_id: Option<&str>,
        message_id: &str,
        incoming: MetadataPatch,
    ) -> Result<UpsertOutcome, StorageError> {
        let Some(character_id) = character_id.filter(|c| !c.trim().is_empty()) else {
            warn!(message_id, "Dropping metadata write without character id");
            return Ok(UpsertOutcome::Rejected);
        };
        if message_id.trim().is_empty() {
            warn!(character_id, "Dropping metadata write without message id");
            return Ok(UpsertOutcome::Rejected);
        }
        let conversation = conversation_key(conversation_id);

        let _guard = self.write_lock.lock().await;
        let mut tree = self.load().await?;
        let messages = tree
            .entry(character_id.to_string())
            .or_default()
            .entry(conversation.to_string())
            .or_default();

        let (record, outcome) = merge(messages.get(message_id), &incoming);
        if outcome != UpsertOutcome::Unchanged {
            messages.insert(message_id.to_string(), record);
            set_json(self.backend.as_ref(), METADATA_KEY, &tree).await?;
        }

        debug!(
            character_id,
            conversation_id = conversation,
            message_id,
            outcome = outcome.as_str(),
            "Metadata upsert"
        );
        Ok(outcome)
    }

    /// Like [`Self::try_upsert`], but backend failures are logged and reported as
    /// [`UpsertOutcome::Failed`].
    #[instrument(skip(self, incoming))]
    pub async fn upsert(
        &self,
        character_id: Option<&str>,
        conversation_id: Option<&str>,
        message_id: &str,
        incoming: MetadataPatch,
    ) -> UpsertOutcome {
        match self
            .try_upsert(character_id, conversation_id, message_id, incoming)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, message_id, "Metadata upsert failed");
                UpsertOutcome::Failed
            }
        }
    }

    pub async fn try_get(
        &self,
        character_id: &str,
        conversation_id: Option<&str>,
        message_id: &str,
    ) -> Result<Option<MetadataRecord>, StorageError> {
        let mut tree = self.load().await?;
        let record = tree
            .remove(character_id)
            .and_then(|mut conversations| conversations.remove(conversation_key(conversation_id)))
            .and_then(|mut messages| messages.remove(message_id));
        Ok(record)
    }

    /// Returns the stored record, or `None` if it was never written or the store is unreadable.
    pub async fn get(
        &self,
        character_id: &str,
        conversation_id: Option<&str>,
        message_id: &str,
    ) -> Option<MetadataRecord> {
        match self.try_get(character_id, conversation_id, message_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, message_id, "Metadata get failed");
                None
            }
        }
    }

    /// All records of one conversation, keyed by message id.
    pub async fn try_conversation(
        &self,
        character_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<BTreeMap<String, MetadataRecord>, StorageError> {
        let mut tree = self.load().await?;
        Ok(tree
            .remove(character_id)
            .and_then(|mut conversations| conversations.remove(conversation_key(conversation_id)))
            .unwrap_or_default())
    }

    /// Stored character ids with their conversation ids.
    pub async fn try_characters(&self) -> Result<Vec<(String, Vec<String>)>, StorageError> {
        let tree = self.load().await?;
        Ok(tree
            .into_iter()
            .map(|(character, conversations)| (character, conversations.into_keys().collect()))
            .collect())
    }

    pub async fn try_clear(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(METADATA_KEY).await?;
        info!("Metadata store cleared");
        Ok(())
    }

    /// Wipes every record. Only used for an explicit user reset.
    pub async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            warn!(error = %e, "Metadata clear failed");
        }
    }
}
