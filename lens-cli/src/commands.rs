//! Command implementations. Each returns what it did; printing is left to the binary.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use handler_chain::HandlerChain;
use interceptor::{Exchange, Interceptor};
use lens_core::{GenerationSettings, MetadataRecord, Profile};
use resolver::{Annotation, DomSnapshot, IdentityResolver, PassSummary, Session, SnapshotElement};
use storage::{MetadataStore, ProfileStore, SqliteKvStore, StorageError};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::Target;
use crate::config::LensConfig;

pub struct ReplayReport {
    /// Exchanges read from the file.
    pub exchanges: usize,
    /// Lines that were not a readable exchange.
    pub skipped: usize,
    /// Events emitted by the interceptor.
    pub events: usize,
    /// Events the handler chain processed.
    pub processed: usize,
    /// Session after the replay, with its positional index still populated.
    pub session: Arc<Session>,
}

#[derive(Debug)]
pub struct SnapshotReport {
    pub summary: PassSummary,
    pub annotations: Vec<Annotation>,
}

/// Open stores on the configured database.
pub struct Lens {
    backend: Arc<SqliteKvStore>,
    store: MetadataStore,
    profiles: ProfileStore,
    config: LensConfig,
}

impl Lens {
    pub async fn open(config: LensConfig) -> Result<Self> {
        let backend = Arc::new(
            SqliteKvStore::new(&config.database_url)
                .await
                .with_context(|| format!("Open database {}", config.database_url))?,
        );
        info!(database_url = %config.database_url, "Store opened");
        Ok(Self {
            store: MetadataStore::new(backend.clone()),
            profiles: ProfileStore::new(backend.clone()),
            backend,
            config,
        })
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    fn session(&self, target: &Target) -> Arc<Session> {
        Arc::new(Session::new(
            self.store.clone(),
            Some(target.character.clone()),
            target.conversation.clone(),
        ))
    }

    /// Feeds every exchange of a JSON-lines file through the interceptor into a fresh session.
    pub async fn replay(&self, exchanges: &Path, target: &Target) -> Result<ReplayReport> {
        let content = tokio::fs::read_to_string(exchanges)
            .await
            .with_context(|| format!("Read exchanges from {}", exchanges.display()))?;

        let session = self.session(target);
        let chain = HandlerChain::new().add_handler(session.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(async move { chain.run(rx).await });
        let interceptor = Interceptor::new(tx);

        let mut report_exchanges = 0;
        let mut skipped = 0;
        let mut events = 0;
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Exchange>(line) {
                Ok(exchange) => {
                    report_exchanges += 1;
                    events += interceptor.observe(&exchange);
                }
                Err(e) => {
                    warn!(line = number + 1, error = %e, "Skipping unreadable exchange line");
                    skipped += 1;
                }
            }
        }
        // Closing the channel ends the worker once every event is handled.
        drop(interceptor);
        let processed = worker.await.context("Event worker failed")?;

        info!(
            exchanges = report_exchanges,
            skipped, events, processed, "step: replay done"
        );
        Ok(ReplayReport {
            exchanges: report_exchanges,
            skipped,
            events,
            processed,
            session,
        })
    }

    /// Annotates a DOM snapshot file against the store, through `session`.
    pub async fn annotate_snapshot(
        &self,
        session: Arc<Session>,
        snapshot: &Path,
    ) -> Result<SnapshotReport> {
        let json = tokio::fs::read_to_string(snapshot)
            .await
            .with_context(|| format!("Read snapshot from {}", snapshot.display()))?;
        let dom = DomSnapshot::from_json(&json).context("Parse DOM snapshot")?;

        let resolver: IdentityResolver<SnapshotElement> =
            IdentityResolver::new(session, self.config.resolver_config());
        let summary = resolver.annotate_pass(&dom.message_elements()).await;
        Ok(SnapshotReport {
            summary,
            annotations: dom.annotations(),
        })
    }

    /// Annotates a snapshot with stored records only; the positional index is empty.
    pub async fn resolve(&self, snapshot: &Path, target: &Target) -> Result<SnapshotReport> {
        self.annotate_snapshot(self.session(target), snapshot).await
    }

    pub async fn characters(&self) -> Result<Vec<(String, Vec<String>)>> {
        Ok(self.store.try_characters().await?)
    }

    pub async fn conversation(
        &self,
        character: &str,
        conversation: Option<&str>,
    ) -> Result<BTreeMap<String, MetadataRecord>> {
        Ok(self.store.try_conversation(character, conversation).await?)
    }

    pub async fn clear(&self) -> Result<()> {
        Ok(self.store.try_clear().await?)
    }

    pub async fn save_profile(
        &self,
        name: String,
        model: Option<String>,
        settings: GenerationSettings,
    ) -> Result<Profile> {
        let profile = Profile {
            name,
            model,
            settings,
        };
        self.profiles.save(profile.clone()).await?;
        Ok(profile)
    }

    pub async fn profile(&self, name: &str) -> Result<Profile> {
        let profile = self.profiles.get(name).await?;
        Ok(profile.ok_or_else(|| StorageError::NotFound(format!("profile {name}")))?)
    }

    pub async fn profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.profiles.list().await?)
    }

    pub async fn delete_profile(&self, name: &str) -> Result<bool> {
        Ok(self.profiles.delete(name).await?)
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}
