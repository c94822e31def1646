//! Identity resolution and annotation of rendered message elements.
//!
//! For each element the resolver finds a message id (ranked extractors, then position in the
//! index), reads the stored record and renders it. Every failure is soft: the processed marker
//! is cleared and a later pass tries again.

use std::sync::Arc;

use lens_core::{is_composite_model, MetadataRecord};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::element::{Annotation, MessageElement};
use crate::error::ResolveError;
use crate::extractor::{
    AttributeExtractor, FrameworkDataExtractor, HandlerSourceExtractor, IdentityExtractor,
};
use crate::session::Session;

/// Which step of the fallback chain produced an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Extractor(&'static str),
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub message_id: String,
    pub source: IdentitySource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotateOutcome {
    Annotated(Annotation),
    /// The element already shows an up-to-date annotation.
    AlreadyAnnotated,
    /// The element left the document.
    Detached,
    /// Bot reply with no stored record yet, rendered from the last requested settings.
    Provisional(Annotation),
    Deferred(ResolveError),
}

impl AnnotateOutcome {
    /// True when a later attempt may still change the element.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnnotateOutcome::Deferred(_) | AnnotateOutcome::Provisional(_))
    }
}

/// Counts of one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub annotated: usize,
    pub already_annotated: usize,
    pub provisional: usize,
    pub deferred: usize,
    pub detached: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: &AnnotateOutcome) {
        match outcome {
            AnnotateOutcome::Annotated(_) => self.annotated += 1,
            AnnotateOutcome::AlreadyAnnotated => self.already_annotated += 1,
            AnnotateOutcome::Provisional(_) => self.provisional += 1,
            AnnotateOutcome::Deferred(_) => self.deferred += 1,
            AnnotateOutcome::Detached => self.detached += 1,
        }
    }
}

pub struct IdentityResolver<E: MessageElement> {
    extractors: Vec<Box<dyn IdentityExtractor<E>>>,
    session: Arc<Session>,
    config: ResolverConfig,
}

impl<E: MessageElement + 'static> IdentityResolver<E> {
    /// Resolver with the default ranking: attribute, framework data, handler source.
    pub fn new(session: Arc<Session>, config: ResolverConfig) -> Self {
        let extractors: Vec<Box<dyn IdentityExtractor<E>>> = vec![
            Box::new(AttributeExtractor::new(config.id_attribute.clone())),
            Box::new(FrameworkDataExtractor::new(config.max_ancestor_hops)),
            Box::new(HandlerSourceExtractor),
        ];
        Self::with_extractors(session, config, extractors)
    }

    /// Resolver with a custom ranking. The positional fallback always runs last.
    pub fn with_extractors(
        session: Arc<Session>,
        config: ResolverConfig,
        extractors: Vec<Box<dyn IdentityExtractor<E>>>,
    ) -> Self {
        Self {
            extractors,
            session,
            config,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Finds the message id of `element`. `elements` is the current list of rendered message
    /// elements in document order.
    pub fn resolve_identity(
        &self,
        element: &E,
        elements: &[E],
    ) -> Result<ResolvedIdentity, ResolveError> {
        for extractor in &self.extractors {
            if let Some(message_id) = extractor.extract(element) {
                return Ok(ResolvedIdentity {
                    message_id,
                    source: IdentitySource::Extractor(extractor.name()),
                });
            }
        }
        self.positional(element, elements)
            .map(|message_id| ResolvedIdentity {
                message_id,
                source: IdentitySource::Positional,
            })
            .ok_or(ResolveError::MissingIdentity)
    }

    /// Only the newest bot messages are rendered; align them with the tail of the index.
    fn positional(&self, element: &E, elements: &[E]) -> Option<String> {
        if !element.is_bot() {
            return None;
        }
        let position = elements.iter().position(|e| e == element)?;
        let bot_index = elements[..position].iter().filter(|e| e.is_bot()).count();
        let rendered_bots = elements.iter().filter(|e| e.is_bot()).count();
        self.session
            .index()
            .bot_in_window(bot_index, rendered_bots)
            .map(str::to_string)
    }

    async fn stored(&self, message_id: &str) -> Result<MetadataRecord, ResolveError> {
        let character_id = self.session.character_id().ok_or(ResolveError::NoCharacter)?;
        let conversation_id = self.session.conversation_id();
        self.session
            .store()
            .get(&character_id, conversation_id.as_deref(), message_id)
            .await
            .ok_or_else(|| ResolveError::MissingMetadata {
                message_id: message_id.to_string(),
            })
    }

    /// A rendered plain model is stale once the store holds a composite one.
    async fn is_stale(&self, element: &E, elements: &[E]) -> bool {
        let Some(rendered) = element.rendered_model() else {
            return false;
        };
        if is_composite_model(&rendered) {
            return false;
        }
        let Ok(identity) = self.resolve_identity(element, elements) else {
            return false;
        };
        match self.stored(&identity.message_id).await {
            Ok(record) => record.has_composite_model(),
            Err(_) => false,
        }
    }

    /// Annotates one element.
    ///
    /// The processed marker is set before the first await, so concurrent passes over the same
    /// element do not annotate it twice.
    pub async fn annotate(&self, element: &E, elements: &[E]) -> AnnotateOutcome {
        if !element.is_connected() {
            return AnnotateOutcome::Detached;
        }
        if element.is_processed() {
            if !self.is_stale(element, elements).await {
                return AnnotateOutcome::AlreadyAnnotated;
            }
            info!(rendered = ?element.rendered_model(), "Stale annotation; re-annotating");
        } else {
            element.mark_processed();
        }

        let identity = match self.resolve_identity(element, elements) {
            Ok(identity) => identity,
            Err(e) => {
                element.clear_processed();
                debug!(error = %e, "Element left unannotated");
                return AnnotateOutcome::Deferred(e);
            }
        };
        let message_id = identity.message_id.as_str();

        if !element.is_bot() {
            self.session.fill_user_timestamp(message_id).await;
        }

        let record = match self.stored(message_id).await {
            Ok(record) => record,
            Err(e) => {
                element.clear_processed();
                return self.provisional(element, message_id, e);
            }
        };

        if !element.is_connected() {
            return AnnotateOutcome::Detached;
        }
        let annotation = Annotation::new(message_id, &record);
        element.render(&annotation);
        debug!(message_id, source = ?identity.source, model = ?annotation.model, "Element annotated");
        AnnotateOutcome::Annotated(annotation)
    }

    fn provisional(&self, element: &E, message_id: &str, error: ResolveError) -> AnnotateOutcome {
        let settings = match (&error, self.session.last_settings()) {
            (ResolveError::MissingMetadata { .. }, Some(settings)) if element.is_bot() => settings,
            _ => {
                debug!(error = %error, message_id, "Metadata not available yet");
                return AnnotateOutcome::Deferred(error);
            }
        };
        let annotation = Annotation {
            message_id: message_id.to_string(),
            role: None,
            model: None,
            settings,
            timestamp: None,
            is_alternative: None,
        };
        element.render(&annotation);
        AnnotateOutcome::Provisional(annotation)
    }

    /// Annotates every element of one mutation pass, sequentially.
    pub async fn annotate_pass(&self, elements: &[E]) -> PassSummary {
        let mut summary = PassSummary::default();
        for element in elements {
            let outcome = self.annotate(element, elements).await;
            summary.record(&outcome);
        }
        info!(
            annotated = summary.annotated,
            deferred = summary.deferred,
            "step: annotation pass"
        );
        summary
    }

    /// Annotates a newly rendered element, retrying on the configured delays until it is
    /// annotated or removed. `current` returns the rendered message elements at call time.
    pub async fn annotate_with_retry<F>(&self, element: &E, current: F) -> AnnotateOutcome
    where
        F: Fn() -> Vec<E>,
    {
        let mut outcome = self.annotate(element, &current()).await;
        for delay in self.config.retry.delays() {
            if !outcome.is_retryable() {
                break;
            }
            tokio::time::sleep(*delay).await;
            outcome = self.annotate(element, &current()).await;
        }
        if outcome.is_retryable() {
            warn!(
                attempts = self.config.retry.delays().len() + 1,
                "Giving up on element until the next mutation pass"
            );
        }
        outcome
    }
}
