//! # resolver
//!
//! Maps rendered message elements of the host page to stored metadata and annotates them.
//!
//! - [`element`] – MessageElement trait and the Annotation rendered on it
//! - [`extractor`] – ranked IdentityExtractors (attribute, framework data, handler source)
//! - [`index_map`] – oldest-first positional index, the last fallback
//! - [`session`] – per-page Session; the EventHandler that persists interceptor events
//! - [`resolver`] – IdentityResolver: resolve, annotate, retry
//! - [`snapshot`] – JSON DOM snapshots implementing MessageElement

pub mod config;
pub mod element;
pub mod error;
pub mod extractor;
pub mod index_map;
pub mod resolver;
pub mod retry;
pub mod session;
pub mod snapshot;

pub use config::{ResolverConfig, DEFAULT_MAX_ANCESTOR_HOPS};
pub use element::{Annotation, MessageElement};
pub use error::ResolveError;
pub use extractor::{
    AttributeExtractor, FrameworkDataExtractor, HandlerSourceExtractor, IdentityExtractor,
    FRAMEWORK_ID_PATHS, MESSAGE_ID_ATTRIBUTE,
};
pub use index_map::{IndexEntry, IndexMap};
pub use resolver::{AnnotateOutcome, IdentityResolver, IdentitySource, PassSummary, ResolvedIdentity};
pub use retry::{RetrySchedule, DEFAULT_RETRY_DELAYS_MS};
pub use session::Session;
pub use snapshot::{DomSnapshot, SnapshotElement, SnapshotNode};
