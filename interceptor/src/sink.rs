//! Fire-and-forget destinations for interceptor events.

use std::sync::{Arc, Mutex};

use lens_core::MetadataEvent;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Receives events; must not block or fail towards the interceptor.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MetadataEvent);
}

impl EventSink for UnboundedSender<MetadataEvent> {
    fn emit(&self, event: MetadataEvent) {
        if let Err(e) = self.send(event) {
            warn!(kind = e.0.kind(), "Event receiver closed; event dropped");
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<MetadataEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything collected so far.
    pub fn drain(&self) -> Vec<MetadataEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: MetadataEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
