//! # Handler chain
//!
//! Runs a sequence of [`EventHandler`]s for each [`MetadataEvent`]: every handler's `before` in
//! order (any `false` stops the chain), then `handle` until one returns Stop, then every `after`
//! in reverse order.
//!
//! Events are processed one at a time; [`HandlerChain::run`] drains a channel in arrival order,
//! awaiting each event before the next so store merges land in network order.

use lens_core::{EventHandler, HandlerResponse, MetadataEvent, Result};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl HandlerChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends a handler (before/handle in order, after in reverse).
    pub fn add_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the chain for one event. Returns Stop if a handler stopped it, else Continue.
    #[instrument(skip(self, event), fields(kind = event.kind()))]
    pub async fn handle(&self, event: &MetadataEvent) -> Result<HandlerResponse> {
        let mut final_response = HandlerResponse::Continue;

        debug!(
            conversation_id = ?event.conversation_id(),
            "step: handler_chain started"
        );

        for handler in &self.handlers {
            let handler_name = std::any::type_name_of_val(handler.as_ref());
            if !handler.before(event).await? {
                info!(handler = %handler_name, "step: handler before returned false, chain stopped");
                return Ok(HandlerResponse::Stop);
            }
        }

        for handler in &self.handlers {
            let handler_name = std::any::type_name_of_val(handler.as_ref());
            let response = handler.handle(event).await?;
            debug!(handler = %handler_name, response = ?response, "step: handler done");

            match response {
                HandlerResponse::Stop => {
                    info!(handler = %handler_name, "step: handler chain stopped by handler");
                    final_response = response;
                    break;
                }
                HandlerResponse::Continue | HandlerResponse::Ignore => continue,
            }
        }

        for handler in self.handlers.iter().rev() {
            handler.after(event, &final_response).await?;
        }

        debug!("step: handler_chain finished");
        Ok(final_response)
    }

    /// Runs the chain and logs any error instead of returning it.
    pub async fn dispatch(&self, event: &MetadataEvent) -> HandlerResponse {
        match self.handle(event).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, kind = event.kind(), "Handler chain failed; event dropped");
                HandlerResponse::Stop
            }
        }
    }

    /// Dispatches every event from `events` in order until the sender side is dropped.
    /// Returns the number of events processed.
    pub async fn run(&self, mut events: UnboundedReceiver<MetadataEvent>) -> usize {
        let mut processed = 0;
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
            processed += 1;
        }
        info!(processed, "Event stream closed");
        processed
    }
}

// Tests live in tests/handler_chain_test.rs
