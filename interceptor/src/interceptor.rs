//! Observation of host exchanges.
//!
//! The interceptor never alters what it sees and never fails towards the caller: unparseable
//! bodies are logged and produce no events. Each `on_*` method returns how many events it
//! emitted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use lens_core::{
    compose_model, conversation_key, GenerationSettings, MetadataEvent, ObservationError, Role,
};
use tracing::{debug, info, warn};

use crate::endpoint::{classify, Endpoint};
use crate::exchange::Exchange;
use crate::sink::EventSink;
use crate::wire::{parse_list_response, parse_send_request, parse_send_response, parse_timestamp};

/// Model and settings the user asked for in a send request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestedGeneration {
    pub model: Option<String>,
    pub settings: GenerationSettings,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct Interceptor<S: EventSink> {
    sink: S,
    clock: fn() -> i64,
    /// Requested generation per conversation key, waiting for the send response.
    pending: Mutex<HashMap<String, RequestedGeneration>>,
    last_requested: Mutex<Option<RequestedGeneration>>,
}

impl<S: EventSink> Interceptor<S> {
    pub fn new(sink: S) -> Self {
        Self::with_clock(sink, now_millis)
    }

    /// Uses `clock` (epoch milliseconds) for send-time captures.
    pub fn with_clock(sink: S, clock: fn() -> i64) -> Self {
        Self {
            sink,
            clock,
            pending: Mutex::new(HashMap::new()),
            last_requested: Mutex::new(None),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Settings of the most recent send request seen, if any.
    pub fn last_requested(&self) -> Option<RequestedGeneration> {
        lock(&self.last_requested).clone()
    }

    /// Observes an outgoing request. A send emits `UserMessageSent` right away.
    pub fn on_request(
        &self,
        method: &str,
        url: &str,
        body: Option<&str>,
        sent_at: Option<i64>,
    ) -> usize {
        let Endpoint::SendMessage { conversation_id } = classify(method, url) else {
            return 0;
        };

        let request = match body.map(parse_send_request).transpose() {
            Ok(request) => request.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, url, "Unreadable send request; requested model unknown");
                Default::default()
            }
        };
        let conversation_id = conversation_id.or(request.conversation_id.clone());
        let requested = RequestedGeneration {
            model: request.model,
            settings: request.settings.unwrap_or_default(),
        };

        lock(&self.pending).insert(
            conversation_key(conversation_id.as_deref()).to_string(),
            requested.clone(),
        );
        *lock(&self.last_requested) = Some(requested);

        let timestamp = sent_at.unwrap_or_else(|| (self.clock)());
        info!(?conversation_id, timestamp, "step: user message sent");
        self.sink.emit(MetadataEvent::UserMessageSent {
            timestamp,
            conversation_id,
        });
        1
    }

    /// Observes a response. `request_body`, when given, is the matching request's body.
    pub fn on_response(
        &self,
        method: &str,
        url: &str,
        request_body: Option<&str>,
        response_body: &str,
    ) -> usize {
        let result = match classify(method, url) {
            Endpoint::ListMessages { conversation_id } => {
                self.observe_list(conversation_id, response_body)
            }
            Endpoint::SendMessage { conversation_id } => {
                self.observe_send(conversation_id, request_body, response_body)
            }
            Endpoint::Other => return 0,
        };

        match result {
            Ok(event) => {
                self.sink.emit(event);
                1
            }
            Err(e) => {
                warn!(error = %e, url, "Ignoring unreadable exchange");
                0
            }
        }
    }

    /// Observes a full captured exchange: request first, then response.
    pub fn observe(&self, exchange: &Exchange) -> usize {
        let mut emitted = self.on_request(
            &exchange.method,
            &exchange.url,
            exchange.request_body.as_deref(),
            exchange.sent_at,
        );
        if let Some(body) = exchange.response_body.as_deref() {
            emitted += self.on_response(
                &exchange.method,
                &exchange.url,
                exchange.request_body.as_deref(),
                body,
            );
        }
        emitted
    }

    fn observe_list(
        &self,
        conversation_id: Option<String>,
        body: &str,
    ) -> Result<MetadataEvent, ObservationError> {
        let (body_conversation, records) = parse_list_response(body)?;
        let conversation_id = conversation_id.or(body_conversation);
        info!(?conversation_id, count = records.len(), "step: messages loaded");
        Ok(MetadataEvent::MessagesLoaded {
            conversation_id,
            records,
        })
    }

    fn observe_send(
        &self,
        conversation_id: Option<String>,
        request_body: Option<&str>,
        response_body: &str,
    ) -> Result<MetadataEvent, ObservationError> {
        let response = parse_send_response(response_body)?;

        let request = request_body.and_then(|body| parse_send_request(body).ok());
        let conversation_id = conversation_id
            .or_else(|| request.as_ref().and_then(|r| r.conversation_id.clone()))
            .or(response.conversation_id.clone());

        let pending = lock(&self.pending).remove(conversation_key(conversation_id.as_deref()));
        let requested = match request {
            Some(request) => RequestedGeneration {
                model: request.model,
                settings: request.settings.unwrap_or_default(),
            },
            None => pending.or_else(|| self.last_requested()).unwrap_or_default(),
        };

        let model = compose_model(requested.model.as_deref(), response.engine.as_deref());
        let role = response
            .role
            .as_deref()
            .and_then(Role::from_label)
            .unwrap_or(Role::Bot);
        let timestamp = response.created_at.as_ref().and_then(parse_timestamp);

        debug!(
            message_id = %response.id,
            ?conversation_id,
            ?model,
            "step: bot reply observed"
        );
        Ok(MetadataEvent::NewMessage {
            message_id: response.id,
            conversation_id,
            model,
            settings: requested.settings,
            timestamp,
            role,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
