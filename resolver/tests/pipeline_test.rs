//! End-to-end test: interceptor → handler chain → session → store → resolver.
//!
//! **Setup:** an in-memory store, a session for character `c1` / conversation `conv1`
//! registered in a HandlerChain, and an interceptor collecting events.

use std::sync::Arc;

use handler_chain::HandlerChain;
use interceptor::{CollectingSink, Exchange, Interceptor};
use lens_core::{Role, TimestampSource};
use resolver::{
    AnnotateOutcome, DomSnapshot, IdentityResolver, ResolverConfig, Session, SnapshotElement,
    SnapshotNode,
};
use serde_json::json;
use storage::{InMemoryKvStore, MetadataStore};

const SENT_AT: i64 = 1_700_000_100_000;

fn clock() -> i64 {
    SENT_AT
}

struct Harness {
    session: Arc<Session>,
    chain: HandlerChain,
    interceptor: Interceptor<CollectingSink>,
    resolver: IdentityResolver<SnapshotElement>,
}

impl Harness {
    fn new() -> Self {
        let store = MetadataStore::new(Arc::new(InMemoryKvStore::new()));
        let session = Arc::new(Session::new(
            store,
            Some("c1".to_string()),
            Some("conv1".to_string()),
        ));
        let chain = HandlerChain::new().add_handler(session.clone());
        let resolver = IdentityResolver::new(session.clone(), ResolverConfig::default());
        Self {
            session,
            chain,
            interceptor: Interceptor::with_clock(CollectingSink::new(), clock),
            resolver,
        }
    }

    async fn observe(&self, exchange: Exchange) {
        self.interceptor.observe(&exchange);
        for event in self.interceptor.sink().drain() {
            self.chain.dispatch(&event).await;
        }
    }
}

fn node(value: serde_json::Value) -> SnapshotNode {
    serde_json::from_value(value).unwrap()
}

fn list_body() -> String {
    json!({
        "messages": [
            { "id": "m4", "role": "bot", "createdAt": 1_700_000_004_000i64,
              "inference": { "model": "llama-70b", "settings": { "temperature": 0.7 } } },
            { "id": "m3", "role": "user", "createdAt": 1_700_000_003_000i64 },
            { "id": "m2", "role": "bot", "createdAt": 1_700_000_002_000i64,
              "inference": { "model": "llama-8b" } },
            { "id": "m1", "role": "user", "createdAt": 1_700_000_001_000i64 }
        ]
    })
    .to_string()
}

/// Conversation rendered oldest first. `m4` carries no id and is found by position.
fn rendered_conversation() -> DomSnapshot {
    DomSnapshot::from_root(node(json!({
        "children": [
            { "role": "user", "attributes": { "data-message-id": "m1" } },
            { "role": "bot", "frameworkData": { "props": { "message": { "id": "m2" } } } },
            { "role": "user", "attributes": { "data-message-id": "m3" } },
            { "role": "bot" }
        ]
    })))
}

/// **Test: a loaded list annotates every rendered message.**
///
/// **Action:** observe the list exchange, run one annotation pass.
///
/// **Expected:** four annotations, the id-less bot message resolved by position.
#[tokio::test]
async fn test_list_then_annotate() {
    let harness = Harness::new();
    harness
        .observe(Exchange::get("/api/chats/conv1/messages", list_body()))
        .await;

    let index = harness.session.index();
    assert_eq!(index.get(0), Some("m1"));
    assert_eq!(index.get(3), Some("m4"));

    let dom = rendered_conversation();
    let summary = harness.resolver.annotate_pass(&dom.message_elements()).await;
    assert_eq!(summary.annotated, 4);
    assert_eq!(summary.deferred, 0);

    let annotations = dom.annotations();
    let ids: Vec<&str> = annotations.iter().map(|a| a.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
    assert_eq!(annotations[3].model.as_deref(), Some("llama-70b"));
    assert_eq!(annotations[3].settings.temperature, Some(0.7));
    assert_eq!(annotations[1].model.as_deref(), Some("llama-8b"));

    // Second pass over the same elements is a no-op.
    let summary = harness.resolver.annotate_pass(&dom.message_elements()).await;
    assert_eq!(summary.already_annotated, 4);
}

/// **Test: a send exchange annotates the new user and bot messages.**
///
/// **Setup:** list observed and annotated as above.
///
/// **Action:** observe a send whose engine differs from the requested model, render the
/// user message (id known from the DOM) and the bot reply (no id), run a pass.
///
/// **Expected:** the user message gets the send-time timestamp, the reply the composite model.
#[tokio::test]
async fn test_send_then_annotate_new_messages() {
    let harness = Harness::new();
    harness
        .observe(Exchange::get("/api/chats/conv1/messages", list_body()))
        .await;
    let dom = rendered_conversation();
    harness.resolver.annotate_pass(&dom.message_elements()).await;

    let request = json!({ "model": "llama-70b", "settings": { "temperature": 0.9, "topK": 40 } });
    let response = json!({ "id": "m6", "engine": "llama-70b-v2", "createdAt": 1_700_000_100_500i64 });
    harness
        .observe(Exchange::post(
            "/api/chats/conv1/messages",
            request.to_string(),
            response.to_string(),
        ))
        .await;
    assert_eq!(harness.session.pending_user_timestamps(), 1);
    assert_eq!(harness.session.index().bot_ids(), vec!["m2", "m4", "m6"]);

    let user = dom.append(node(json!({ "role": "user", "attributes": { "data-message-id": "m5" } })));
    let reply = dom.append(node(json!({ "role": "bot" })));

    let summary = harness.resolver.annotate_pass(&dom.message_elements()).await;
    assert_eq!(summary.annotated, 2);
    assert_eq!(summary.already_annotated, 4);

    let user_annotation = user.annotation().unwrap();
    assert_eq!(user_annotation.message_id, "m5");
    assert_eq!(user_annotation.timestamp, Some(SENT_AT));
    assert_eq!(harness.session.pending_user_timestamps(), 0);

    let stored = harness
        .session
        .store()
        .get("c1", Some("conv1"), "m5")
        .await
        .unwrap();
    assert_eq!(stored.role, Some(Role::User));
    assert_eq!(stored.timestamp_source, Some(TimestampSource::Sent));

    let reply_annotation = reply.annotation().unwrap();
    assert_eq!(reply_annotation.message_id, "m6");
    assert_eq!(reply_annotation.model.as_deref(), Some("llama-70b → llama-70b-v2"));
    assert_eq!(reply_annotation.settings.top_k, Some(40));
    assert_eq!(reply_annotation.is_alternative, Some(false));
}

/// **Test: a later list does not downgrade a composite reply.**
///
/// **Action:** after the send, observe a list that reports only the actual model for `m6`.
///
/// **Expected:** the store keeps the composite model and the send-time timestamp.
#[tokio::test]
async fn test_later_list_keeps_composite_model() {
    let harness = Harness::new();
    let request = json!({ "model": "llama-70b" });
    let response = json!({ "id": "m6", "engine": "llama-70b-v2", "createdAt": 1_700_000_100_500i64 });
    harness
        .observe(Exchange::post(
            "/api/chats/conv1/messages",
            request.to_string(),
            response.to_string(),
        ))
        .await;

    let list = json!({
        "messages": [
            { "id": "m6", "role": "bot", "createdAt": 1_700_000_200_000i64,
              "inference": { "model": "llama-70b-v2", "settings": { "temperature": 0.1 } } }
        ]
    });
    harness
        .observe(Exchange::get("/api/chats/conv1/messages", list.to_string()))
        .await;

    let record = harness
        .session
        .store()
        .get("c1", Some("conv1"), "m6")
        .await
        .unwrap();
    assert_eq!(record.model.as_deref(), Some("llama-70b → llama-70b-v2"));
    assert_eq!(record.timestamp, Some(1_700_000_100_500));
    assert_eq!(record.temperature, None);
}

/// **Test: an element removed before its metadata arrives is reported detached.**
#[tokio::test]
async fn test_removed_element_is_detached() {
    let harness = Harness::new();
    let dom = rendered_conversation();
    let elements = dom.message_elements();
    dom.remove(&elements[0]);
    assert_eq!(
        harness.resolver.annotate(&elements[0], &elements).await,
        AnnotateOutcome::Detached
    );
}
