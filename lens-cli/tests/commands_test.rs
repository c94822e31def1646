//! Integration tests for the `lens` commands, on a SQLite file in a temp directory.

use std::path::{Path, PathBuf};

use interceptor::Exchange;
use lens_cli::{Lens, LensConfig, Target};
use lens_core::{GenerationSettings, Role};
use serde_json::json;
use tempfile::TempDir;

fn config(dir: &TempDir) -> LensConfig {
    LensConfig {
        database_url: dir.path().join("lens.db").to_string_lossy().into_owned(),
        log_file: dir.path().join("lens.log").to_string_lossy().into_owned(),
        retry_delays_ms: vec![250, 1000, 2500],
        max_ancestor_hops: 5,
    }
}

fn target() -> Target {
    Target {
        character: "c1".to_string(),
        conversation: None,
    }
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn exchanges_file(dir: &TempDir) -> PathBuf {
    let list = Exchange::get(
        "https://host.example/api/chats/conv1/messages",
        json!({ "messages": [
            { "id": "m2", "role": "bot", "createdAt": 1_700_000_002_000i64,
              "inference": { "model": "llama-70b" } },
            { "id": "m1", "role": "user", "createdAt": 1_700_000_001_000i64 }
        ] })
        .to_string(),
    );
    let mut send = Exchange::post(
        "https://host.example/api/chats/conv1/messages",
        json!({ "model": "llama-70b", "settings": { "temperature": 0.8 } }).to_string(),
        json!({ "id": "m4", "engine": "llama-70b-v2", "createdAt": 1_700_000_004_000i64 }).to_string(),
    );
    send.sent_at = Some(1_700_000_003_000);

    let lines = [
        serde_json::to_string(&list).unwrap(),
        "not an exchange".to_string(),
        String::new(),
        serde_json::to_string(&send).unwrap(),
    ];
    write(dir, "exchanges.jsonl", &lines.join("\n"))
}

fn snapshot_file(dir: &TempDir) -> PathBuf {
    let snapshot = json!({ "children": [
        { "role": "user", "attributes": { "data-message-id": "m1" } },
        { "role": "bot" },
        { "role": "user", "attributes": { "data-message-id": "m3" } },
        { "role": "bot" }
    ] });
    write(dir, "snapshot.json", &snapshot.to_string())
}

async fn replay(lens: &Lens, dir: &TempDir) -> lens_cli::ReplayReport {
    lens.replay(&exchanges_file(dir), &target()).await.unwrap()
}

/// **Test: replay persists list and send exchanges.**
///
/// **Action:** replay two exchanges and one garbage line.
///
/// **Expected:** three events (list, user send, bot reply) processed in order; the reply is
/// stored with its composite model.
#[tokio::test]
async fn test_replay_persists_exchanges() {
    let dir = TempDir::new().unwrap();
    let lens = Lens::open(config(&dir)).await.unwrap();

    let report = replay(&lens, &dir).await;
    assert_eq!(report.exchanges, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.events, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(report.session.conversation_id().as_deref(), Some("conv1"));

    let records = lens.conversation("c1", Some("conv1")).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records["m4"].model.as_deref(), Some("llama-70b → llama-70b-v2"));
    assert_eq!(records["m4"].temperature, Some(0.8));
    assert_eq!(records["m1"].role, Some(Role::User));

    let characters = lens.characters().await.unwrap();
    assert_eq!(characters, vec![("c1".to_string(), vec!["conv1".to_string()])]);
}

/// **Test: replay with a snapshot annotates through the replayed session.**
///
/// **Expected:** both bot messages are found by position, the new user message `m3` gets the
/// send-time timestamp.
#[tokio::test]
async fn test_replay_then_annotate_snapshot() {
    let dir = TempDir::new().unwrap();
    let lens = Lens::open(config(&dir)).await.unwrap();
    let report = replay(&lens, &dir).await;

    let snapshot = lens
        .annotate_snapshot(report.session, &snapshot_file(&dir))
        .await
        .unwrap();
    assert_eq!(snapshot.summary.annotated, 4);
    let ids: Vec<&str> = snapshot
        .annotations
        .iter()
        .map(|a| a.message_id.as_str())
        .collect();
    assert_eq!(ids, vec!["m1", "m2", "m3", "m4"]);
    assert_eq!(snapshot.annotations[2].timestamp, Some(1_700_000_003_000));
}

/// **Test: records survive reopening the database; resolve has no positional fallback.**
#[tokio::test]
async fn test_resolve_after_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let lens = Lens::open(config(&dir)).await.unwrap();
        replay(&lens, &dir).await;
        lens.close().await;
    }

    let lens = Lens::open(config(&dir)).await.unwrap();
    let target = Target {
        character: "c1".to_string(),
        conversation: Some("conv1".to_string()),
    };
    let snapshot = lens.resolve(&snapshot_file(&dir), &target).await.unwrap();
    // m1 resolves by attribute; m3 has no record; the bot messages carry no id.
    assert_eq!(snapshot.summary.annotated, 1);
    assert_eq!(snapshot.summary.deferred, 3);
}

/// **Test: clear wipes records but keeps profiles.**
#[tokio::test]
async fn test_clear_keeps_profiles() {
    let dir = TempDir::new().unwrap();
    let lens = Lens::open(config(&dir)).await.unwrap();
    replay(&lens, &dir).await;
    lens.save_profile("creative".to_string(), None, GenerationSettings::default())
        .await
        .unwrap();

    lens.clear().await.unwrap();
    assert!(lens.characters().await.unwrap().is_empty());
    assert_eq!(lens.profiles().await.unwrap().len(), 1);
}

/// **Test: profile save / show / list / delete.**
#[tokio::test]
async fn test_profiles() {
    let dir = TempDir::new().unwrap();
    let lens = Lens::open(config(&dir)).await.unwrap();

    let settings = GenerationSettings {
        temperature: Some(1.1),
        top_k: Some(80),
        ..Default::default()
    };
    lens.save_profile("wild".to_string(), Some("llama-70b".to_string()), settings.clone())
        .await
        .unwrap();
    lens.save_profile("calm".to_string(), None, GenerationSettings::default())
        .await
        .unwrap();

    let names: Vec<String> = lens
        .profiles()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["calm", "wild"]);
    assert_eq!(lens.profile("wild").await.unwrap().settings, settings);

    assert!(lens.delete_profile("wild").await.unwrap());
    assert!(!lens.delete_profile("wild").await.unwrap());
    let missing = lens.profile("wild").await.unwrap_err();
    assert!(missing.to_string().contains("Not found"));
    assert!(lens.save_profile(" ".to_string(), None, GenerationSettings::default()).await.is_err());
}

/// **Test: a missing exchanges file is an error, not a panic.**
#[tokio::test]
async fn test_replay_missing_file() {
    let dir = TempDir::new().unwrap();
    let lens = Lens::open(config(&dir)).await.unwrap();
    let result = lens.replay(Path::new("/nonexistent/exchanges.jsonl"), &target()).await;
    assert!(result.is_err());
}
