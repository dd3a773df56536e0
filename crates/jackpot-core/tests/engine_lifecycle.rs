//! Integration tests for the engine lifecycle against a real snapshot file.
//!
//! These run on the real clock with short periods so the tick and
//! snapshot tasks interleave the way they do in production.

#![allow(clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jackpot_core::config::EngineConfig;
use jackpot_core::random::ScriptedRandomSource;
use jackpot_core::registry::ChannelSubscriber;
use jackpot_core::{Engine, GenerationStore, StoreError};
use jackpot_types::{GenerationRecord, GenerationState, SubscriberEvent};

fn fast_config(path: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.generator.tick_interval_ms = 10;
    config.persistence.snapshot_interval_ms = 30;
    config.persistence.snapshot_path = path.to_path_buf();
    config
}

async fn read_snapshot(path: &Path) -> GenerationState {
    let bytes = tokio::fs::read(path).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn fresh_start_creates_default_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");

    let store = GenerationStore::open(&path).await.unwrap();

    assert_eq!(store.current(), GenerationRecord::new(0, 0));
    assert!(!store.is_completed());
    assert!(store.history(None).is_empty());
    assert_eq!(read_snapshot(&path).await, GenerationState::default());
}

#[tokio::test]
async fn periodic_snapshots_capture_a_prefix_of_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = GenerationStore::open(&path).await.unwrap();
    let handle = Engine::new(fast_config(&path), store).unwrap().start();
    let feed = handle.feed();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let on_disk = read_snapshot(&path).await;
    let in_memory = feed.history(None);
    assert!(!on_disk.history.is_empty());
    assert!(in_memory.starts_with(&on_disk.history));
    assert!(on_disk.is_consistent());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_flush_makes_every_tick_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let mut config = fast_config(&path);
    config.persistence.snapshot_interval_ms = 60_000;

    let store = GenerationStore::open(&path).await.unwrap();
    let handle = Engine::new(config, store).unwrap().start();
    let feed = handle.feed();

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown().await.unwrap();

    let reopened = GenerationStore::open(&path).await.unwrap();
    assert_eq!(reopened.history(None), feed.history(None));
    assert_eq!(reopened.current(), feed.current());
}

#[tokio::test]
async fn snapshot_failures_are_retried_without_stopping_ticks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = GenerationStore::open(&path).await.unwrap();

    // A non-empty directory at the snapshot path makes every rename fail.
    tokio::fs::remove_file(&path).await.unwrap();
    tokio::fs::create_dir(&path).await.unwrap();
    tokio::fs::write(path.join("occupied"), b"x").await.unwrap();

    let handle = Engine::new(fast_config(&path), store).unwrap().start();
    let feed = handle.feed();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let early = feed.generation_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_generating());
    assert!(feed.generation_count() > early);
    assert!(path.is_dir());

    tokio::fs::remove_dir_all(&path).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let on_disk = read_snapshot(&path).await;
    assert!(!on_disk.history.is_empty());
    assert!(feed.history(None).starts_with(&on_disk.history));
    assert!(on_disk.is_consistent());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn restart_continues_history_and_keeps_completion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");

    let store = GenerationStore::open(&path).await.unwrap();
    let handle = Engine::new(fast_config(&path), store)
        .unwrap()
        .with_source(Box::new(ScriptedRandomSource::new([69_696_969])))
        .start();
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.shutdown().await.unwrap();
    let first_run = GenerationStore::open(&path).await.unwrap().history(None);
    assert_eq!(first_run.first().unwrap().value, 69_696_969);

    let store = GenerationStore::open(&path).await.unwrap();
    assert!(store.is_completed());
    let handle = Engine::new(fast_config(&path), store).unwrap().start();
    let feed = handle.feed();
    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.shutdown().await.unwrap();

    let second_run = feed.history(None);
    assert!(second_run.starts_with(&first_run));
    assert!(second_run.len() > first_run.len());
    assert!(feed.is_completed());
}

#[tokio::test]
async fn corrupt_snapshot_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    tokio::fs::write(&path, b"{\"completed\": false, \"history\": [").await.unwrap();

    let result = GenerationStore::open(&path).await;

    assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    // The damaged file is left untouched for inspection.
    assert!(tokio::fs::read(&path).await.unwrap().ends_with(b"["));
}

#[tokio::test]
async fn legacy_snapshot_is_upgraded_on_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let legacy = r#"{"completed":false,"currentGeneration":{"time":1000,"generation":5},"generations":[{"time":1000,"generation":5}]}"#;
    tokio::fs::write(&path, legacy).await.unwrap();

    let store = GenerationStore::open(&path).await.unwrap();
    assert_eq!(store.current(), GenerationRecord::new(1_000, 5));
    store.persist().await.unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
    assert_eq!(raw["current"]["value"], 5);
    assert_eq!(raw["history"][0]["timestamp"], 1_000);
}

#[tokio::test]
async fn live_subscriber_gets_backlog_then_stream() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = GenerationStore::open(&path).await.unwrap();
    store.append(GenerationRecord::new(1, 100));
    store.append(GenerationRecord::new(2, 200));

    let mut config = fast_config(&path);
    config.subscribers.backlog_size = 1;
    let handle = Engine::new(config, store).unwrap().start();
    let feed = handle.feed();

    let (sub, mut rx) = ChannelSubscriber::new();
    let id = feed.subscribe(Arc::new(sub));

    let first = rx.recv().await.unwrap();
    assert_eq!(
        first,
        SubscriberEvent::backlog(&[GenerationRecord::new(2, 200)])
    );
    let second = rx.recv().await.unwrap();
    assert_eq!(second.kind(), "new-generation");

    assert!(feed.unsubscribe(id));
    handle.shutdown().await.unwrap();
}
