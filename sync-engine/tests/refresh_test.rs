//! Refresh: replacing confirmed history, pending preservation, and serialization with sends.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chat_core::{is_local_id, MessageStatus};
use common::{author, drain, ids, remote_message, wait_for, FakeRemote, Gate};
use remote_client::NetworkError;
use storage::{InMemoryMessageCache, MessageCache};
use sync_engine::{EngineConfig, RefreshPolicy, SyncEngine, SyncError};

fn five_remote() -> Vec<chat_core::RemoteMessage> {
    (1..=5)
        .map(|i| remote_message("c1", &format!("r{}", i), "u2", &format!("remote {}", i), i))
        .collect()
}

#[tokio::test]
async fn test_refresh_replaces_confirmed_history() {
    let remote = Arc::new(FakeRemote::new());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());

    for text in ["a", "b", "c"] {
        engine.send("c1", text, &author()).await.unwrap();
    }
    assert_eq!(cache.snapshot_by_conversation("c1").await.unwrap().len(), 3);

    remote.set_history(five_remote());
    let fetched = engine.refresh("c1").await.unwrap();
    assert_eq!(fetched, 5);

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(ids(&snapshot), vec!["r1", "r2", "r3", "r4", "r5"]);
    assert!(snapshot.iter().all(|r| r.status == MessageStatus::Sent));
}

#[tokio::test]
async fn test_refresh_publishes_single_transition() {
    let remote = Arc::new(FakeRemote::new());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());
    engine.send("c1", "a", &author()).await.unwrap();

    let mut stream = engine.observe("c1").await.unwrap();
    remote.set_history(five_remote());
    engine.refresh("c1").await.unwrap();

    let snapshots = drain(&mut stream).await;
    assert_eq!(snapshots.len(), 2, "current, then the replaced history");
    assert_eq!(snapshots[1].len(), 5);
}

#[tokio::test]
async fn test_refresh_keeps_failed_records_by_default() {
    let remote = Arc::new(FakeRemote::new());
    remote.script_send(Err(NetworkError::Transport("offline".to_string())));
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());
    assert_eq!(engine.config().refresh_policy, RefreshPolicy::PreservePending);

    assert!(engine.send("c1", "unsent", &author()).await.is_err());
    remote.set_history(five_remote());
    engine.refresh("c1").await.unwrap();

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(snapshot.len(), 6);
    let failed: Vec<_> = snapshot
        .iter()
        .filter(|r| r.status == MessageStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(is_local_id(&failed[0].id));
}

#[tokio::test]
async fn test_refresh_overwrite_drops_everything_local() {
    let remote = Arc::new(FakeRemote::new());
    remote.script_send(Err(NetworkError::Transport("offline".to_string())));
    let cache = Arc::new(InMemoryMessageCache::new());
    let config = EngineConfig::default().with_refresh_policy(RefreshPolicy::Overwrite);
    let engine = SyncEngine::with_config(cache.clone(), remote.clone(), config);

    assert!(engine.send("c1", "unsent", &author()).await.is_err());
    remote.set_history(five_remote());
    engine.refresh("c1").await.unwrap();

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(ids(&snapshot), vec!["r1", "r2", "r3", "r4", "r5"]);
}

#[tokio::test]
async fn test_refresh_failure_leaves_cache_untouched() {
    let remote = Arc::new(FakeRemote::new());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());
    engine.send("c1", "a", &author()).await.unwrap();
    let before = cache.snapshot_by_conversation("c1").await.unwrap();

    *remote.fetch_error.lock().unwrap() = Some(NetworkError::Status {
        status: 500,
        body: "boom".to_string(),
    });
    let result = engine.refresh("c1").await;
    assert!(matches!(result, Err(SyncError::Network(NetworkError::Status { status: 500, .. }))));

    let after = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_refresh_of_other_conversation_is_isolated() {
    let remote = Arc::new(FakeRemote::new());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());
    engine.send("c2", "keep me", &author()).await.unwrap();

    remote.set_history(five_remote());
    engine.refresh("c1").await.unwrap();

    assert_eq!(cache.snapshot_by_conversation("c2").await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_waits_for_in_flight_send() {
    let gate = Gate::new();
    let remote = Arc::new(FakeRemote::new().with_send_gate(gate.clone()));
    remote.script_send(Ok("srv-1"));
    remote.set_history(vec![remote_message("c1", "srv-1", "u1", "hello", 1)]);
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = Arc::new(SyncEngine::new(cache.clone(), remote.clone()));

    let send = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.send("c1", "hello", &author()).await })
    };
    gate.wait_entered().await;

    let refresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("c1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!refresh.is_finished());
    assert_eq!(remote.fetch_calls.load(Ordering::SeqCst), 0);

    gate.release();
    send.await.unwrap().unwrap();
    assert_eq!(refresh.await.unwrap().unwrap(), 1);

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(ids(&snapshot), vec!["srv-1"]);
    assert_eq!(snapshot[0].status, MessageStatus::Sent);
    assert_eq!(engine.active_conversations(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_during_refresh_keeps_optimistic_record() {
    let gate = Gate::new();
    let remote = Arc::new(FakeRemote::new().with_fetch_gate(gate.clone()));
    remote.set_history(five_remote());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = Arc::new(SyncEngine::new(cache.clone(), remote.clone()));

    let refresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("c1").await })
    };
    gate.wait_entered().await;

    let send = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.send("c1", "new", &author()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let pending = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, MessageStatus::Sending);
    assert_eq!(remote.send_calls.load(Ordering::SeqCst), 0);

    gate.release();
    refresh.await.unwrap().unwrap();
    let sent = send.await.unwrap().unwrap();

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(snapshot.len(), 6);
    assert!(snapshot.iter().any(|r| r.id == sent.id));
    assert!(snapshot.iter().all(|r| !is_local_id(&r.id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_dropped_while_refresh_holds_gate_still_resolves() {
    let gate = Gate::new();
    let remote = Arc::new(FakeRemote::new().with_fetch_gate(gate.clone()));
    remote.set_history(five_remote());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = Arc::new(SyncEngine::new(cache.clone(), remote.clone()));

    let refresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("c1").await })
    };
    gate.wait_entered().await;

    let send = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.send("c1", "hi", &author()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let pending = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, MessageStatus::Sending);
    send.abort();
    let _ = send.await;

    gate.release();
    assert_eq!(refresh.await.unwrap().unwrap(), 5);

    let snapshot = wait_for(cache.as_ref(), "c1", |records| {
        records.iter().all(|r| r.status != MessageStatus::Sending)
    })
    .await;
    assert_eq!(snapshot.len(), 6);
    assert!(snapshot.iter().all(|r| r.status == MessageStatus::Sent));
    assert!(snapshot.iter().any(|r| r.text == "hi" && !is_local_id(&r.id)));
    assert_eq!(remote.send_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overwrite_refresh_during_send_keeps_confirmed_message() {
    let gate = Gate::new();
    let remote = Arc::new(FakeRemote::new().with_fetch_gate(gate.clone()));
    remote.set_history(vec![remote_message("c1", "r1", "u2", "remote 1", 1)]);
    let cache = Arc::new(InMemoryMessageCache::new());
    let config = EngineConfig::default().with_refresh_policy(RefreshPolicy::Overwrite);
    let engine = Arc::new(SyncEngine::with_config(cache.clone(), remote.clone(), config));

    let refresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("c1").await })
    };
    gate.wait_entered().await;

    let send = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.send("c1", "new", &author()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.snapshot_by_conversation("c1").await.unwrap().len(), 1);

    gate.release();
    assert_eq!(refresh.await.unwrap().unwrap(), 1);
    let sent = send.await.unwrap().unwrap();
    assert_eq!(sent.id, "srv-1");
    assert_eq!(sent.status, MessageStatus::Sent);

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(ids(&snapshot), vec!["r1", "srv-1"]);
    assert!(snapshot.iter().all(|r| r.status == MessageStatus::Sent));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overwrite_refresh_during_failed_send_returns_error() {
    let gate = Gate::new();
    let remote = Arc::new(FakeRemote::new().with_fetch_gate(gate.clone()));
    remote.set_history(vec![remote_message("c1", "r1", "u2", "remote 1", 1)]);
    remote.script_send(Err(NetworkError::Transport("offline".to_string())));
    let cache = Arc::new(InMemoryMessageCache::new());
    let config = EngineConfig::default().with_refresh_policy(RefreshPolicy::Overwrite);
    let engine = Arc::new(SyncEngine::with_config(cache.clone(), remote.clone(), config));

    let refresh = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("c1").await })
    };
    gate.wait_entered().await;

    let send = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.send("c1", "new", &author()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    gate.release();
    refresh.await.unwrap().unwrap();
    let result = send.await.unwrap();
    assert!(matches!(result, Err(SyncError::Network(NetworkError::Transport(_)))));

    let snapshot = cache.snapshot_by_conversation("c1").await.unwrap();
    assert_eq!(ids(&snapshot), vec!["r1"]);
}

#[tokio::test]
async fn test_gates_released_after_operations() {
    let remote = Arc::new(FakeRemote::new());
    let cache = Arc::new(InMemoryMessageCache::new());
    let engine = SyncEngine::new(cache.clone(), remote.clone());

    engine.send("c1", "a", &author()).await.unwrap();
    engine.send("c2", "b", &author()).await.unwrap();
    remote.set_history(five_remote());
    engine.refresh("c1").await.unwrap();

    assert_eq!(engine.active_conversations(), 0);
}
