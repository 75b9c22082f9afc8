//! Registry manager lifecycle tests against the in-memory store

mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::*;
use mcp_registry_operator::crd::{RegistryPhase, ServerPhase, SYNC_TRIGGER_ANNOTATION};
use mcp_registry_operator::domain::ports::{RegistryStore, ResourceKey};
use mcp_registry_operator::registry::{AttachRequest, ServerQuery};
use mcp_registry_operator::sync::{SyncCommand, SyncMode, SyncReason};
use mcp_registry_operator::{Error, ErrorKind, MemoryStore, SchedulerConfig, SyncScheduler};
use std::sync::Arc;
use std::time::Duration;

fn key(name: &str) -> ResourceKey {
    ResourceKey::new(NS, name)
}

#[tokio::test]
async fn create_then_read_is_pending() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store, Arc::new(StaticFetcher::new(example_entries())));

    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    let read = manager.get_registry(&key("upstream")).await.unwrap();
    let status = read.status.unwrap();
    assert_eq!(status.phase, RegistryPhase::Pending);
    assert_eq!(status.server_count, 0);
    assert_eq!(status.last_sync_time, None);
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store, Arc::new(StaticFetcher::new(vec![])));

    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();
    let err = manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn invalid_spec_is_rejected_before_write() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store.clone(), Arc::new(StaticFetcher::new(vec![])));

    let mut filter = example_filter();
    filter.names.as_mut().unwrap().include.push("[oops".into());
    let err = manager
        .create_registry(registry("upstream", registry_spec(Some(filter), None)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = manager
        .create_registry(registry("upstream", registry_spec(None, Some("every hour"))))
        .await
        .unwrap_err();
    assert_matches!(err, Error::DurationParse(_));

    assert!(RegistryStore::list(store.as_ref(), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn successful_sync_counts_filtered_entries() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store, Arc::new(StaticFetcher::new(example_entries())));
    manager
        .create_registry(registry("upstream", registry_spec(Some(example_filter()), None)))
        .await
        .unwrap();

    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Ready));

    let status = manager.get_registry(&key("upstream")).await.unwrap().status.unwrap();
    assert_eq!(status.phase, RegistryPhase::Ready);
    assert_eq!(status.server_count, 1);
    assert!(status.last_sync_time.is_some());
    assert_eq!(status.last_sync_hash.as_ref().map(String::len), Some(64));
    assert_eq!(status.message, None);

    let page = manager
        .list_servers(&key("upstream"), &ServerQuery::default())
        .await
        .unwrap();
    let names: Vec<_> = page.items.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["mcp-web"]);

    let err = manager.get_server(&key("upstream"), "db-tool").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn second_trigger_while_syncing_conflicts() {
    let store = Arc::new(MemoryStore::new());
    let (fetcher, gate) = StaticFetcher::gated(example_entries());
    let manager = manager(store, Arc::new(fetcher));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    let upstream = key("upstream");
    let (a, b) = tokio::join!(
        manager.trigger_sync(&upstream),
        manager.trigger_sync(&upstream)
    );

    let (ticket, rejected) = match (a, b) {
        (Ok(ticket), Err(e)) | (Err(e), Ok(ticket)) => (ticket, e),
        other => panic!("expected one success and one conflict, got {:?}", other),
    };
    assert_matches!(rejected, Error::SyncInProgress { .. });
    assert_eq!(rejected.kind(), ErrorKind::Conflict);

    let phase = manager.get_registry(&key("upstream")).await.unwrap().phase();
    assert_eq!(phase, RegistryPhase::Syncing);

    gate.add_permits(1);
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Ready));
}

#[tokio::test]
async fn force_sync_bypasses_guard() {
    let store = Arc::new(MemoryStore::new());
    let (fetcher, gate) = StaticFetcher::gated(example_entries());
    let manager = manager(store, Arc::new(fetcher));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    let first = manager.trigger_sync(&key("upstream")).await.unwrap();
    let forced = manager.force_sync(&key("upstream")).await.unwrap();
    assert_ne!(first.sync_id, forced.sync_id);

    gate.add_permits(2);
    assert_eq!(first.wait().await, Some(RegistryPhase::Ready));
    assert_eq!(forced.wait().await, Some(RegistryPhase::Ready));

    let status = manager.get_registry(&key("upstream")).await.unwrap().status.unwrap();
    assert_eq!(status.server_count, 3);
}

#[tokio::test]
async fn failed_sync_keeps_previous_count() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(StaticFetcher::new(example_entries()));
    let manager = manager(store, fetcher.clone());
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Ready));

    fetcher.set_failing(true);
    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Error));

    let status = manager.get_registry(&key("upstream")).await.unwrap().status.unwrap();
    assert_eq!(status.phase, RegistryPhase::Error);
    assert_eq!(status.server_count, 3);
    assert!(status.message.unwrap().contains("503"));

    // Cached entries survive the failure
    let page = manager
        .list_servers(&key("upstream"), &ServerQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn sync_past_timeout_ends_in_error_and_keeps_count() {
    let store = Arc::new(MemoryStore::new());
    let (fetcher, gate) = StaticFetcher::gated(example_entries());
    let manager = manager_with_timeout(store, Arc::new(fetcher), Duration::from_millis(50));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    gate.add_permits(1);
    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Ready));

    // No permit: the fetch hangs until the pipeline deadline
    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Error));

    let status = manager.get_registry(&key("upstream")).await.unwrap().status.unwrap();
    assert_eq!(status.phase, RegistryPhase::Error);
    assert_eq!(status.server_count, 3);
    assert!(status.last_sync_hash.is_some());
    let message = status.message.unwrap();
    assert!(message.contains("timed out"), "{}", message);
    assert!(message.contains("fetch_failure"), "{}", message);
    assert!(!manager.is_in_flight(&key("upstream")));

    // The registry accepts a new sync afterwards
    gate.add_permits(1);
    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    assert_eq!(ticket.wait().await, Some(RegistryPhase::Ready));
}

#[tokio::test]
async fn trigger_writes_annotation_and_replay_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store, Arc::new(StaticFetcher::new(example_entries())));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();

    let ticket = manager.trigger_sync(&key("upstream")).await.unwrap();
    let token = ticket.token.clone();
    ticket.wait().await;

    let registry = manager.get_registry(&key("upstream")).await.unwrap();
    assert_eq!(registry.sync_trigger(), Some(token.as_str()));
    assert_eq!(
        registry.status.unwrap().last_sync_trigger.as_deref(),
        Some(token.as_str())
    );

    let replay = SyncCommand::new(
        key("upstream"),
        SyncMode::Guarded,
        SyncReason::Annotation(token),
        Utc::now(),
    );
    assert!(manager.handle_sync_command(replay).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_with_dependents_conflicts() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store.clone(), Arc::new(StaticFetcher::new(vec![])));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();
    store.insert_server(server("fetch-1", Some(("upstream", "fetch"))));

    let err = manager.delete_registry(&key("upstream")).await.unwrap_err();
    assert_matches!(err, Error::RegistryHasDependents { count: 1, .. });
    assert_eq!(err.kind(), ErrorKind::Conflict);

    store.remove_server(&key("fetch-1"));
    manager.delete_registry(&key("upstream")).await.unwrap();

    let err = manager.get_registry(&key("upstream")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn attach_moves_server_from_orphaned_to_deployed() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store.clone(), Arc::new(StaticFetcher::new(vec![])));
    manager
        .create_registry(registry("upstream", registry_spec(None, None)))
        .await
        .unwrap();
    store.insert_server(server("fetch-1", None));
    store.insert_server(server("time-1", Some(("upstream", "time"))));

    let orphaned = manager.orphaned_servers(NS).await.unwrap();
    assert_eq!(orphaned.len(), 1);
    assert_eq!(orphaned[0].name, "fetch-1");

    let request = AttachRequest {
        registry_name: "upstream".into(),
        registry_namespace: None,
        server_name_in_registry: "fetch".into(),
    };
    assert!(manager.attach_server(&key("fetch-1"), &request).await.unwrap().changed);
    assert!(!manager.attach_server(&key("fetch-1"), &request).await.unwrap().changed);

    assert!(manager.orphaned_servers(NS).await.unwrap().is_empty());
    let deployed = manager.deployed_servers(&key("upstream"), None).await.unwrap();
    assert_eq!(deployed.len(), 2);

    let running = manager
        .deployed_servers(&key("upstream"), Some(ServerPhase::Running))
        .await
        .unwrap();
    assert!(running.is_empty());
}

#[tokio::test]
async fn scheduler_starts_due_and_recovers_stuck_registries() {
    let store = Arc::new(MemoryStore::new());
    let manager = manager(store.clone(), Arc::new(StaticFetcher::new(example_entries())));

    manager
        .create_registry(registry("interval", registry_spec(None, Some("1h"))))
        .await
        .unwrap();
    manager
        .create_registry(registry("manual", registry_spec(None, None)))
        .await
        .unwrap();
    manager
        .create_registry(registry("stuck", registry_spec(None, None)))
        .await
        .unwrap();

    let mut stuck = manager.get_registry(&key("stuck")).await.unwrap().status.unwrap();
    stuck.phase = RegistryPhase::Syncing;
    store.patch_status(&key("stuck"), &stuck).await.unwrap();

    let scheduler = SyncScheduler::new(SchedulerConfig::default(), manager.clone());
    let report = scheduler.tick().await.unwrap();
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.started, 2);
    assert_eq!(report.failed, 0);

    // Manual-only registries are never scheduled
    let manual = manager.get_registry(&key("manual")).await.unwrap();
    assert_eq!(manual.phase(), RegistryPhase::Pending);
    assert!(manual.sync_trigger().is_none());
    assert!(manual
        .metadata
        .annotations
        .as_ref()
        .map_or(true, |a| !a.contains_key(SYNC_TRIGGER_ANNOTATION)));
}
