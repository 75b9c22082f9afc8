//! Registry Lifecycle Transitions
//!
//! Pure status transitions of the registry state machine:
//!
//! ```text
//! Pending ──► Syncing ──► Ready
//!               ▲   └───► Error
//!               └─────────┘ (next trigger from Ready or Error)
//! ```
//!
//! The manager persists whatever these functions return.

use crate::crd::{MCPRegistryStatus, RegistryPhase};
use crate::domain::ports::{RegistryServerEntry, ResourceKey};
use crate::error::{Error, Result};
use crate::sync::trigger::SyncMode;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Move a registry into `Syncing`
///
/// Guarded syncs fail with `SyncInProgress` when a sync is already in flight.
pub fn begin_sync(
    current: Option<&MCPRegistryStatus>,
    mode: SyncMode,
    key: &ResourceKey,
    token: &str,
    now: DateTime<Utc>,
) -> Result<MCPRegistryStatus> {
    let mut status = current.cloned().unwrap_or_default();

    if mode == SyncMode::Guarded && status.phase == RegistryPhase::Syncing {
        return Err(Error::SyncInProgress {
            registry: key.to_string(),
        });
    }

    status.phase = RegistryPhase::Syncing;
    status.message = None;
    status.last_attempt_time = Some(now);
    status.last_sync_trigger = Some(token.to_string());
    Ok(status)
}

/// `Syncing` to `Ready`
pub fn complete_success(
    mut status: MCPRegistryStatus,
    server_count: u32,
    hash: String,
    now: DateTime<Utc>,
) -> MCPRegistryStatus {
    status.phase = RegistryPhase::Ready;
    status.server_count = server_count;
    status.last_sync_hash = Some(hash);
    status.last_sync_time = Some(now);
    status.message = None;
    status
}

/// `Syncing` to `Error`; the previous server count and hash are kept
pub fn complete_failure(mut status: MCPRegistryStatus, message: impl Into<String>) -> MCPRegistryStatus {
    status.phase = RegistryPhase::Error;
    status.message = Some(message.into());
    status
}

/// Hex SHA-256 over the canonical JSON of the admitted entries
pub fn entries_hash(entries: &[RegistryServerEntry]) -> Result<String> {
    let bytes = serde_json::to_vec(entries)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResourceKey {
        ResourceKey::new("default", "upstream")
    }

    fn entry(name: &str) -> RegistryServerEntry {
        RegistryServerEntry {
            name: name.into(),
            image: format!("ghcr.io/example/{}:latest", name),
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_from_pending() {
        let now = Utc::now();
        let status = begin_sync(None, SyncMode::Guarded, &key(), "t1", now).unwrap();
        assert_eq!(status.phase, RegistryPhase::Syncing);
        assert_eq!(status.last_attempt_time, Some(now));
        assert_eq!(status.last_sync_trigger.as_deref(), Some("t1"));
        assert_eq!(status.last_sync_time, None);
    }

    #[test]
    fn test_guard_rejects_second_sync() {
        let now = Utc::now();
        let syncing = begin_sync(None, SyncMode::Guarded, &key(), "t1", now).unwrap();

        let err = begin_sync(Some(&syncing), SyncMode::Guarded, &key(), "t2", now).unwrap_err();
        assert!(matches!(err, Error::SyncInProgress { .. }));

        let forced = begin_sync(Some(&syncing), SyncMode::Forced, &key(), "t2", now).unwrap();
        assert_eq!(forced.last_sync_trigger.as_deref(), Some("t2"));
    }

    #[test]
    fn test_begin_clears_message() {
        let failed = complete_failure(MCPRegistryStatus::default(), "boom");
        let status = begin_sync(Some(&failed), SyncMode::Guarded, &key(), "t", Utc::now()).unwrap();
        assert_eq!(status.message, None);
    }

    #[test]
    fn test_failure_keeps_known_good_data() {
        let now = Utc::now();
        let ready = complete_success(MCPRegistryStatus::default(), 7, "abc".into(), now);
        let syncing = begin_sync(Some(&ready), SyncMode::Guarded, &key(), "t", now).unwrap();
        let failed = complete_failure(syncing, "upstream returned 500");

        assert_eq!(failed.phase, RegistryPhase::Error);
        assert_eq!(failed.server_count, 7);
        assert_eq!(failed.last_sync_hash.as_deref(), Some("abc"));
        assert_eq!(failed.last_sync_time, Some(now));
        assert_eq!(failed.message.as_deref(), Some("upstream returned 500"));
    }

    #[test]
    fn test_entries_hash() {
        let a = entries_hash(&[entry("fetch"), entry("time")]).unwrap();
        let b = entries_hash(&[entry("fetch"), entry("time")]).unwrap();
        let c = entries_hash(&[entry("time"), entry("fetch")]).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
