//! Sync Trigger
//!
//! Decides whether a registry is due for a sync. Evaluation is pure: it reads
//! the registry and the clock and never writes. A requested sync is carried
//! as a timestamp token in the sync-trigger annotation, so replaying the same
//! token is a no-op once the state machine has recorded it.

use crate::crd::{MCPRegistry, SYNC_TRIGGER_ANNOTATION};
use crate::domain::ports::ResourceKey;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Why a sync was started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncReason {
    /// First sync of a registry with an interval policy
    Initial,
    /// The interval elapsed
    Interval,
    /// A new sync-trigger token was written to the annotation
    Annotation(String),
    /// Administrative request through the API
    Manual,
    /// A sync was left in flight by a previous operator process
    Recovery,
}

impl std::fmt::Display for SyncReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncReason::Initial => write!(f, "initial"),
            SyncReason::Interval => write!(f, "interval"),
            SyncReason::Annotation(_) => write!(f, "annotation"),
            SyncReason::Manual => write!(f, "manual"),
            SyncReason::Recovery => write!(f, "recovery"),
        }
    }
}

/// Whether the in-flight guard applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Rejected while a sync is in flight
    Guarded,
    /// Bypasses the in-flight guard
    Forced,
}

/// A request to sync one registry, identified by its token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    pub registry: ResourceKey,
    pub token: String,
    pub mode: SyncMode,
    pub reason: SyncReason,
}

impl SyncCommand {
    /// Command with a fresh token
    pub fn new(registry: ResourceKey, mode: SyncMode, reason: SyncReason, now: DateTime<Utc>) -> Self {
        let token = match &reason {
            SyncReason::Annotation(token) => token.clone(),
            _ => trigger_token(now),
        };
        Self {
            registry,
            token,
            mode,
            reason,
        }
    }

    /// Annotations to merge onto the registry
    pub fn annotations(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(SYNC_TRIGGER_ANNOTATION.to_string(), self.token.clone())])
    }

    /// Whether the annotation already carries this token
    pub fn is_annotated(&self) -> bool {
        matches!(self.reason, SyncReason::Annotation(_))
    }
}

/// RFC 3339 token with millisecond precision
pub fn trigger_token(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Evaluates whether registries are due for a sync
pub struct SyncTrigger;

impl SyncTrigger {
    /// Decide whether `registry` should sync at `now`
    pub fn evaluate(registry: &MCPRegistry, now: DateTime<Utc>) -> Option<SyncReason> {
        if registry.is_syncing() {
            return None;
        }

        let status = registry.status.as_ref();

        if let Some(token) = registry.sync_trigger() {
            let consumed = status.and_then(|s| s.last_sync_trigger.as_deref());
            if consumed != Some(token) {
                return Some(SyncReason::Annotation(token.to_string()));
            }
        }

        let policy = registry.spec.sync_policy.as_ref()?;
        let interval = match policy.interval_duration() {
            Ok(interval) => interval,
            Err(e) => {
                warn!("Registry {} has an unusable sync interval: {}", registry.name(), e);
                return None;
            }
        };

        let last_success = status.and_then(|s| s.last_sync_time);
        let last_attempt = status.and_then(|s| s.last_attempt_time);

        // Failed attempts pace retries by the same interval
        let reference = match (last_success, last_attempt) {
            (None, None) => return Some(SyncReason::Initial),
            (Some(a), Some(b)) => a.max(b),
            (Some(t), None) | (None, Some(t)) => t,
        };

        let elapsed = now.signed_duration_since(reference).to_std().ok()?;
        (elapsed >= interval).then_some(SyncReason::Interval)
    }
}
