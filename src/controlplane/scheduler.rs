//! Sync Scheduler
//!
//! Periodically asks the sync trigger which registries are due and hands the
//! resulting commands to the manager. Registries left in `Syncing` by a
//! previous process are recovered with a forced sync.

use crate::controlplane::manager::RegistryManager;
use crate::domain::ports::ResourceKey;
use crate::error::{ErrorKind, Result};
use crate::sync::{SyncCommand, SyncMode, SyncReason, SyncTrigger};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between evaluations
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub evaluated: usize,
    pub started: usize,
    /// Commands that were replays or hit an in-flight sync
    pub skipped: usize,
    pub failed: usize,
}

/// Drives interval and annotation triggered syncs
pub struct SyncScheduler {
    config: SchedulerConfig,
    manager: Arc<RegistryManager>,
}

impl SyncScheduler {
    pub fn new(config: SchedulerConfig, manager: Arc<RegistryManager>) -> Self {
        Self { config, manager }
    }

    /// Evaluate every registry once
    pub async fn tick(&self) -> Result<TickReport> {
        let now = Utc::now();
        let registries = self.manager.list_registries(None).await?;

        let mut report = TickReport {
            evaluated: registries.len(),
            ..Default::default()
        };

        let commands: Vec<SyncCommand> = registries
            .iter()
            .filter_map(|registry| {
                let key = ResourceKey::of_registry(registry);
                if registry.is_syncing() && !self.manager.is_in_flight(&key) {
                    warn!("Registry {} was left syncing; recovering", key);
                    return Some(SyncCommand::new(key, SyncMode::Forced, SyncReason::Recovery, now));
                }
                SyncTrigger::evaluate(registry, now)
                    .map(|reason| SyncCommand::new(key, SyncMode::Guarded, reason, now))
            })
            .collect();

        let results = join_all(commands.into_iter().map(|command| {
            let manager = self.manager.clone();
            async move {
                let key = command.registry.clone();
                let reason = command.reason.clone();
                (key, reason, manager.handle_sync_command(command).await)
            }
        }))
        .await;

        for (key, reason, result) in results {
            match result {
                Ok(Some(ticket)) => {
                    debug!("Scheduled sync {} for {} ({})", ticket.sync_id, key, reason);
                    report.started += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) if e.kind() == ErrorKind::Conflict => {
                    debug!("Skipping {}: {}", key, e);
                    report.skipped += 1;
                }
                Err(e) if e.is_retryable() => {
                    info!("Sync for {} not started, retrying next tick: {}", key, e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Failed to start sync for {}: {}", key, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Tick until shutdown is signalled
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Sync scheduler started (tick every {:?})",
            self.config.tick_interval
        );
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(report) if report.started > 0 || report.failed > 0 => {
                            info!(
                                "Scheduler tick: {} evaluated, {} started, {} failed",
                                report.evaluated, report.started, report.failed
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Scheduler tick failed: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Sync scheduler stopping");
                    break;
                }
            }
        }
    }
}
