//! Registry Manager
//!
//! Coordinates all registry operations:
//! - Registry CRUD with write-time validation
//! - The sync state machine (trigger, force, annotation commands)
//! - Server listing from the last synced entries
//! - Deployed/orphaned server views and attachment

use crate::controlplane::metrics::OperatorMetrics;
use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, RegistryPhase, ServerPhase};
use crate::domain::ports::{
    RegistryServerEntry, RegistryStoreRef, ResourceKey, ServerListFetcherRef, ServerStoreRef,
};
use crate::error::{Error, ErrorKind, Result};
use crate::registry::{
    classify, paginate, AttachOutcome, AttachRequest, CompiledFilter, Page, ServerAttacher,
    ServerQuery, ServerSummary,
};
use crate::sync::{
    begin_sync, complete_failure, complete_success, entries_hash, resolve, SyncCommand, SyncMode,
    SyncReason,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// =============================================================================
// Manager Configuration
// =============================================================================

/// Configuration for the registry manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Upper bound for one sync pipeline run
    pub sync_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// Sync Ticket
// =============================================================================

/// Handle to an accepted sync
#[derive(Debug, Clone)]
pub struct SyncTicket {
    pub sync_id: Uuid,
    pub token: String,
    pub registry: ResourceKey,
    completion: watch::Receiver<Option<RegistryPhase>>,
}

impl SyncTicket {
    /// Wait for the sync to finish; returns the phase it ended in
    pub async fn wait(mut self) -> Option<RegistryPhase> {
        loop {
            let current = *self.completion.borrow();
            if current.is_some() {
                return current;
            }
            if self.completion.changed().await.is_err() {
                return *self.completion.borrow();
            }
        }
    }
}

/// A sync run registered in this process
struct InFlight {
    sync_id: Uuid,
}

// =============================================================================
// Registry Manager
// =============================================================================

/// Owns the registry lifecycle and the server views
pub struct RegistryManager {
    config: ManagerConfig,
    registries: RegistryStoreRef,
    servers: ServerStoreRef,
    fetcher: ServerListFetcherRef,
    attacher: ServerAttacher,
    metrics: Arc<OperatorMetrics>,
    /// Per-registry lock serializing the check-and-set into `Syncing`
    transitions: DashMap<ResourceKey, Arc<Mutex<()>>>,
    /// Syncs started by this process and not yet finished
    in_flight: DashMap<ResourceKey, InFlight>,
    /// Admitted entries of the last successful sync
    entries: DashMap<ResourceKey, Arc<Vec<RegistryServerEntry>>>,
}

impl RegistryManager {
    /// Create a new manager
    pub fn new(
        config: ManagerConfig,
        registries: RegistryStoreRef,
        servers: ServerStoreRef,
        fetcher: ServerListFetcherRef,
        metrics: Arc<OperatorMetrics>,
    ) -> Arc<Self> {
        info!("Registry manager using the {} fetcher", fetcher.fetcher_name());

        Arc::new(Self {
            config,
            attacher: ServerAttacher::new(registries.clone(), servers.clone()),
            registries,
            servers,
            fetcher,
            metrics,
            transitions: DashMap::new(),
            in_flight: DashMap::new(),
            entries: DashMap::new(),
        })
    }

    pub fn metrics(&self) -> &Arc<OperatorMetrics> {
        &self.metrics
    }

    // =========================================================================
    // Registry CRUD
    // =========================================================================

    /// Create a registry in phase `Pending`
    pub async fn create_registry(&self, mut registry: MCPRegistry) -> Result<MCPRegistry> {
        registry.spec.validate(registry.name())?;
        if registry.metadata.namespace.is_none() {
            registry.metadata.namespace = Some("default".to_string());
        }
        registry.status = None;

        let mut created = self.registries.create(registry).await?;
        let key = ResourceKey::of_registry(&created);

        let status = MCPRegistryStatus::default();
        self.registries.patch_status(&key, &status).await?;
        created.status = Some(status);

        info!("Created registry {} ({})", key, created.spec.source.type_name());
        Ok(created)
    }

    /// Get a registry
    pub async fn get_registry(&self, key: &ResourceKey) -> Result<MCPRegistry> {
        self.registries
            .get(key)
            .await?
            .ok_or_else(|| registry_not_found(key))
    }

    /// List registries, optionally in one namespace
    pub async fn list_registries(&self, namespace: Option<&str>) -> Result<Vec<MCPRegistry>> {
        self.registries.list(namespace).await
    }

    /// Replace a registry's spec
    pub async fn update_registry(
        &self,
        key: &ResourceKey,
        spec: MCPRegistrySpec,
    ) -> Result<MCPRegistry> {
        spec.validate(&key.name)?;
        self.get_registry(key).await?;

        let updated = self.registries.update_spec(key, spec).await?;
        info!("Updated registry {}", key);
        Ok(updated)
    }

    /// Delete a registry that no server depends on
    pub async fn delete_registry(&self, key: &ResourceKey) -> Result<()> {
        self.get_registry(key).await?;

        let classification = classify(self.servers.list(&key.namespace).await?);
        let dependents = classification.owned_by(key).count();
        if dependents > 0 {
            return Err(Error::RegistryHasDependents {
                registry: key.to_string(),
                count: dependents,
            });
        }

        self.registries.delete(key).await?;
        self.entries.remove(key);
        self.transitions.remove(key);
        let _ = self
            .metrics
            .registry_servers
            .remove_label_values(&[&key.namespace, &key.name]);

        info!("Deleted registry {}", key);
        Ok(())
    }

    // =========================================================================
    // Sync State Machine
    // =========================================================================

    /// Start a sync unless one is in flight
    pub async fn trigger_sync(self: &Arc<Self>, key: &ResourceKey) -> Result<SyncTicket> {
        let command = SyncCommand::new(key.clone(), SyncMode::Guarded, SyncReason::Manual, Utc::now());
        self.start_sync(command).await
    }

    /// Start a sync even if one is in flight; status writes are last-write-wins
    pub async fn force_sync(self: &Arc<Self>, key: &ResourceKey) -> Result<SyncTicket> {
        let command = SyncCommand::new(key.clone(), SyncMode::Forced, SyncReason::Manual, Utc::now());
        self.start_sync(command).await
    }

    /// Execute a command from the scheduler
    ///
    /// Replaying an annotation token that was already consumed is a no-op and
    /// returns `None`.
    pub async fn handle_sync_command(self: &Arc<Self>, command: SyncCommand) -> Result<Option<SyncTicket>> {
        if command.is_annotated() {
            let registry = self.get_registry(&command.registry).await?;
            let consumed = registry
                .status
                .as_ref()
                .and_then(|s| s.last_sync_trigger.as_deref());
            if consumed == Some(command.token.as_str()) {
                debug!("Sync token {} for {} already consumed", command.token, command.registry);
                return Ok(None);
            }
        }

        self.start_sync(command).await.map(Some)
    }

    /// Check if this process runs a sync for the registry
    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        self.in_flight.contains_key(key)
    }

    async fn start_sync(self: &Arc<Self>, command: SyncCommand) -> Result<SyncTicket> {
        let key = command.registry.clone();

        // Locks are only created for registries that exist
        self.get_registry(&key).await?;
        let lock = self
            .transitions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let registry = match self.get_registry(&key).await {
            Ok(registry) => registry,
            Err(e) => {
                drop(guard);
                if e.kind() == ErrorKind::NotFound {
                    self.transitions.remove_if(&key, |_, l| Arc::ptr_eq(l, &lock));
                }
                return Err(e);
            }
        };

        // A recovery decided from a stale listing must not duplicate a run
        // that started in the meantime
        let yields_to_running = command.mode == SyncMode::Guarded
            || command.reason == SyncReason::Recovery;
        if yields_to_running && self.in_flight.contains_key(&key) {
            self.metrics
                .syncs_rejected_total
                .with_label_values(&[&key.namespace])
                .inc();
            return Err(Error::SyncInProgress {
                registry: key.to_string(),
            });
        }

        let now = Utc::now();
        let status = match begin_sync(registry.status.as_ref(), command.mode, &key, &command.token, now) {
            Ok(status) => status,
            Err(e) => {
                self.metrics
                    .syncs_rejected_total
                    .with_label_values(&[&key.namespace])
                    .inc();
                return Err(e);
            }
        };

        if !command.is_annotated() {
            self.registries
                .patch_annotations(&key, command.annotations())
                .await?;
        }
        self.registries.patch_status(&key, &status).await?;

        let sync_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(None);
        self.in_flight.insert(key.clone(), InFlight { sync_id });
        self.metrics.syncs_in_flight.inc();

        info!(
            "Sync {} started for {} ({}, {:?})",
            sync_id, key, command.reason, command.mode
        );

        let manager = Arc::clone(self);
        let task_key = key.clone();
        tokio::spawn(async move {
            let phase = manager.run_sync(&task_key, sync_id).await;
            let _ = tx.send(Some(phase));
        });

        Ok(SyncTicket {
            sync_id,
            token: command.token,
            registry: key,
            completion: rx,
        })
    }

    /// Run the pipeline and record the outcome; returns the final phase
    async fn run_sync(&self, key: &ResourceKey, sync_id: Uuid) -> RegistryPhase {
        let started = Instant::now();

        let outcome = match tokio::time::timeout(self.config.sync_timeout, self.sync_pipeline(key)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("sync", self.config.sync_timeout)),
        };

        let phase = match self.record_outcome(key, outcome).await {
            Ok(phase) => phase,
            Err(e) => {
                error!("Sync {} for {} could not record its outcome: {}", sync_id, key, e);
                RegistryPhase::Error
            }
        };

        let label = if phase == RegistryPhase::Ready { "success" } else { "failure" };
        self.metrics
            .sync_duration_seconds
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());
        self.metrics
            .syncs_total
            .with_label_values(&[&key.namespace, label])
            .inc();
        self.metrics.syncs_in_flight.dec();

        self.in_flight.remove_if(key, |_, f| f.sync_id == sync_id);
        phase
    }

    /// Resolve, fetch and filter
    async fn sync_pipeline(&self, key: &ResourceKey) -> Result<Vec<RegistryServerEntry>> {
        let registry = self.get_registry(key).await?;
        let endpoint = resolve(&registry)?;

        debug!("Fetching servers for {} from {}", key, endpoint);
        let fetched = self.fetcher.list_servers(&endpoint).await?;
        let fetched_count = fetched.len();

        let admitted = CompiledFilter::new(registry.spec.filter.as_ref()).apply(fetched);
        debug!("{}: {} of {} entries admitted", key, admitted.len(), fetched_count);
        Ok(admitted)
    }

    async fn record_outcome(
        &self,
        key: &ResourceKey,
        outcome: Result<Vec<RegistryServerEntry>>,
    ) -> Result<RegistryPhase> {
        let registry = self.get_registry(key).await?;
        let current = registry.status.unwrap_or_default();

        let status = match outcome.and_then(|entries| Ok((entries_hash(&entries)?, entries))) {
            Ok((hash, entries)) => {
                let count = entries.len() as u32;
                self.entries.insert(key.clone(), Arc::new(entries));
                self.metrics
                    .registry_servers
                    .with_label_values(&[&key.namespace, &key.name])
                    .set(count as i64);
                info!("Registry {} synced: {} servers", key, count);
                complete_success(current, count, hash, Utc::now())
            }
            Err(e) => {
                warn!("Registry {} sync failed: {}", key, e);
                complete_failure(current, format!("{} ({})", e, e.kind()))
            }
        };

        let phase = status.phase;
        self.registries.patch_status(key, &status).await?;
        Ok(phase)
    }

    // =========================================================================
    // Server Views
    // =========================================================================

    /// Admitted entries of a registry: the last synced list, or a live fetch
    /// when the registry has not synced in this process yet
    async fn admitted_entries(&self, registry: &MCPRegistry) -> Result<Arc<Vec<RegistryServerEntry>>> {
        let key = ResourceKey::of_registry(registry);
        if let Some(entries) = self.entries.get(&key) {
            return Ok(entries.clone());
        }

        let endpoint = resolve(registry)?;
        let fetched = self.fetcher.list_servers(&endpoint).await?;
        Ok(Arc::new(
            CompiledFilter::new(registry.spec.filter.as_ref()).apply(fetched),
        ))
    }

    /// Available servers of a registry, tag-matched and paginated
    pub async fn list_servers(
        &self,
        key: &ResourceKey,
        query: &ServerQuery,
    ) -> Result<Page<RegistryServerEntry>> {
        let registry = self.get_registry(key).await?;
        let entries = self.admitted_entries(&registry).await?;
        Ok(paginate(&entries, query))
    }

    /// One available server of a registry
    pub async fn get_server(&self, key: &ResourceKey, name: &str) -> Result<RegistryServerEntry> {
        let registry = self.get_registry(key).await?;
        let not_found = || Error::ResourceNotFound {
            kind: "RegistryServer".into(),
            name: format!("{}/{}", key, name),
        };

        if let Some(entries) = self.entries.get(key) {
            return entries
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .ok_or_else(not_found);
        }

        let endpoint = resolve(&registry)?;
        let filter = CompiledFilter::new(registry.spec.filter.as_ref());
        self.fetcher
            .get_server(&endpoint, name)
            .await?
            .filter(|e| filter.admits(e))
            .ok_or_else(not_found)
    }

    /// Servers owned by a registry, optionally restricted to one phase
    pub async fn deployed_servers(
        &self,
        key: &ResourceKey,
        phase: Option<ServerPhase>,
    ) -> Result<Vec<ServerSummary>> {
        self.get_registry(key).await?;

        let classification = classify(self.servers.list(&key.namespace).await?);
        self.record_classification(&key.namespace, classification.deployed.len(), classification.orphaned.len());

        Ok(classification
            .owned_by(key)
            .filter(|d| phase.map_or(true, |p| d.server.phase() == p))
            .map(ServerSummary::from)
            .collect())
    }

    /// Servers in a namespace without a complete ownership triple
    pub async fn orphaned_servers(&self, namespace: &str) -> Result<Vec<ServerSummary>> {
        let classification = classify(self.servers.list(namespace).await?);
        self.record_classification(namespace, classification.deployed.len(), classification.orphaned.len());

        Ok(classification
            .orphaned
            .iter()
            .map(|s| ServerSummary::from_server(s, None))
            .collect())
    }

    /// Attach a server to a registry
    pub async fn attach_server(
        &self,
        server: &ResourceKey,
        request: &AttachRequest,
    ) -> Result<AttachOutcome> {
        let outcome = self.attacher.attach(server, request).await?;
        if outcome.changed {
            self.metrics
                .attachments_total
                .with_label_values(&[&server.namespace])
                .inc();
        }
        Ok(outcome)
    }

    fn record_classification(&self, namespace: &str, deployed: usize, orphaned: usize) {
        self.metrics
            .classified_servers
            .with_label_values(&[namespace, "deployed"])
            .set(deployed as i64);
        self.metrics
            .classified_servers
            .with_label_values(&[namespace, "orphaned"])
            .set(orphaned as i64);
    }
}

fn registry_not_found(key: &ResourceKey) -> Error {
    Error::ResourceNotFound {
        kind: "MCPRegistry".into(),
        name: key.to_string(),
    }
}
