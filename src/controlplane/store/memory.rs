//! In-Memory Store
//!
//! Holds MCPRegistry and MCPServer objects in process memory with the same
//! merge semantics as the cluster adapter. Backs `--standalone` runs and tests.

use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, MCPServer};
use crate::domain::ports::{RegistryStore, ResourceKey, ServerStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Store backed by in-process maps
#[derive(Default)]
pub struct MemoryStore {
    registries: RwLock<BTreeMap<ResourceKey, MCPRegistry>>,
    servers: RwLock<BTreeMap<ResourceKey, MCPServer>>,
    generation: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.generation.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    /// Add or replace a server; servers are created by deployments outside
    /// this operator
    pub fn insert_server(&self, mut server: MCPServer) {
        if server.metadata.namespace.is_none() {
            server.metadata.namespace = Some("default".to_string());
        }
        server.metadata.resource_version = Some(self.next_version());
        let key = ResourceKey::of_server(&server);
        self.servers.write().insert(key, server);
    }

    /// Remove a server
    pub fn remove_server(&self, key: &ResourceKey) -> Option<MCPServer> {
        self.servers.write().remove(key)
    }

    fn not_found(kind: &str, key: &ResourceKey) -> Error {
        Error::ResourceNotFound {
            kind: kind.to_string(),
            name: key.to_string(),
        }
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn create(&self, mut registry: MCPRegistry) -> Result<MCPRegistry> {
        if registry.metadata.namespace.is_none() {
            registry.metadata.namespace = Some("default".to_string());
        }
        let key = ResourceKey::of_registry(&registry);

        let mut registries = self.registries.write();
        if registries.contains_key(&key) {
            return Err(Error::ResourceExists {
                kind: "MCPRegistry".into(),
                name: key.to_string(),
            });
        }

        registry.metadata.uid = Some(uuid::Uuid::new_v4().to_string());
        registry.metadata.creation_timestamp = Some(Time(Utc::now()));
        registry.metadata.resource_version = Some(self.next_version());
        registry.status = None;

        debug!("Stored registry {}", key);
        registries.insert(key, registry.clone());
        Ok(registry)
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPRegistry>> {
        Ok(self.registries.read().get(key).cloned())
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<MCPRegistry>> {
        Ok(self
            .registries
            .read()
            .iter()
            .filter(|(k, _)| namespace.map_or(true, |ns| k.namespace == ns))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn update_spec(&self, key: &ResourceKey, spec: MCPRegistrySpec) -> Result<MCPRegistry> {
        let version = self.next_version();
        let mut registries = self.registries.write();
        let registry = registries
            .get_mut(key)
            .ok_or_else(|| Self::not_found("MCPRegistry", key))?;
        registry.spec = spec;
        registry.metadata.resource_version = Some(version);
        Ok(registry.clone())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        self.registries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("MCPRegistry", key))
    }

    async fn patch_status(&self, key: &ResourceKey, status: &MCPRegistryStatus) -> Result<()> {
        let version = self.next_version();
        let mut registries = self.registries.write();
        let registry = registries
            .get_mut(key)
            .ok_or_else(|| Self::not_found("MCPRegistry", key))?;

        // apiEndpoint is omitted from the patch when unset, so it survives
        let mut next = status.clone();
        if next.api_endpoint.is_none() {
            next.api_endpoint = registry.status.as_ref().and_then(|s| s.api_endpoint.clone());
        }
        registry.status = Some(next);
        registry.metadata.resource_version = Some(version);
        Ok(())
    }

    async fn patch_annotations(
        &self,
        key: &ResourceKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        let version = self.next_version();
        let mut registries = self.registries.write();
        let registry = registries
            .get_mut(key)
            .ok_or_else(|| Self::not_found("MCPRegistry", key))?;
        registry
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(annotations);
        registry.metadata.resource_version = Some(version);
        Ok(())
    }
}

#[async_trait]
impl ServerStore for MemoryStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MCPServer>> {
        Ok(self
            .servers
            .read()
            .iter()
            .filter(|(k, _)| k.namespace == namespace)
            .map(|(_, s)| s.clone())
            .collect())
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPServer>> {
        Ok(self.servers.read().get(key).cloned())
    }

    async fn patch_labels(
        &self,
        key: &ResourceKey,
        labels: BTreeMap<String, String>,
    ) -> Result<MCPServer> {
        let version = self.next_version();
        let mut servers = self.servers.write();
        let server = servers
            .get_mut(key)
            .ok_or_else(|| Self::not_found("MCPServer", key))?;
        server
            .metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels);
        server.metadata.resource_version = Some(version);
        Ok(server.clone())
    }
}
