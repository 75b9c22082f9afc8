//! Bounded Store
//!
//! Wraps store adapters so that no call waits longer than the configured
//! store timeout. An expired call surfaces as `Error::Timeout`.

use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, MCPServer};
use crate::domain::ports::{
    RegistryStore, RegistryStoreRef, ResourceKey, ServerStore, ServerStoreRef,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Timeout decorator for both store ports
pub struct BoundedStore {
    registries: RegistryStoreRef,
    servers: ServerStoreRef,
    timeout: Duration,
}

impl BoundedStore {
    pub fn new(registries: RegistryStoreRef, servers: ServerStoreRef, timeout: Duration) -> Self {
        Self {
            registries,
            servers,
            timeout,
        }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::timeout(format!("store {}", operation), self.timeout))?
    }
}

#[async_trait]
impl RegistryStore for BoundedStore {
    async fn create(&self, registry: MCPRegistry) -> Result<MCPRegistry> {
        self.bounded("create registry", self.registries.create(registry)).await
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPRegistry>> {
        self.bounded("get registry", self.registries.get(key)).await
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<MCPRegistry>> {
        self.bounded("list registries", self.registries.list(namespace)).await
    }

    async fn update_spec(&self, key: &ResourceKey, spec: MCPRegistrySpec) -> Result<MCPRegistry> {
        self.bounded("update registry", self.registries.update_spec(key, spec)).await
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        self.bounded("delete registry", self.registries.delete(key)).await
    }

    async fn patch_status(&self, key: &ResourceKey, status: &MCPRegistryStatus) -> Result<()> {
        self.bounded("patch registry status", self.registries.patch_status(key, status))
            .await
    }

    async fn patch_annotations(
        &self,
        key: &ResourceKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        self.bounded(
            "patch registry annotations",
            self.registries.patch_annotations(key, annotations),
        )
        .await
    }
}

#[async_trait]
impl ServerStore for BoundedStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MCPServer>> {
        self.bounded("list servers", self.servers.list(namespace)).await
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPServer>> {
        self.bounded("get server", self.servers.get(key)).await
    }

    async fn patch_labels(
        &self,
        key: &ResourceKey,
        labels: BTreeMap<String, String>,
    ) -> Result<MCPServer> {
        self.bounded("patch server labels", self.servers.patch_labels(key, labels))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::store::MemoryStore;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    struct StalledStore;

    #[async_trait]
    impl ServerStore for StalledStore {
        async fn list(&self, _namespace: &str) -> Result<Vec<MCPServer>> {
            std::future::pending().await
        }

        async fn get(&self, _key: &ResourceKey) -> Result<Option<MCPServer>> {
            std::future::pending().await
        }

        async fn patch_labels(
            &self,
            _key: &ResourceKey,
            _labels: BTreeMap<String, String>,
        ) -> Result<MCPServer> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let memory = Arc::new(MemoryStore::new());
        let store = BoundedStore::new(memory, Arc::new(StalledStore), Duration::from_millis(20));

        let err = ServerStore::list(&store, "default").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.kind(), ErrorKind::FetchFailure);

        // Registry calls still go to the healthy adapter
        assert!(RegistryStore::list(&store, None).await.unwrap().is_empty());
    }
}
