//! Cluster Store
//!
//! Reads and writes MCPRegistry and MCPServer custom resources through the
//! API server. Partial updates are JSON merge patches.

use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, MCPServer, FIELD_MANAGER};
use crate::domain::ports::{RegistryStore, ResourceKey, ServerStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Store backed by the cluster API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn registries(&self, namespace: &str) -> Api<MCPRegistry> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn servers(&self, namespace: &str) -> Api<MCPServer> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn patch_params() -> PatchParams {
        PatchParams::apply(FIELD_MANAGER)
    }
}

/// Translate API-server 404/409 into the operator's own variants
fn map_api_error(err: kube::Error, kind: &str, key: &ResourceKey) -> Error {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => Error::ResourceNotFound {
            kind: kind.to_string(),
            name: key.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 409 => Error::ResourceExists {
            kind: kind.to_string(),
            name: key.to_string(),
        },
        _ => Error::Kube(err),
    }
}

#[async_trait]
impl RegistryStore for KubeStore {
    async fn create(&self, registry: MCPRegistry) -> Result<MCPRegistry> {
        let key = ResourceKey::of_registry(&registry);
        let created = self
            .registries(&key.namespace)
            .create(&PostParams::default(), &registry)
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", &key))?;
        info!("Created MCPRegistry {}", key);
        Ok(created)
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPRegistry>> {
        Ok(self.registries(&key.namespace).get_opt(&key.name).await?)
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<MCPRegistry>> {
        let api: Api<MCPRegistry> = match namespace {
            Some(ns) => self.registries(ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_spec(&self, key: &ResourceKey, spec: MCPRegistrySpec) -> Result<MCPRegistry> {
        let api = self.registries(&key.namespace);
        let mut current = api
            .get(&key.name)
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", key))?;

        // Replace rather than merge so cleared optional fields are removed;
        // the resourceVersion from the read guards against lost updates
        current.spec = spec;
        let updated = api
            .replace(&key.name, &PostParams::default(), &current)
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", key))?;
        debug!("Replaced spec of MCPRegistry {}", key);
        Ok(updated)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<()> {
        self.registries(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", key))?;
        info!("Deleted MCPRegistry {}", key);
        Ok(())
    }

    async fn patch_status(&self, key: &ResourceKey, status: &MCPRegistryStatus) -> Result<()> {
        let patch = json!({ "status": status });
        self.registries(&key.namespace)
            .patch_status(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", key))?;
        debug!("Patched status of MCPRegistry {} to {}", key, status.phase);
        Ok(())
    }

    async fn patch_annotations(
        &self,
        key: &ResourceKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<()> {
        let patch = json!({ "metadata": { "annotations": annotations } });
        self.registries(&key.namespace)
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(e, "MCPRegistry", key))?;
        Ok(())
    }
}

#[async_trait]
impl ServerStore for KubeStore {
    async fn list(&self, namespace: &str) -> Result<Vec<MCPServer>> {
        Ok(self
            .servers(namespace)
            .list(&ListParams::default())
            .await?
            .items)
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPServer>> {
        Ok(self.servers(&key.namespace).get_opt(&key.name).await?)
    }

    async fn patch_labels(
        &self,
        key: &ResourceKey,
        labels: BTreeMap<String, String>,
    ) -> Result<MCPServer> {
        let patch = json!({ "metadata": { "labels": labels } });
        let server = self
            .servers(&key.namespace)
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_api_error(e, "MCPServer", key))?;
        Ok(server)
    }
}
