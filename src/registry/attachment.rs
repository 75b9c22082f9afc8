//! Attachment
//!
//! Adopts an orphaned MCPServer into a registry by writing the ownership
//! label triple in one merge patch. Servers are never created, deleted or
//! unlabeled here.

use super::ownership::Ownership;
use crate::crd::MCPServer;
use crate::domain::ports::{RegistryStoreRef, ResourceKey, ServerStoreRef};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of a connect request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
    #[serde(default)]
    pub registry_name: String,
    /// Defaults to the server's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_namespace: Option<String>,
    #[serde(default)]
    pub server_name_in_registry: String,
}

/// Result of an attachment
#[derive(Debug, Clone)]
pub struct AttachOutcome {
    pub server: MCPServer,
    pub ownership: Ownership,
    /// False when the labels were already in place
    pub changed: bool,
}

/// Applies ownership labels to servers
pub struct ServerAttacher {
    registries: RegistryStoreRef,
    servers: ServerStoreRef,
}

impl ServerAttacher {
    pub fn new(registries: RegistryStoreRef, servers: ServerStoreRef) -> Self {
        Self {
            registries,
            servers,
        }
    }

    /// Attach `server` to the registry named in `request`
    pub async fn attach(&self, server: &ResourceKey, request: &AttachRequest) -> Result<AttachOutcome> {
        let registry_namespace = request
            .registry_namespace
            .as_deref()
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or(&server.namespace);

        let ownership = Ownership::new(
            &request.registry_name,
            registry_namespace,
            &request.server_name_in_registry,
        )?;

        let registry_key = ownership.registry_key();
        if self.registries.get(&registry_key).await?.is_none() {
            return Err(Error::ResourceNotFound {
                kind: "MCPRegistry".into(),
                name: registry_key.to_string(),
            });
        }

        let current = self
            .servers
            .get(server)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "MCPServer".into(),
                name: server.to_string(),
            })?;

        match Ownership::of_server(&current) {
            Some(existing) if existing == ownership => {
                debug!("Server {} already attached to {}", server, registry_key);
                return Ok(AttachOutcome {
                    server: current,
                    ownership,
                    changed: false,
                });
            }
            Some(existing) => {
                return Err(Error::AlreadyAttached {
                    server: server.to_string(),
                    registry: existing.registry_key().to_string(),
                });
            }
            None => {}
        }

        let updated = self.servers.patch_labels(server, ownership.to_labels()).await?;

        info!(
            "Attached server {} to registry {} as '{}'",
            server, registry_key, ownership.server_name_in_registry
        );

        Ok(AttachOutcome {
            server: updated,
            ownership,
            changed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::store::MemoryStore;
    use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPServerSpec, RegistrySource, Transport};
    use crate::domain::ports::{RegistryStore, ServerStore};
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryStore>, ServerAttacher) {
        let store = Arc::new(MemoryStore::new());

        let mut registry = MCPRegistry::new(
            "upstream",
            MCPRegistrySpec {
                display_name: "Upstream".into(),
                source: RegistrySource::ConfigRef {
                    object_name: "servers".into(),
                    key: "registry.json".into(),
                },
                sync_policy: None,
                filter: None,
                enforce_servers: false,
            },
        );
        registry.metadata.namespace = Some("default".into());
        RegistryStore::create(store.as_ref(), registry).await.unwrap();

        let mut server = MCPServer::new(
            "fetch-1",
            MCPServerSpec {
                image: "ghcr.io/stackloklabs/gofetch/server:latest".into(),
                transport: Transport::StreamableHttp,
                port: Some(8080),
                target_port: None,
            },
        );
        server.metadata.namespace = Some("default".into());
        store.insert_server(server);

        let attacher = ServerAttacher::new(store.clone(), store.clone());
        (store, attacher)
    }

    fn request(registry: &str, name: &str) -> AttachRequest {
        AttachRequest {
            registry_name: registry.into(),
            registry_namespace: None,
            server_name_in_registry: name.into(),
        }
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let (store, attacher) = setup().await;
        let key = ResourceKey::new("default", "fetch-1");

        let first = attacher.attach(&key, &request("upstream", "fetch")).await.unwrap();
        assert!(first.changed);

        let second = attacher.attach(&key, &request("upstream", "fetch")).await.unwrap();
        assert!(!second.changed);

        let server = ServerStore::get(store.as_ref(), &key).await.unwrap().unwrap();
        assert_eq!(Ownership::of_server(&server), Some(first.ownership));
    }

    #[tokio::test]
    async fn test_attach_validation() {
        let (store, attacher) = setup().await;
        let key = ResourceKey::new("default", "fetch-1");

        let err = attacher.attach(&key, &request("upstream", " ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = attacher.attach(&key, &request("missing", "fetch")).await.unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));

        let err = attacher
            .attach(&ResourceKey::new("default", "nope"), &request("upstream", "fetch"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));

        // No partial labels after failed attempts
        let server = ServerStore::get(store.as_ref(), &key).await.unwrap().unwrap();
        assert!(Ownership::of_server(&server).is_none());
    }

    #[tokio::test]
    async fn test_attach_to_other_registry_conflicts() {
        let (_store, attacher) = setup().await;
        let key = ResourceKey::new("default", "fetch-1");

        attacher.attach(&key, &request("upstream", "fetch")).await.unwrap();
        let err = attacher.attach(&key, &request("upstream", "gofetch")).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyAttached { .. }));
    }
}
