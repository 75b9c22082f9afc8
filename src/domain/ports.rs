//! Domain Ports - Core trait definitions for the registry operator
//!
//! These traits define the boundaries between the registry lifecycle logic and
//! external systems: the cluster-resource store and registry endpoints.
//! Adapters implement these traits to provide concrete functionality.

use crate::crd::{MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, MCPServer};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Resource Keys
// =============================================================================

/// Namespaced identity of a cluster resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a registry resource
    pub fn of_registry(registry: &MCPRegistry) -> Self {
        Self::new(registry.namespace_or_default(), registry.name())
    }

    /// Key of a server resource
    pub fn of_server(server: &MCPServer) -> Self {
        Self::new(
            server.metadata.namespace.as_deref().unwrap_or("default"),
            server.name(),
        )
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Registry Server Entries
// =============================================================================

/// One server definition inside a registry's resolved server list.
///
/// Not persisted; recomputed on every sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryServerEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "tools")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, alias = "tools_count", skip_serializing_if = "Option::is_none")]
    pub tools_count: Option<u32>,
    #[serde(default, alias = "env_vars", skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVarSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntryMetadata>,
}

impl RegistryServerEntry {
    /// Check whether the entry carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Environment variable declared by a server entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub secret: bool,
}

/// Popularity metadata for a server entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub pulls: Option<u64>,
    #[serde(default, alias = "last_updated")]
    pub last_updated: Option<String>,
}

// =============================================================================
// Resolved Endpoints
// =============================================================================

/// Where a registry's server list is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum ResolvedEndpoint {
    /// A live registry API; logical paths are appended to the base
    Api(String),
    /// A static registry document holding the full list
    Document(String),
}

impl ResolvedEndpoint {
    /// URL of the endpoint
    pub fn url(&self) -> &str {
        match self {
            ResolvedEndpoint::Api(url) | ResolvedEndpoint::Document(url) => url,
        }
    }
}

impl std::fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedEndpoint::Api(url) => write!(f, "api:{}", url),
            ResolvedEndpoint::Document(url) => write!(f, "document:{}", url),
        }
    }
}

// =============================================================================
// Registry Store Port
// =============================================================================

/// Port for MCPRegistry persistence, keyed by (namespace, name)
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Create a registry; fails with a conflict if the key exists
    async fn create(&self, registry: MCPRegistry) -> Result<MCPRegistry>;

    /// Get a registry
    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPRegistry>>;

    /// List registries, optionally restricted to one namespace
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<MCPRegistry>>;

    /// Replace the spec of an existing registry
    async fn update_spec(&self, key: &ResourceKey, spec: MCPRegistrySpec) -> Result<MCPRegistry>;

    /// Delete a registry
    async fn delete(&self, key: &ResourceKey) -> Result<()>;

    /// Merge-patch the status subresource
    async fn patch_status(&self, key: &ResourceKey, status: &MCPRegistryStatus) -> Result<()>;

    /// Merge-patch metadata annotations
    async fn patch_annotations(
        &self,
        key: &ResourceKey,
        annotations: BTreeMap<String, String>,
    ) -> Result<()>;
}

// =============================================================================
// Server Store Port
// =============================================================================

/// Port for MCPServer persistence
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// List all servers in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<MCPServer>>;

    /// Get a server
    async fn get(&self, key: &ResourceKey) -> Result<Option<MCPServer>>;

    /// Merge-patch metadata labels in a single write
    async fn patch_labels(
        &self,
        key: &ResourceKey,
        labels: BTreeMap<String, String>,
    ) -> Result<MCPServer>;
}

// =============================================================================
// Server List Fetcher Port
// =============================================================================

/// Port for fetching server listings from a resolved endpoint
#[async_trait]
pub trait ServerListFetcher: Send + Sync {
    /// Fetch the full server list
    async fn list_servers(&self, endpoint: &ResolvedEndpoint) -> Result<Vec<RegistryServerEntry>>;

    /// Fetch one server; `None` when the endpoint reports it absent
    async fn get_server(
        &self,
        endpoint: &ResolvedEndpoint,
        name: &str,
    ) -> Result<Option<RegistryServerEntry>>;

    /// Fetcher name for logs
    fn fetcher_name(&self) -> &str;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type RegistryStoreRef = Arc<dyn RegistryStore>;
pub type ServerStoreRef = Arc<dyn ServerStore>;
pub type ServerListFetcherRef = Arc<dyn ServerListFetcher>;
