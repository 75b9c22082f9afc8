//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use mcp_registry_operator::crd::{
    IncludeExclude, MCPRegistry, MCPRegistrySpec, MCPServer, MCPServerSpec, RegistryFilter,
    RegistrySource, SyncPolicy, Transport, REGISTRY_NAMESPACE_LABEL, REGISTRY_NAME_LABEL,
    SERVER_NAME_LABEL,
};
use mcp_registry_operator::domain::ports::{
    RegistryServerEntry, ResolvedEndpoint, ServerListFetcher,
};
use mcp_registry_operator::{
    Error, ManagerConfig, MemoryStore, OperatorMetrics, RegistryManager, Result,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const NS: &str = "toolhive-system";

/// Fetcher serving a fixed list, optionally held until released
pub struct StaticFetcher {
    entries: Vec<RegistryServerEntry>,
    gate: Option<Arc<Semaphore>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(entries: Vec<RegistryServerEntry>) -> Self {
        Self {
            entries,
            gate: None,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Each list call waits for one permit
    pub fn gated(entries: Vec<RegistryServerEntry>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut fetcher = Self::new(entries);
        fetcher.gate = Some(gate.clone());
        (fetcher, gate)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServerListFetcher for StaticFetcher {
    async fn list_servers(&self, endpoint: &ResolvedEndpoint) -> Result<Vec<RegistryServerEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
            permit.forget();
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::UpstreamStatus {
                endpoint: endpoint.url().to_string(),
                status: 503,
            });
        }
        Ok(self.entries.clone())
    }

    async fn get_server(
        &self,
        endpoint: &ResolvedEndpoint,
        name: &str,
    ) -> Result<Option<RegistryServerEntry>> {
        Ok(self
            .list_servers(endpoint)
            .await?
            .into_iter()
            .find(|e| e.name == name))
    }

    fn fetcher_name(&self) -> &str {
        "static"
    }
}

pub fn entry(name: &str, tags: &[&str]) -> RegistryServerEntry {
    RegistryServerEntry {
        name: name.to_string(),
        image: format!("ghcr.io/example/{}:latest", name),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

/// Entries from the filter example: only `mcp-web` survives `example_filter`
pub fn example_entries() -> Vec<RegistryServerEntry> {
    vec![
        entry("mcp-web", &["web"]),
        entry("mcp-test", &["web", "deprecated"]),
        entry("db-tool", &["database"]),
    ]
}

pub fn example_filter() -> RegistryFilter {
    RegistryFilter {
        names: Some(IncludeExclude {
            include: vec!["mcp-*".into()],
            exclude: vec![],
        }),
        tags: Some(IncludeExclude {
            include: vec![],
            exclude: vec!["deprecated".into()],
        }),
    }
}

pub fn registry_spec(filter: Option<RegistryFilter>, interval: Option<&str>) -> MCPRegistrySpec {
    MCPRegistrySpec {
        display_name: "Upstream Registry".into(),
        source: RegistrySource::Git {
            repository: "https://github.com/stacklok/toolhive.git".into(),
            branch: "main".into(),
            path: "pkg/registry/data/registry.json".into(),
        },
        sync_policy: interval.map(|i| SyncPolicy { interval: i.into() }),
        filter,
        enforce_servers: false,
    }
}

pub fn registry(name: &str, spec: MCPRegistrySpec) -> MCPRegistry {
    let mut registry = MCPRegistry::new(name, spec);
    registry.metadata.namespace = Some(NS.to_string());
    registry
}

pub fn server(name: &str, owner: Option<(&str, &str)>) -> MCPServer {
    let mut server = MCPServer::new(
        name,
        MCPServerSpec {
            image: format!("ghcr.io/example/{}:latest", name),
            transport: Transport::Stdio,
            port: None,
            target_port: None,
        },
    );
    server.metadata.namespace = Some(NS.to_string());
    if let Some((registry, name_in_registry)) = owner {
        server.metadata.labels = Some(BTreeMap::from([
            (REGISTRY_NAME_LABEL.to_string(), registry.to_string()),
            (REGISTRY_NAMESPACE_LABEL.to_string(), NS.to_string()),
            (SERVER_NAME_LABEL.to_string(), name_in_registry.to_string()),
        ]));
    }
    server
}

pub fn manager(store: Arc<MemoryStore>, fetcher: Arc<dyn ServerListFetcher>) -> Arc<RegistryManager> {
    manager_with_timeout(store, fetcher, Duration::from_secs(5))
}

pub fn manager_with_timeout(
    store: Arc<MemoryStore>,
    fetcher: Arc<dyn ServerListFetcher>,
    sync_timeout: Duration,
) -> Arc<RegistryManager> {
    RegistryManager::new(
        ManagerConfig { sync_timeout },
        store.clone(),
        store,
        fetcher,
        Arc::new(OperatorMetrics::new().expect("metrics")),
    )
}
