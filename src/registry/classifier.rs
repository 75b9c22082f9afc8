//! Server Classifier
//!
//! Partitions the MCPServers of a namespace into deployed (complete ownership
//! triple) and orphaned (anything less). Classification is total and the two
//! sets are disjoint.

use super::ownership::Ownership;
use crate::crd::{MCPServer, ServerPhase};
use crate::domain::ports::ResourceKey;
use serde::Serialize;

// =============================================================================
// Classification Result
// =============================================================================

/// A server owned by a registry
#[derive(Debug, Clone)]
pub struct DeployedServer {
    pub server: MCPServer,
    pub ownership: Ownership,
}

/// Result of one classifier scan
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub deployed: Vec<DeployedServer>,
    pub orphaned: Vec<MCPServer>,
}

impl Classification {
    /// Deployed servers owned by one registry
    pub fn owned_by<'a>(
        &'a self,
        registry: &'a ResourceKey,
    ) -> impl Iterator<Item = &'a DeployedServer> + 'a {
        self.deployed
            .iter()
            .filter(move |d| d.ownership.is_owned_by(registry))
    }
}

/// Summary view returned by the admin API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub transport: String,
    pub phase: ServerPhase,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
}

impl ServerSummary {
    pub fn from_server(server: &MCPServer, ownership: Option<Ownership>) -> Self {
        let key = ResourceKey::of_server(server);
        Self {
            name: key.name,
            namespace: key.namespace,
            image: server.spec.image.clone(),
            transport: server.spec.transport.to_string(),
            phase: server.phase(),
            ready: server.is_ready(),
            url: server.status.as_ref().and_then(|s| s.url.clone()),
            ownership,
        }
    }
}

impl From<&DeployedServer> for ServerSummary {
    fn from(d: &DeployedServer) -> Self {
        ServerSummary::from_server(&d.server, Some(d.ownership.clone()))
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// Classify servers by ownership label presence
pub fn classify(servers: Vec<MCPServer>) -> Classification {
    let mut result = Classification::default();

    for server in servers {
        match Ownership::of_server(&server) {
            Some(ownership) => result.deployed.push(DeployedServer { server, ownership }),
            None => result.orphaned.push(server),
        }
    }

    tracing::debug!(
        deployed = result.deployed.len(),
        orphaned = result.orphaned.len(),
        "Classified servers"
    );

    result
}
