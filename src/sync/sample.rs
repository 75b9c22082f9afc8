//! Development Sample Data
//!
//! A fixed server list for local development and demos. Only selected by the
//! explicit `--dev-sample-data` flag; never substituted for a failed fetch.

use crate::domain::ports::{
    EntryMetadata, EnvVarSpec, RegistryServerEntry, ResolvedEndpoint, ServerListFetcher,
};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Fetcher that ignores the endpoint and serves built-in entries
#[derive(Debug, Clone, Default)]
pub struct SampleFetcher;

impl SampleFetcher {
    pub fn new() -> Self {
        Self
    }

    /// The built-in entries
    pub fn entries() -> Vec<RegistryServerEntry> {
        vec![
            sample(
                "fetch",
                "ghcr.io/stackloklabs/gofetch/server:latest",
                &["web", "http"],
                &["fetch"],
                "streamable-http",
                vec![],
            ),
            sample(
                "github",
                "ghcr.io/github/github-mcp-server:latest",
                &["git", "api"],
                &["create_issue", "get_pull_request", "search_repositories"],
                "stdio",
                vec![EnvVarSpec {
                    name: "GITHUB_PERSONAL_ACCESS_TOKEN".into(),
                    description: Some("Token used for GitHub API calls".into()),
                    required: true,
                    secret: true,
                }],
            ),
            sample(
                "osv",
                "ghcr.io/stackloklabs/osv-mcp/server:latest",
                &["security", "vulnerability"],
                &["query_vulnerability", "get_vulnerability"],
                "streamable-http",
                vec![],
            ),
            sample(
                "time",
                "mcp/time:latest",
                &["utility"],
                &["get_current_time", "convert_time"],
                "stdio",
                vec![],
            ),
            sample(
                "sqlite",
                "mcp/sqlite:latest",
                &["database", "deprecated"],
                &["read_query", "write_query", "list_tables"],
                "stdio",
                vec![],
            ),
        ]
    }
}

fn sample(
    name: &str,
    image: &str,
    tags: &[&str],
    tools: &[&str],
    transport: &str,
    env_vars: Vec<EnvVarSpec>,
) -> RegistryServerEntry {
    RegistryServerEntry {
        name: name.into(),
        image: image.into(),
        version: Some("latest".into()),
        description: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        capabilities: tools.iter().map(|t| t.to_string()).collect(),
        tier: Some("Community".into()),
        transport: Some(transport.into()),
        tools_count: Some(tools.len() as u32),
        env_vars,
        metadata: Some(EntryMetadata {
            stars: Some(0),
            pulls: Some(0),
            last_updated: None,
        }),
    }
}

#[async_trait]
impl ServerListFetcher for SampleFetcher {
    async fn list_servers(&self, endpoint: &ResolvedEndpoint) -> Result<Vec<RegistryServerEntry>> {
        debug!("Serving sample data in place of {}", endpoint);
        Ok(Self::entries())
    }

    async fn get_server(
        &self,
        _endpoint: &ResolvedEndpoint,
        name: &str,
    ) -> Result<Option<RegistryServerEntry>> {
        Ok(Self::entries().into_iter().find(|e| e.name == name))
    }

    fn fetcher_name(&self) -> &str {
        "sample"
    }
}
