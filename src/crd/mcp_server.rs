//! MCPServer CRD
//!
//! A running MCP server instance. Instances are created by an external
//! deployment action and may be owned by at most one registry through the
//! ownership labels in [`super::labels`].

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// MCPServer CRD
// =============================================================================

/// MCPServer describes one deployed MCP server.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "toolhive.stacklok.dev",
    version = "v1alpha1",
    kind = "MCPServer",
    plural = "mcpservers",
    shortname = "mcpsrv",
    status = "MCPServerStatus",
    printcolumn = r#"{"name": "Image", "type": "string", "jsonPath": ".spec.image"}"#,
    printcolumn = r#"{"name": "Transport", "type": "string", "jsonPath": ".spec.transport"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "URL", "type": "string", "jsonPath": ".status.url"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MCPServerSpec {
    /// Container image
    pub image: String,

    /// Transport the server speaks
    #[serde(default)]
    pub transport: Transport,

    /// Service port
    #[serde(default)]
    pub port: Option<u16>,

    /// Container port the service forwards to
    #[serde(default)]
    pub target_port: Option<u16>,
}

/// MCP transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Stdio => write!(f, "stdio"),
            Transport::Sse => write!(f, "sse"),
            Transport::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Status of the MCPServer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MCPServerStatus {
    #[serde(default)]
    pub phase: ServerPhase,

    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub url: Option<String>,
}

/// Server lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ServerPhase {
    #[default]
    Pending,
    Running,
    Failed,
    Terminating,
}

impl std::fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerPhase::Pending => write!(f, "Pending"),
            ServerPhase::Running => write!(f, "Running"),
            ServerPhase::Failed => write!(f, "Failed"),
            ServerPhase::Terminating => write!(f, "Terminating"),
        }
    }
}

impl std::str::FromStr for ServerPhase {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ServerPhase::Pending),
            "running" => Ok(ServerPhase::Running),
            "failed" => Ok(ServerPhase::Failed),
            "terminating" => Ok(ServerPhase::Terminating),
            _ => Err(crate::error::Error::InvalidArgument(format!(
                "unknown server phase '{}'",
                s
            ))),
        }
    }
}

// =============================================================================
// Implementations
// =============================================================================

impl MCPServer {
    /// Get the server name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Current phase, Pending when no status was written yet
    pub fn phase(&self) -> ServerPhase {
        self.status
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    /// Check if the server reports ready
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map(|s| s.ready).unwrap_or(false)
    }
}
