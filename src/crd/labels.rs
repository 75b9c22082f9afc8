//! Label and annotation keys shared by the registry controller.

/// Name of the owning MCPRegistry
pub const REGISTRY_NAME_LABEL: &str = "toolhive.stacklok.dev/registry-name";

/// Namespace of the owning MCPRegistry
pub const REGISTRY_NAMESPACE_LABEL: &str = "toolhive.stacklok.dev/registry-namespace";

/// Name of the server entry inside the owning registry
pub const SERVER_NAME_LABEL: &str = "toolhive.stacklok.dev/server-name";

/// Timestamp token requesting a sync; observed by the scheduler
pub const SYNC_TRIGGER_ANNOTATION: &str = "toolhive.stacklok.dev/sync-trigger";

/// Field manager used for patches
pub const FIELD_MANAGER: &str = "mcp-registry-operator";
