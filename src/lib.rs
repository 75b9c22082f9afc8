//! MCP Registry Operator
//!
//! A Kubernetes operator that keeps MCP server registries in sync with their
//! sources and reconciles running MCP servers against them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              Admin REST API                                  │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────────────────────────────────────┐   │
//! │  │  Sync Scheduler │  │                Registry Manager                 │   │
//! │  │  (interval and  │──│  lifecycle: Pending → Syncing → Ready | Error   │   │
//! │  │   annotation)   │  │  server views, attachment                       │   │
//! │  └─────────────────┘  └───────┬───────────────────────────┬─────────────┘   │
//! │                               │                           │                 │
//! │          ┌────────────────────┴──────┐        ┌───────────┴─────────────┐   │
//! │          │ Resolver → Fetcher →      │        │ Classifier (deployed /  │   │
//! │          │ Normalize → Filter        │        │ orphaned) + Attachment  │   │
//! │          └────────────┬──────────────┘        └───────────┬─────────────┘   │
//! ├───────────────────────┼───────────────────────────────────┼─────────────────┤
//! │   Registry endpoints  │  direct HTTP or API-server proxy  │  Store adapters │
//! │                       │                                   │  (kube, memory) │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Manager, scheduler, stores, metrics and the admin API
//! - [`sync`]: Sync trigger, lifecycle transitions, resolution and fetching
//! - [`registry`]: Filtering, ownership, classification and attachment
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Core domain types and traits
//! - [`error`]: Error types and handling

pub mod controlplane;
pub mod crd;
pub mod domain;
pub mod error;
pub mod registry;
pub mod sync;

// Re-export commonly used types
pub use controlplane::{
    ApiServer, ApiServerConfig, ManagerConfig, MemoryStore, OperatorMetrics, RegistryManager,
    RestRouter, SchedulerConfig, StoreBackend, StoreFactory, Stores, SyncScheduler, SyncTicket,
};

pub use crd::{
    MCPRegistry, MCPRegistrySpec, MCPRegistryStatus, MCPServer, MCPServerSpec, MCPServerStatus,
    RegistryFilter, RegistryPhase, RegistrySource, ServerPhase, SyncPolicy, Transport,
};

pub use domain::ports::{
    RegistryServerEntry, RegistryStore, ResolvedEndpoint, ResourceKey, ServerListFetcher,
    ServerStore,
};

pub use error::{Error, ErrorKind, Result};

pub use registry::{AttachRequest, Ownership};

pub use sync::{EndpointFetcher, FetcherConfig, SampleFetcher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
