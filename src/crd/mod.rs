//! Custom Resource Definitions for the MCP Registry Operator
//!
//! - MCPRegistry: a source of server definitions and its sync state
//! - MCPServer: a running server instance, optionally owned by a registry

pub mod labels;
pub mod mcp_registry;
pub mod mcp_server;

pub use labels::*;
pub use mcp_registry::*;
pub use mcp_server::*;
