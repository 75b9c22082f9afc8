//! Sync pipeline building blocks
//!
//! - `trigger`: decides whether a registry is due
//! - `lifecycle`: status transitions of the registry state machine
//! - `resolver`: registry to endpoint
//! - `fetcher`: endpoint to raw payload, directly or through the API-server proxy
//! - `normalize`: payload to server entries
//! - `sample`: development-only built-in data

pub mod fetcher;
pub mod lifecycle;
pub mod normalize;
pub mod resolver;
pub mod sample;
pub mod trigger;

pub use fetcher::{EndpointFetcher, EndpointMode, FetcherConfig, InternalService};
pub use lifecycle::{begin_sync, complete_failure, complete_success, entries_hash};
pub use resolver::resolve;
pub use sample::SampleFetcher;
pub use trigger::{trigger_token, SyncCommand, SyncMode, SyncReason, SyncTrigger};
