//! Control Plane Module
//!
//! Wires the pure registry and sync logic to stores, the scheduler, metrics
//! and the admin API.

pub mod api;
pub mod manager;
pub mod metrics;
pub mod scheduler;
pub mod store;

pub use api::*;
pub use manager::*;
pub use metrics::OperatorMetrics;
pub use scheduler::*;
pub use store::*;
