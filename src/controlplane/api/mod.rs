//! API Module
//!
//! Admin REST API for registries, sync requests and server attachment.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
