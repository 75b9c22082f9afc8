//! Resource Store Adapters
//!
//! Provides adapters for the registry and server store ports:
//! - KubeStore: custom resources through the API server
//! - MemoryStore: in-process maps for standalone runs and tests
//! - BoundedStore: timeout decorator applied to either

pub mod bounded;
pub mod cluster;
pub mod memory;

pub use bounded::BoundedStore;
pub use cluster::KubeStore;
pub use memory::MemoryStore;

use crate::domain::ports::{RegistryStoreRef, ServerStoreRef};
use std::sync::Arc;
use std::time::Duration;

/// Which adapter backs the stores
pub enum StoreBackend {
    Kube(kube::Client),
    Memory(Arc<MemoryStore>),
}

/// Registry and server store handles sharing one backend
#[derive(Clone)]
pub struct Stores {
    pub registries: RegistryStoreRef,
    pub servers: ServerStoreRef,
}

/// Factory for store adapters
pub struct StoreFactory;

impl StoreFactory {
    /// Build both stores, bounded by `timeout`
    pub fn create(backend: StoreBackend, timeout: Duration) -> Stores {
        let (registries, servers): (RegistryStoreRef, ServerStoreRef) = match backend {
            StoreBackend::Kube(client) => {
                let store = Arc::new(KubeStore::new(client));
                (store.clone(), store)
            }
            StoreBackend::Memory(store) => (store.clone(), store),
        };

        let bounded = Arc::new(BoundedStore::new(registries, servers, timeout));
        Stores {
            registries: bounded.clone(),
            servers: bounded,
        }
    }
}
