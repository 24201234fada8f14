//! Cloud storage connections.

mod storage;

#[cfg(feature = "mock")]
pub use storage::MockCloudStorage;
pub use storage::{
    CloudConnection, CloudProvider, CloudStorage, ConnectionError, InMemoryCloudStorage,
};
