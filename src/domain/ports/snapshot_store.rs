//! Snapshot persistence port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Durable home of the last committed mission snapshot.
///
/// Stores opaque bytes: a `load` after `save` must return exactly the bytes
/// that were saved.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Atomically replace the committed snapshot.
    async fn save(&self, bytes: &[u8]) -> DomainResult<()>;

    /// Load the committed snapshot, if any.
    async fn load(&self) -> DomainResult<Option<Vec<u8>>>;
}
