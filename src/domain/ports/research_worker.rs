//! Worker dispatch port - interface for external research workers.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CancelFlag, DispatchOutcome, DispatchRequest};

/// Trait for external research workers.
///
/// A worker searches, downloads and extracts material for one batch of a
/// task and reports candidate facts and sources. Timeouts and the single
/// retry are enforced by the dispatcher, not by implementations.
#[async_trait]
pub trait ResearchWorker: Send + Sync {
    /// Get the worker type name.
    fn name(&self) -> &'static str;

    /// Run one batch. Implementations should check `cancel` and return
    /// partial results early once it is revoked.
    async fn dispatch(
        &self,
        request: DispatchRequest,
        cancel: CancelFlag,
    ) -> DomainResult<DispatchOutcome>;
}
