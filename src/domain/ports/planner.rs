//! Planning port - produces the initial task graph for a topic.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ResearchPlan;

#[async_trait]
pub trait Planner: Send + Sync {
    /// Build the initial task graph and declared dimensions for a topic.
    async fn plan(&self, topic: &str) -> DomainResult<ResearchPlan>;
}
