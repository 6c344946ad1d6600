//! File-backed planner.
//!
//! Reads a YAML or JSON research plan (dimensions plus the initial task
//! graph). The format is picked from the file extension; anything that is
//! not `.json` is parsed as YAML.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ResearchPlan;
use crate::domain::ports::Planner;

#[derive(Debug, Clone)]
pub struct FilePlanner {
    path: PathBuf,
}

impl FilePlanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse plan text. JSON when `json` is set, YAML otherwise.
    pub fn parse(text: &str, json: bool) -> DomainResult<ResearchPlan> {
        if json {
            Ok(serde_json::from_str(text)?)
        } else {
            serde_yaml::from_str(text).map_err(|e| DomainError::Serialization(e.to_string()))
        }
    }
}

#[async_trait]
impl Planner for FilePlanner {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn plan(&self, topic: &str) -> DomainResult<ResearchPlan> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DomainError::Io(format!("reading plan {}: {e}", self.path.display()))
        })?;
        let json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let plan = Self::parse(&text, json)?;
        info!(
            topic,
            tasks = plan.tasks.len(),
            dimensions = plan.dimensions.len(),
            "research plan loaded"
        );
        Ok(plan)
    }
}
