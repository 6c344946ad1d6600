//! Fixture-replay research worker.
//!
//! Serves recorded batches per task id in the order they were recorded.
//! Once a task's recording runs out every further batch is an empty
//! success, which the saturation loop treats as not informative.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CancelFlag, DispatchOutcome, DispatchRequest, TaskId};
use crate::domain::ports::ResearchWorker;

/// One recorded response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    /// Never answers within `stall_secs`; used to exercise dispatch timeouts
    Stall { stall_secs: u64 },
    /// Worker-side error
    Error { error: String },
    Outcome(DispatchOutcome),
}

/// Recorded batches keyed by task id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFixture {
    #[serde(default)]
    pub tasks: HashMap<TaskId, Vec<ReplayStep>>,
}

impl ReplayFixture {
    pub fn from_yaml(text: &str) -> DomainResult<Self> {
        serde_yaml::from_str(text).map_err(|e| DomainError::Serialization(e.to_string()))
    }

    pub async fn load(path: &Path) -> DomainResult<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::Io(format!("reading worker fixture {}: {e}", path.display()))
        })?;
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::from_yaml(&text)
        }
    }
}

#[derive(Debug, Default)]
pub struct ReplayWorker {
    queues: Mutex<HashMap<TaskId, VecDeque<ReplayStep>>>,
    requests: Mutex<Vec<DispatchRequest>>,
}

impl ReplayWorker {
    pub fn new(fixture: ReplayFixture) -> Self {
        let queues = fixture
            .tasks
            .into_iter()
            .map(|(id, steps)| (id, steps.into_iter().collect()))
            .collect();
        Self {
            queues: Mutex::new(queues),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Worker with no recordings; every batch is empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a step to a task's recording.
    pub async fn push(&self, task: impl Into<TaskId>, step: ReplayStep) {
        self.queues
            .lock()
            .await
            .entry(task.into())
            .or_default()
            .push_back(step);
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().await.clone()
    }

    /// Requests received for one task.
    pub async fn requests_for(&self, task: &TaskId) -> Vec<DispatchRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| &r.task_id == task)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResearchWorker for ReplayWorker {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn dispatch(
        &self,
        request: DispatchRequest,
        cancel: CancelFlag,
    ) -> DomainResult<DispatchOutcome> {
        self.requests.lock().await.push(request.clone());
        if cancel.is_revoked() {
            return Ok(DispatchOutcome::empty());
        }

        let step = self
            .queues
            .lock()
            .await
            .get_mut(&request.task_id)
            .and_then(VecDeque::pop_front);
        debug!(
            task_id = %request.task_id,
            batch = request.batch,
            k = request.k,
            recorded = step.is_some(),
            "replaying batch"
        );

        match step {
            None => Ok(DispatchOutcome::empty()),
            Some(ReplayStep::Outcome(outcome)) => Ok(outcome),
            Some(ReplayStep::Error { error }) => Err(DomainError::DispatchFailed {
                task: request.task_id,
                batch: request.batch,
                reason: error,
            }),
            Some(ReplayStep::Stall { stall_secs }) => {
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(stall_secs)) => {}
                    () = cancel.revoked() => {
                        info!(task_id = %request.task_id, "stalled batch cancelled");
                    }
                }
                Ok(DispatchOutcome::empty())
            }
        }
    }
}
