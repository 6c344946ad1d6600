//! Task domain model.
//!
//! Tasks are discrete units of research work. They form a DAG with
//! dependencies and are owned by the `TaskGraph`.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::ConflictId;

/// Identifier of a task, assigned by the planner or by the mission controller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Structural planning milestone, completed without dispatch.
    Plan,
    /// Research execution, driven by the saturation loop.
    Execute,
    /// Arbitration evidence gathering for a HIGH-severity conflict.
    Conflict,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::Conflict => "conflict",
        }
    }
}

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Every dependency is complete; the task may be dispatched
    Pending,
    /// At least one dependency is not complete
    Blocked,
    /// Task is currently dispatched to a worker
    InProgress,
    /// Task completed successfully
    Completed,
    /// Task failed (or was routed around)
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    ///
    /// `Failed` is terminal for dependents but the mission controller may
    /// re-open it explicitly.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Blocked],
            Self::Blocked => &[Self::Pending, Self::Failed],
            Self::InProgress => &[Self::Completed, Self::Failed],
            Self::Completed => &[],
            Self::Failed => &[Self::Pending, Self::Blocked],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of research work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,
    /// Kind of work
    pub kind: TaskKind,
    /// Human-readable title
    pub title: String,
    /// Instructions passed to the worker
    pub description: String,
    /// Current status
    pub status: TaskStatus,
    /// Task IDs this depends on
    pub depends_on: BTreeSet<TaskId>,
    /// Higher runs first
    pub priority: u32,
    /// Declared research dimensions this task must cover
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Whether dispatch needs the global exclusive resource
    #[serde(default)]
    pub exclusive_resource: bool,
    /// Scope handed to the worker (conflict topic for arbitration tasks)
    #[serde(default)]
    pub scope: Option<String>,
    /// Conflict this task arbitrates
    #[serde(default)]
    pub conflict: Option<ConflictId>,
    /// Stopped at the batch cap (or cancelled) without meeting saturation criteria
    #[serde(default)]
    pub partial: bool,
    /// Number of times the task was re-opened after failing
    #[serde(default)]
    pub reopen_count: u32,
    /// Last failure reason
    #[serde(default)]
    pub failure: Option<String>,
    /// Insertion order, assigned by the graph
    #[serde(default)]
    pub seq: u64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When execution started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal state
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, kind: TaskKind, title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            kind,
            description: title.clone(),
            title,
            status: TaskStatus::Pending,
            depends_on: BTreeSet::new(),
            priority: 0,
            dimensions: Vec::new(),
            exclusive_resource: false,
            scope: None,
            conflict: None,
            partial: false,
            reopen_count: 0,
            failure: None,
            seq: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn execute(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self::new(id, TaskKind::Execute, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclusive_resource(mut self, exclusive: bool) -> Self {
        self.exclusive_resource = exclusive;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictId) -> Self {
        self.conflict = Some(conflict);
        self
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to new status, stamping timestamps.
    pub(crate) fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status, new_status
            ));
        }

        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed => {
                self.completed_at = Some(Utc::now());
            }
            TaskStatus::Pending | TaskStatus::Blocked => {
                self.completed_at = None;
            }
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_creation() {
        let task = Task::execute("E1", "Market size")
            .with_priority(5)
            .with_dimensions(["size", "growth"]);
        assert_eq!(task.id.as_str(), "E1");
        assert_eq!(task.kind, TaskKind::Execute);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.description, "Market size");
        assert_eq!(task.dimensions, vec!["size".to_string(), "growth".to_string()]);
    }

    #[test]
    fn test_task_state_transitions() {
        let mut task = Task::execute("E1", "t");
        task.transition_to(TaskStatus::InProgress).unwrap();
        assert!(task.started_at.is_some());
        task.transition_to(TaskStatus::Completed).unwrap();
        assert!(task.completed_at.is_some());
        assert!(task.is_terminal());
        assert!(task.transition_to(TaskStatus::Pending).is_err());
    }

    #[test]
    fn test_failed_task_can_be_reopened() {
        let mut task = Task::execute("E1", "t");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.transition_to(TaskStatus::Failed).unwrap();
        assert!(task.is_terminal());
        task.transition_to(TaskStatus::Pending).unwrap();
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_blocked_cannot_start() {
        let mut task = Task::execute("E1", "t");
        task.transition_to(TaskStatus::Blocked).unwrap();
        assert!(!task.can_transition_to(TaskStatus::InProgress));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let kind: TaskKind = serde_json::from_str("\"conflict\"").unwrap();
        assert_eq!(kind, TaskKind::Conflict);
    }
}
