//! Domain errors for the research mission core.

use thiserror::Error;

use super::models::{ConflictId, FactId, TaskId};

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[TaskId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_fact_ids(facts: &[FactId]) -> String {
    facts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors that can occur while running a research mission.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Dependency cycle rejected while adding task {task}: {}", format_cycle_path(.path))]
    Cycle { task: TaskId, path: Vec<TaskId> },

    #[error("Unsourced fact rejected for task {task}: field `{field}` {reason}")]
    Hallucination {
        task: TaskId,
        field: &'static str,
        reason: String,
    },

    #[error("Dispatch of task {task} (batch {batch}) timed out after {timeout_secs}s")]
    DispatchTimeout {
        task: TaskId,
        batch: u32,
        timeout_secs: u64,
    },

    #[error("Dispatch of task {task} (batch {batch}) failed: {reason}")]
    DispatchFailed {
        task: TaskId,
        batch: u32,
        reason: String,
    },

    #[error("Iteration limit reached: iteration {iteration} of {max}")]
    IterationLimitExceeded { iteration: u32, max: u32 },

    #[error("Citation gate blocked by facts without valid sources: {}", format_fact_ids(.facts))]
    CitationGateBlocked { facts: Vec<FactId> },

    #[error("Unrecoverable mission error: {context}")]
    Unrecoverable { context: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Invalid transition for task {task} from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: String,
        to: String,
    },

    #[error("Fact not found: {0}")]
    FactNotFound(FactId),

    #[error("Conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    #[error("Exclusive resource `{resource}` not acquired by {holder} within {waited_secs}s")]
    ResourceTimeout {
        resource: String,
        holder: String,
        waited_secs: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Process exit code for this error category.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Cycle { .. } => 2,
            Self::Hallucination { .. } => 3,
            Self::DispatchTimeout { .. } | Self::DispatchFailed { .. } => 4,
            Self::CitationGateBlocked { .. } => 5,
            Self::IterationLimitExceeded { .. } => 6,
            _ => 7,
        }
    }

    /// Short category label, used in logs and persisted failure records.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Cycle { .. } => "cycle",
            Self::Hallucination { .. } => "hallucination",
            Self::DispatchTimeout { .. } => "dispatch_timeout",
            Self::DispatchFailed { .. } => "dispatch_failed",
            Self::IterationLimitExceeded { .. } => "iteration_limit_exceeded",
            Self::CitationGateBlocked { .. } => "citation_gate_blocked",
            _ => "unrecoverable",
        }
    }

    /// Whether local recovery (retry, re-open, route-around) may handle this error.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DispatchTimeout { .. }
                | Self::DispatchFailed { .. }
                | Self::IterationLimitExceeded { .. }
                | Self::CitationGateBlocked { .. }
                | Self::Hallucination { .. }
                | Self::ResourceTimeout { .. }
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_path() {
        let err = DomainError::Cycle {
            task: TaskId::new("E2"),
            path: vec![TaskId::new("E2"), TaskId::new("E1"), TaskId::new("E2")],
        };
        assert_eq!(
            err.to_string(),
            "Dependency cycle rejected while adding task E2: E2 -> E1 -> E2"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_gate_message_names_facts() {
        let err = DomainError::CitationGateBlocked {
            facts: vec![FactId::new(3), FactId::new(7)],
        };
        assert!(err.to_string().contains("F3, F7"));
        assert_eq!(err.exit_code(), 5);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_exit_codes_are_distinct_per_category() {
        let errors = [
            DomainError::Cycle {
                task: TaskId::new("a"),
                path: vec![],
            },
            DomainError::Hallucination {
                task: TaskId::new("a"),
                field: "source_ids",
                reason: "is empty".to_string(),
            },
            DomainError::DispatchTimeout {
                task: TaskId::new("a"),
                batch: 1,
                timeout_secs: 1,
            },
            DomainError::CitationGateBlocked { facts: vec![] },
            DomainError::IterationLimitExceeded {
                iteration: 50,
                max: 50,
            },
            DomainError::Unrecoverable {
                context: "x".to_string(),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(DomainError::exit_code).collect();
        codes.dedup();
        assert_eq!(codes, vec![2, 3, 4, 5, 6, 7]);
        assert!(codes.iter().all(|c| *c != 0));
    }
}
