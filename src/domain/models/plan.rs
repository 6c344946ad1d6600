//! Research plan produced by the planning collaborator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId, TaskKind};

/// A declared sub-aspect of the mission's core question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    /// Primary dimensions bear on the core question
    #[serde(default)]
    pub primary: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, primary: bool) -> Self {
        Self {
            name: name.into(),
            primary,
        }
    }
}

/// One node of the initial task graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub id: TaskId,
    #[serde(default = "default_kind")]
    pub kind: TaskKind,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub exclusive_resource: bool,
}

const fn default_kind() -> TaskKind {
    TaskKind::Execute
}

impl PlannedTask {
    pub fn into_task(self) -> (Task, BTreeSet<TaskId>) {
        let description = self.description.unwrap_or_else(|| self.title.clone());
        let task = Task::new(self.id, self.kind, self.title)
            .with_description(description)
            .with_priority(self.priority)
            .with_dimensions(self.dimensions)
            .with_exclusive_resource(self.exclusive_resource);
        (task, self.depends_on.into_iter().collect())
    }
}

/// Initial task graph and declared dimensions for a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResearchPlan {
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
}

impl ResearchPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
