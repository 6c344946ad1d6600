//! Mission state machine model.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::Dimension;
use super::synthesis::SynthesisReceipt;
use super::task::TaskId;

/// Phase of a research mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Planning,
    Researching,
    Reflecting,
    Synthesizing,
    Completed,
    Error,
}

impl MissionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Researching => "researching",
            Self::Reflecting => "reflecting",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// `Error` is reachable from every non-terminal phase.
    pub fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Completed | Self::Error, _) => false,
            (_, Self::Error) => true,
            (Self::Planning, Self::Researching)
            | (Self::Researching, Self::Reflecting)
            | (Self::Reflecting, Self::Researching | Self::Synthesizing)
            | (Self::Synthesizing, Self::Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a mission entered `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionFailure {
    pub category: String,
    pub message: String,
    pub exit_code: i32,
    /// Phase the mission was in when it failed; resume restarts there
    pub failed_in: MissionPhase,
}

/// Process-wide state of one research mission. Single writer: the
/// mission controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionState {
    pub mission_id: Uuid,
    pub topic: String,
    pub phase: MissionPhase,
    pub iteration: u32,
    pub max_iterations: u32,
    pub dimensions: Vec<Dimension>,
    /// Final saturation counter per dispatched task
    #[serde(default)]
    pub saturation_counters: BTreeMap<TaskId, u32>,
    /// Limitations to be surfaced with the synthesized output
    #[serde(default)]
    pub caveats: Vec<String>,
    #[serde(default)]
    pub gate_remediations: u32,
    /// Counter for ids of tasks injected during reflection
    #[serde(default)]
    pub generated_tasks: u64,
    #[serde(default)]
    pub failure: Option<MissionFailure>,
    /// Set once synthesis has confirmed its output
    #[serde(default)]
    pub receipt: Option<SynthesisReceipt>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MissionState {
    pub fn new(topic: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        Self {
            mission_id: Uuid::new_v4(),
            topic: topic.into(),
            phase: MissionPhase::Planning,
            iteration: 0,
            max_iterations,
            dimensions: Vec::new(),
            saturation_counters: BTreeMap::new(),
            caveats: Vec::new(),
            gate_remediations: 0,
            generated_tasks: 0,
            failure: None,
            receipt: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn iteration_limit_reached(&self) -> bool {
        self.iteration >= self.max_iterations
    }

    /// Next id for a task injected by the controller, e.g. `gap-3`.
    pub fn next_task_id(&mut self, prefix: &str) -> TaskId {
        self.generated_tasks += 1;
        TaskId::new(format!("{prefix}-{}", self.generated_tasks))
    }

    pub fn add_caveat(&mut self, caveat: impl Into<String>) {
        let caveat = caveat.into();
        if !self.caveats.contains(&caveat) {
            self.caveats.push(caveat);
        }
    }
}
