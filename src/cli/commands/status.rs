//! `status` - inspect a committed mission snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{load_snapshot, snapshot_path};
use crate::application::MissionSnapshot;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Config, Conflict, MissionFailure, MissionPhase, Task, TaskStatus};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Override snapshot.path
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub mission_id: String,
    pub topic: String,
    pub phase: MissionPhase,
    pub iteration: u32,
    pub max_iterations: u32,
    pub failure: Option<MissionFailure>,
    pub facts: usize,
    pub quarantined: usize,
    pub sources: usize,
    pub tasks: Vec<Task>,
    pub conflicts: Vec<Conflict>,
    pub caveats: Vec<String>,
}

impl From<MissionSnapshot> for StatusOutput {
    fn from(snapshot: MissionSnapshot) -> Self {
        let MissionSnapshot {
            state,
            graph,
            evidence,
            conflicts,
            ..
        } = snapshot;
        Self {
            mission_id: state.mission_id.to_string(),
            topic: state.topic,
            phase: state.phase,
            iteration: state.iteration,
            max_iterations: state.max_iterations,
            failure: state.failure,
            facts: evidence.fact_count(),
            quarantined: evidence.quarantined().len(),
            sources: evidence.source_count(),
            tasks: graph.tasks().cloned().collect(),
            conflicts: conflicts.conflicts().to_vec(),
            caveats: state.caveats,
        }
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let count = |status: TaskStatus| self.tasks.iter().filter(|t| t.status == status).count();

        let mut rows = vec![
            ("Mission", self.mission_id.clone()),
            ("Topic", self.topic.clone()),
            ("Phase", self.phase.to_string()),
            ("Iteration", format!("{} / {}", self.iteration, self.max_iterations)),
            (
                "Tasks",
                format!(
                    "{} total, {} completed, {} failed, {} pending, {} blocked",
                    self.tasks.len(),
                    count(TaskStatus::Completed),
                    count(TaskStatus::Failed),
                    count(TaskStatus::Pending),
                    count(TaskStatus::Blocked)
                ),
            ),
            (
                "Evidence",
                format!(
                    "{} facts ({} quarantined), {} sources",
                    self.facts, self.quarantined, self.sources
                ),
            ),
        ];
        if let Some(failure) = &self.failure {
            rows.push((
                "Failure",
                format!(
                    "{} in {} (exit {}): {}",
                    failure.category, failure.failed_in, failure.exit_code, failure.message
                ),
            ));
        }

        let mut sections = vec![formatter.format_pairs(&rows)];
        if !self.tasks.is_empty() {
            sections.push(formatter.format_tasks(&self.tasks));
        }
        if !self.conflicts.is_empty() {
            sections.push(formatter.format_conflicts(&self.conflicts));
        }
        if !self.caveats.is_empty() {
            let mut caveats = vec!["Caveats:".to_string()];
            caveats.extend(self.caveats.iter().map(|c| format!("  - {c}")));
            sections.push(caveats.join("\n"));
        }
        sections.join("\n\n")
    }
}

pub async fn execute(args: StatusArgs, config: Config, json: bool) -> Result<i32> {
    let path = snapshot_path(args.snapshot.as_deref(), &config);
    let snapshot = load_snapshot(&path).await?;
    output(&StatusOutput::from(snapshot), json);
    Ok(0)
}
