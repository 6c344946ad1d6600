//! CLI command implementations.

pub mod gate;
pub mod resume;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::adapters::{BundleSynthesizer, FilePlanner, JsonSnapshotStore, ReplayFixture, ReplayWorker};
use crate::application::{Collaborators, MissionController, MissionOutcome, MissionSnapshot};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, MissionPhase};
use crate::domain::ports::SnapshotStore;
use crate::services::CancelRegistry;

/// Exit code of a mission stopped by Ctrl-C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Snapshot path from the flag, else from configuration.
pub(crate) fn snapshot_path(flag: Option<&Path>, config: &Config) -> PathBuf {
    flag.map_or_else(|| PathBuf::from(&config.snapshot.path), Path::to_path_buf)
}

pub(crate) async fn load_snapshot(path: &Path) -> Result<MissionSnapshot> {
    let bytes = JsonSnapshotStore::new(path)
        .load()
        .await?
        .with_context(|| format!("No mission snapshot at {}", path.display()))?;
    MissionSnapshot::from_bytes(&bytes)
        .with_context(|| format!("Failed to decode snapshot {}", path.display()))
}

/// Paths of the external collaborators of a mission.
pub(crate) struct CollaboratorPaths<'a> {
    pub plan: &'a Path,
    pub worker_fixture: Option<&'a Path>,
    pub output: &'a Path,
    pub snapshot: &'a Path,
}

pub(crate) async fn collaborators(paths: CollaboratorPaths<'_>) -> Result<Collaborators> {
    let worker = match paths.worker_fixture {
        Some(path) => ReplayWorker::new(
            ReplayFixture::load(path)
                .await
                .with_context(|| format!("Failed to load worker fixture {}", path.display()))?,
        ),
        None => {
            warn!("no worker fixture given; every dispatch returns an empty batch");
            ReplayWorker::empty()
        }
    };
    Ok(Collaborators {
        planner: Arc::new(FilePlanner::new(paths.plan)),
        worker: Arc::new(worker),
        synthesizer: Arc::new(BundleSynthesizer::new(paths.output)),
        snapshots: Arc::new(JsonSnapshotStore::new(paths.snapshot)),
    })
}

/// Revoke every dispatch on Ctrl-C.
fn watch_ctrl_c(cancels: Arc<CancelRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; revoking live dispatches");
            cancels.revoke_all();
        }
    })
}

#[derive(Debug, Serialize)]
pub struct MissionSummary {
    pub mission_id: String,
    pub topic: String,
    pub phase: MissionPhase,
    pub iteration: u32,
    pub output: Option<PathBuf>,
    pub facts: usize,
    pub sources: usize,
    pub conflicts: usize,
    pub caveats: Vec<String>,
}

impl CommandOutput for MissionSummary {
    fn to_human(&self) -> String {
        let mut lines = match (&self.output, self.phase) {
            (Some(path), _) => vec![format!("Research complete. Report saved to: {}", path.display())],
            (None, phase) => vec![format!(
                "Mission interrupted during {phase}; continue with `deepresearch resume`."
            )],
        };
        lines.push(format!(
            "Mission {} ({}): {} facts from {} sources, {} conflicts, {} iterations",
            self.mission_id, self.topic, self.facts, self.sources, self.conflicts, self.iteration
        ));
        if !self.caveats.is_empty() {
            lines.push("Caveats:".to_string());
            lines.extend(self.caveats.iter().map(|c| format!("  - {c}")));
        }
        lines.join("\n")
    }
}

/// Run a mission to completion or interruption and print the summary.
pub(crate) async fn drive(mut mission: MissionController, json: bool) -> Result<i32> {
    let watcher = watch_ctrl_c(mission.cancel_handle());
    let outcome = mission.run().await;
    watcher.abort();
    let outcome = outcome?;

    let (facts, sources) = {
        let store = mission.evidence().read().await;
        (store.active_facts().count(), store.source_count())
    };
    let state = mission.state();
    let summary = MissionSummary {
        mission_id: state.mission_id.to_string(),
        topic: state.topic.clone(),
        phase: state.phase,
        iteration: state.iteration,
        output: mission.output(),
        facts,
        sources,
        conflicts: mission.conflicts().conflicts().len(),
        caveats: state.caveats.clone(),
    };
    output(&summary, json);

    Ok(match outcome {
        MissionOutcome::Completed(_) => 0,
        MissionOutcome::Interrupted { .. } => INTERRUPTED_EXIT_CODE,
    })
}
