//! `run` - start a new research mission.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args};
use tracing::info;

use super::{collaborators, drive, snapshot_path, CollaboratorPaths};
use crate::adapters::{JsonSnapshotStore, DEFAULT_OUTPUT};
use crate::application::{MissionController, MissionSnapshot};
use crate::domain::models::Config;
use crate::domain::ports::SnapshotStore;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("topic_source").required(true).args(["topic", "topic_file"])))]
pub struct RunArgs {
    /// Research topic
    #[arg(short = 'p', long)]
    pub topic: Option<String>,

    /// Read the research topic from a file
    #[arg(short = 'f', long)]
    pub topic_file: Option<PathBuf>,

    /// Research plan (YAML or JSON)
    #[arg(long, default_value = "plan.yaml")]
    pub plan: PathBuf,

    /// Recorded worker batches to replay
    #[arg(long)]
    pub worker_fixture: Option<PathBuf>,

    /// Where the synthesis bundle is written
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Override mission.max_iterations
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Override snapshot.path
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

async fn resolve_topic(args: &RunArgs) -> Result<String> {
    let topic = match (&args.topic, &args.topic_file) {
        (Some(topic), _) => topic.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read topic file {}", path.display()))?,
        (None, None) => bail!("either --topic or --topic-file is required"),
    };
    let topic = topic.trim().to_string();
    if topic.is_empty() {
        bail!("research topic is empty");
    }
    Ok(topic)
}

pub async fn execute(args: RunArgs, mut config: Config, json: bool) -> Result<i32> {
    let topic = resolve_topic(&args).await?;
    if let Some(max) = args.max_iterations {
        config.mission.max_iterations = max;
    }
    let snapshot = snapshot_path(args.snapshot.as_deref(), &config);

    if let Some(bytes) = JsonSnapshotStore::new(&snapshot).load().await? {
        let existing = MissionSnapshot::from_bytes(&bytes)?;
        if !existing.state.phase.is_terminal() {
            bail!(
                "mission {} is still {} at {}; use `deepresearch resume`",
                existing.state.mission_id,
                existing.state.phase,
                snapshot.display()
            );
        }
    }

    let collaborators = collaborators(CollaboratorPaths {
        plan: &args.plan,
        worker_fixture: args.worker_fixture.as_deref(),
        output: &args.output,
        snapshot: &snapshot,
    })
    .await?;

    let mission = MissionController::new(config, &topic, collaborators)?;
    info!(
        mission_id = %mission.state().mission_id,
        snapshot = %snapshot.display(),
        "starting mission"
    );
    drive(mission, json).await
}
