//! `resume` - continue a mission from its last committed snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::{collaborators, drive, snapshot_path, CollaboratorPaths};
use crate::adapters::DEFAULT_OUTPUT;
use crate::application::MissionController;
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Override snapshot.path
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Research plan, used only if the mission restarts planning
    #[arg(long, default_value = "plan.yaml")]
    pub plan: PathBuf,

    /// Recorded worker batches to replay
    #[arg(long)]
    pub worker_fixture: Option<PathBuf>,

    /// Where the synthesis bundle is written
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Leave ERROR and restart the phase that failed
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: ResumeArgs, config: Config, json: bool) -> Result<i32> {
    let snapshot = snapshot_path(args.snapshot.as_deref(), &config);
    let collaborators = collaborators(CollaboratorPaths {
        plan: &args.plan,
        worker_fixture: args.worker_fixture.as_deref(),
        output: &args.output,
        snapshot: &snapshot,
    })
    .await?;

    let mission = MissionController::resume(config, collaborators, args.force).await?;
    drive(mission, json).await
}
