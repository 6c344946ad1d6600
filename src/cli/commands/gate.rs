//! `gate` - run the citation gate against a committed snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::{load_snapshot, snapshot_path};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::Config;
use crate::services::{CitationGate, GateReport, GateVerdict};

#[derive(Args, Debug)]
pub struct GateArgs {
    /// Override snapshot.path
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct GateOutput {
    #[serde(flatten)]
    pub report: GateReport,
}

impl CommandOutput for GateOutput {
    fn to_human(&self) -> String {
        match &self.report.verdict {
            GateVerdict::Pass => format!(
                "PASS: {} facts checked, every citation resolves",
                self.report.checked
            ),
            GateVerdict::Blocked { facts } => {
                let listed: Vec<String> = facts.iter().map(ToString::to_string).collect();
                format!(
                    "BLOCKED: {} of {} facts cite no resolvable source: {}",
                    facts.len(),
                    self.report.checked,
                    listed.join(", ")
                )
            }
        }
    }
}

pub async fn execute(args: GateArgs, config: Config, json: bool) -> Result<i32> {
    let path = snapshot_path(args.snapshot.as_deref(), &config);
    let snapshot = load_snapshot(&path).await?;
    let report = CitationGate::check(&snapshot.evidence);
    let code = match &report.verdict {
        GateVerdict::Pass => 0,
        GateVerdict::Blocked { facts } => DomainError::CitationGateBlocked {
            facts: facts.clone(),
        }
        .exit_code(),
    };
    output(&GateOutput { report }, json);
    Ok(code)
}
