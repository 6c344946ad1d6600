//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::gate::GateArgs;
use super::commands::resume::ResumeArgs;
use super::commands::run::RunArgs;
use super::commands::status::StatusArgs;

#[derive(Parser, Debug)]
#[command(name = "deepresearch")]
#[command(about = "Deepresearch - dependency-aware research mission runner", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .deepresearch/config.yaml and local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a new research mission
    Run(RunArgs),

    /// Continue a mission from its last committed snapshot
    Resume(ResumeArgs),

    /// Show phase, tasks and conflicts of a snapshot
    Status(StatusArgs),

    /// Run the citation gate against a snapshot
    Gate(GateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_one_topic_source() {
        assert!(Cli::try_parse_from(["deepresearch", "run", "--plan", "p.yaml"]).is_err());
        assert!(Cli::try_parse_from([
            "deepresearch",
            "run",
            "--topic",
            "x",
            "--topic-file",
            "t.md"
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "deepresearch",
            "--json",
            "run",
            "--topic",
            "solar",
            "--max-iterations",
            "3",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.topic.as_deref(), Some("solar"));
                assert_eq!(args.max_iterations, Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_resume_force_flag() {
        let cli = Cli::try_parse_from(["deepresearch", "resume", "--force"]).unwrap();
        match cli.command {
            Commands::Resume(args) => assert!(args.force),
            other => panic!("unexpected {other:?}"),
        }
    }
}
