//! Deepresearch - dependency-aware research mission runner
//!
//! Drives a research mission through planning, batched worker dispatch with
//! adaptive stopping, evidence-weighted conflict resolution and a closed-world
//! citation gate before synthesis.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): task graph, evidence store, saturation,
//!   conflict resolution, citation gate and wave dispatch
//! - **Application Layer** (`application`): the mission state machine
//! - **Adapters** (`adapters`): file-backed planner, replay worker,
//!   synthesizer and snapshot store
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use deepresearch::adapters::{BundleSynthesizer, FilePlanner, JsonSnapshotStore, ReplayWorker};
//! use deepresearch::application::{Collaborators, MissionController};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let collaborators = Collaborators {
//!         planner: Arc::new(FilePlanner::new("plan.yaml")),
//!         worker: Arc::new(ReplayWorker::empty()),
//!         synthesizer: Arc::new(BundleSynthesizer::default()),
//!         snapshots: Arc::new(JsonSnapshotStore::new(".deepresearch/mission.json")),
//!     };
//!     let mut mission = MissionController::new(Default::default(), "topic", collaborators)?;
//!     mission.run().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Collaborators, MissionController, MissionOutcome, MissionSnapshot};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{Config, MissionPhase, Task, TaskId, TaskKind, TaskStatus};
pub use domain::ports::{Planner, ResearchWorker, SnapshotStore, Synthesizer};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{CitationGate, ConflictResolver, EvidenceStore, SaturationController, TaskGraph};
