//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - ResearchWorker: batch dispatch to external research workers
//! - Planner: initial task graph for a topic
//! - Synthesizer: prose generation from accepted evidence
//! - SnapshotStore: durable mission snapshots
//!
//! These traits keep the mission core independent of any particular
//! worker, planner or storage implementation.

pub mod planner;
pub mod research_worker;
pub mod snapshot_store;
pub mod synthesizer;

pub use planner::Planner;
pub use research_worker::ResearchWorker;
pub use snapshot_store::SnapshotStore;
pub use synthesizer::Synthesizer;
