//! Concrete collaborators behind the domain ports.

pub mod bundle_synthesizer;
pub mod file_planner;
pub mod json_snapshot_store;
pub mod replay_worker;

pub use bundle_synthesizer::{BundleSynthesizer, DEFAULT_OUTPUT};
pub use file_planner::FilePlanner;
pub use json_snapshot_store::JsonSnapshotStore;
pub use replay_worker::{ReplayFixture, ReplayStep, ReplayWorker};
