pub mod config;
pub mod conflict;
pub mod dispatch;
pub mod evidence;
pub mod mission;
pub mod plan;
pub mod synthesis;
pub mod task;

pub use config::{
    Config, DispatchConfig, LoggingConfig, MissionConfig, ResolverConfig, SaturationConfig,
    SnapshotConfig,
};
pub use conflict::{Conflict, ConflictId, DecisionBasis, FactWeight, Resolution, Severity};
pub use dispatch::{
    CancelFlag, ContradictionClaim, DispatchOutcome, DispatchRequest, FactCandidate,
    SourceCandidate, SourceRef, WorkerStatus,
};
pub use evidence::{
    Confidence, ContradictionReport, Corroboration, CredibilityTier, Datum, Fact, FactId,
    FreshnessBucket, Quarantine, Source, SourceId, SourceType,
};
pub use mission::{MissionFailure, MissionPhase, MissionState};
pub use plan::{Dimension, PlannedTask, ResearchPlan};
pub use synthesis::{SynthesisBundle, SynthesisReceipt};
pub use task::{Task, TaskId, TaskKind, TaskStatus};
