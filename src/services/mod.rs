//! Core services of the research mission.

pub mod citation_gate;
pub mod conflict_resolver;
pub mod evidence_store;
pub mod exclusive_resource;
pub mod research_dispatcher;
pub mod saturation;
pub mod task_graph;

pub use citation_gate::{CitationGate, GateReport, GateVerdict};
pub use conflict_resolver::{source_weight, weigh, ConflictLedger, ConflictResolver, ResolutionPass};
pub use evidence_store::{EvidenceStore, IngestReport, NewFact, SharedEvidence};
pub use exclusive_resource::{ExclusiveGuard, ExclusiveResource};
pub use research_dispatcher::{
    CancelRegistry, DispatcherConfig, ResearchDispatcher, TaskRun, BROWSER_RESOURCE,
};
pub use saturation::{BatchObservation, BatchPlan, SaturationController, StopDecision};
pub use task_graph::TaskGraph;
