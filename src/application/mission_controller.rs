//! MissionController - top-level state machine of a research mission
//!
//! Sequences PLANNING, RESEARCHING, REFLECTING and SYNTHESIZING, drives the
//! task graph through the dispatcher and commits a snapshot after every
//! phase transition and every research wave. Errors that escape a phase
//! move the mission to ERROR with the failure recorded in the snapshot.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, Dimension, FactId, MissionFailure, MissionPhase, MissionState, SynthesisBundle,
    SynthesisReceipt, Task, TaskId, TaskKind, TaskStatus,
};
use crate::domain::ports::{Planner, ResearchWorker, SnapshotStore, Synthesizer};
use crate::services::{
    CancelRegistry, CitationGate, ConflictLedger, ConflictResolver, DispatcherConfig,
    EvidenceStore, ExclusiveResource, GateVerdict, ResearchDispatcher, SharedEvidence, TaskGraph,
    BROWSER_RESOURCE,
};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Priority of injected arbitration tasks; they run ahead of gap work.
const ARBITRATION_PRIORITY: u32 = 100;
const GAP_PRIORITY_PRIMARY: u32 = 10;
const GAP_PRIORITY_SECONDARY: u32 = 5;

/// Complete recoverable state of a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub version: u32,
    pub state: MissionState,
    pub graph: TaskGraph,
    pub evidence: EvidenceStore,
    pub conflicts: ConflictLedger,
}

impl MissionSnapshot {
    pub fn to_bytes(&self) -> DomainResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> DomainResult<Self> {
        let snapshot: Self = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DomainError::Unrecoverable {
                context: format!(
                    "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
                    snapshot.version
                ),
            });
        }
        Ok(snapshot)
    }
}

/// External collaborators of a mission.
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn Planner>,
    pub worker: Arc<dyn ResearchWorker>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub snapshots: Arc<dyn SnapshotStore>,
}

/// How a call to [`MissionController::run`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionOutcome {
    Completed(SynthesisReceipt),
    /// Dispatches were revoked; the snapshot holds the partial state
    Interrupted { phase: MissionPhase },
}

pub struct MissionController {
    config: Config,
    state: MissionState,
    graph: TaskGraph,
    evidence: SharedEvidence,
    resolver: ConflictResolver,
    dispatcher: ResearchDispatcher,
    cancels: Arc<CancelRegistry>,
    planner: Arc<dyn Planner>,
    synthesizer: Arc<dyn Synthesizer>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl MissionController {
    /// Create a mission in PLANNING for `topic`.
    pub fn new(config: Config, topic: &str, collaborators: Collaborators) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            anyhow::bail!("mission topic is empty");
        }
        let state = MissionState::new(topic, config.mission.max_iterations);
        info!(
            mission_id = %state.mission_id,
            topic = %state.topic,
            max_iterations = state.max_iterations,
            "mission created"
        );
        Ok(Self::assemble(
            config,
            state,
            TaskGraph::new(),
            EvidenceStore::new(),
            ConflictLedger::default(),
            collaborators,
        ))
    }

    /// Rebuild a mission from its last committed snapshot.
    ///
    /// A mission in ERROR only resumes with `force`, restarting the phase it
    /// failed in. Tasks interrupted mid-dispatch are requeued.
    pub async fn resume(config: Config, collaborators: Collaborators, force: bool) -> Result<Self> {
        let bytes = collaborators
            .snapshots
            .load()
            .await
            .context("Failed to load mission snapshot")?
            .ok_or_else(|| DomainError::Unrecoverable {
                context: "no committed snapshot to resume from".to_string(),
            })?;
        let snapshot = MissionSnapshot::from_bytes(&bytes).context("Failed to decode mission snapshot")?;
        let MissionSnapshot {
            mut state,
            mut graph,
            evidence,
            conflicts,
            ..
        } = snapshot;

        if state.phase == MissionPhase::Error {
            let failure = state.failure.take().ok_or_else(|| DomainError::Unrecoverable {
                context: "mission is in ERROR without a recorded failure".to_string(),
            })?;
            if !force {
                state.failure = Some(failure.clone());
                return Err(DomainError::Unrecoverable {
                    context: format!(
                        "mission {} is in ERROR ({}: {}); resume with --force after fixing the cause",
                        state.mission_id, failure.category, failure.message
                    ),
                }
                .into());
            }
            warn!(
                mission_id = %state.mission_id,
                phase = %failure.failed_in,
                category = %failure.category,
                "forcing resume of failed mission"
            );
            state.phase = failure.failed_in;
            state.gate_remediations = 0;
        }

        let requeued = graph.requeue_interrupted();
        if !requeued.is_empty() {
            info!(tasks = requeued.len(), "requeued interrupted tasks");
        }
        info!(
            mission_id = %state.mission_id,
            phase = %state.phase,
            iteration = state.iteration,
            tasks = graph.len(),
            facts = evidence.fact_count(),
            "mission resumed"
        );

        Ok(Self::assemble(config, state, graph, evidence, conflicts, collaborators))
    }

    fn assemble(
        config: Config,
        state: MissionState,
        graph: TaskGraph,
        evidence: EvidenceStore,
        conflicts: ConflictLedger,
        collaborators: Collaborators,
    ) -> Self {
        let evidence = evidence.into_shared();
        let cancels = Arc::new(CancelRegistry::new());
        let exclusive = Arc::new(ExclusiveResource::new(
            BROWSER_RESOURCE,
            Duration::from_secs(config.dispatch.exclusive_wait_secs),
            Duration::from_secs(config.dispatch.exclusive_lease_secs),
        ));
        let dispatcher = ResearchDispatcher::new(
            collaborators.worker,
            Arc::clone(&evidence),
            exclusive,
            Arc::clone(&cancels),
            DispatcherConfig::new(&config.dispatch, config.saturation),
        );
        Self {
            resolver: ConflictResolver::with_ledger(config.resolver, conflicts),
            config,
            state,
            graph,
            evidence,
            dispatcher,
            cancels,
            planner: collaborators.planner,
            synthesizer: collaborators.synthesizer,
            snapshots: collaborators.snapshots,
        }
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn phase(&self) -> MissionPhase {
        self.state.phase
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn conflicts(&self) -> &ConflictLedger {
        self.resolver.ledger()
    }

    pub fn evidence(&self) -> &SharedEvidence {
        &self.evidence
    }

    /// Registry used to revoke every live dispatch (Ctrl-C).
    pub fn cancel_handle(&self) -> Arc<CancelRegistry> {
        Arc::clone(&self.cancels)
    }

    /// Current state as a snapshot.
    pub async fn snapshot(&self) -> MissionSnapshot {
        MissionSnapshot {
            version: SNAPSHOT_VERSION,
            state: self.state.clone(),
            graph: self.graph.clone(),
            evidence: self.evidence.read().await.clone(),
            conflicts: self.resolver.ledger().clone(),
        }
    }

    async fn commit(&mut self) -> DomainResult<()> {
        self.state.updated_at = Utc::now();
        let bytes = self.snapshot().await.to_bytes()?;
        self.snapshots.save(&bytes).await?;
        debug!(phase = %self.state.phase, bytes = bytes.len(), "snapshot committed");
        Ok(())
    }

    async fn transition(&mut self, next: MissionPhase) -> DomainResult<()> {
        let from = self.state.phase;
        if !from.can_transition_to(next) {
            return Err(DomainError::Unrecoverable {
                context: format!("illegal mission transition {from} -> {next}"),
            });
        }
        if next == MissionPhase::Reflecting {
            self.state.iteration += 1;
        }
        self.state.phase = next;
        info!(
            from = %from,
            phase = %next,
            iteration = self.state.iteration,
            "mission phase transition"
        );
        self.commit().await
    }

    /// Record an escaped error and move to ERROR.
    async fn fail(&mut self, err: DomainError) -> DomainError {
        let failed_in = self.state.phase;
        warn!(
            phase = %failed_in,
            category = err.category(),
            error = %err,
            "mission entering ERROR"
        );
        self.state.failure = Some(MissionFailure {
            category: err.category().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
            failed_in,
        });
        self.state.phase = MissionPhase::Error;
        if let Err(commit_err) = self.commit().await {
            warn!(error = %commit_err, "failed to commit ERROR snapshot");
        }
        err
    }

    /// Advance the mission by one phase.
    pub async fn step(&mut self) -> DomainResult<()> {
        let result = match self.state.phase {
            MissionPhase::Planning => self.plan().await,
            MissionPhase::Researching => self.research().await,
            MissionPhase::Reflecting => self.reflect().await,
            MissionPhase::Synthesizing => self.synthesize().await,
            MissionPhase::Completed | MissionPhase::Error => Ok(()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err).await),
        }
    }

    /// Drive the mission until it completes, fails or is interrupted.
    pub async fn run(&mut self) -> Result<MissionOutcome> {
        loop {
            if self.cancels.is_cancelled() && !self.state.phase.is_terminal() {
                warn!(phase = %self.state.phase, "mission interrupted");
                return Ok(MissionOutcome::Interrupted {
                    phase: self.state.phase,
                });
            }
            match self.state.phase {
                MissionPhase::Completed => {
                    let receipt = self.state.receipt.clone().ok_or_else(|| DomainError::Unrecoverable {
                        context: "mission already completed".to_string(),
                    })?;
                    return Ok(MissionOutcome::Completed(receipt));
                }
                MissionPhase::Error => {
                    let failure = self.state.failure.as_ref().map_or_else(
                        || "unknown failure".to_string(),
                        |f| format!("{}: {}", f.category, f.message),
                    );
                    return Err(DomainError::Unrecoverable {
                        context: format!("mission {} is in ERROR ({failure})", self.state.mission_id),
                    }
                    .into());
                }
                phase => {
                    self.step()
                        .await
                        .with_context(|| format!("Mission failed during {phase}"))?;
                }
            }
        }
    }

    async fn plan(&mut self) -> DomainResult<()> {
        let plan = self.planner.plan(&self.state.topic).await?;
        if plan.is_empty() {
            return Err(DomainError::Unrecoverable {
                context: format!("planner returned no tasks for topic '{}'", self.state.topic),
            });
        }

        let mut graph = TaskGraph::new();
        for planned in plan.tasks {
            let (task, deps) = planned.into_task();
            graph.add_task(task, deps)?;
        }
        self.graph = graph;
        self.state.dimensions = plan.dimensions;
        info!(
            tasks = self.graph.len(),
            dimensions = self.state.dimensions.len(),
            "initial task graph populated"
        );
        self.transition(MissionPhase::Researching).await
    }

    async fn research(&mut self) -> DomainResult<()> {
        loop {
            let ready: Vec<Task> = self.graph.ready_set().into_iter().cloned().collect();
            if ready.is_empty() {
                break;
            }

            let mut wave = Vec::new();
            for task in ready {
                self.graph.start(&task.id)?;
                if task.kind == TaskKind::Plan {
                    debug!(task_id = %task.id, "plan milestone reached");
                    self.graph.mark_complete(&task.id)?;
                } else {
                    wave.push(task);
                }
            }
            if wave.is_empty() {
                continue;
            }

            for run in self.dispatcher.dispatch_wave(wave).await {
                match run.result {
                    Ok(()) => {
                        self.state
                            .saturation_counters
                            .insert(run.task_id.clone(), run.saturation_counter);
                        if run.partial {
                            self.graph.flag_partial(&run.task_id)?;
                        }
                        self.graph.mark_complete(&run.task_id)?;
                    }
                    Err(err) => self.graph.mark_failed(&run.task_id, err.to_string())?,
                }
            }
            self.commit().await?;

            if self.cancels.is_cancelled() {
                return Ok(());
            }
        }

        if !self.graph.in_progress().is_empty() {
            return Err(DomainError::Unrecoverable {
                context: "research round ended with tasks still in progress".to_string(),
            });
        }
        self.transition(MissionPhase::Reflecting).await
    }

    /// Re-open failed tasks within budget and route around the rest.
    fn route_failures(&mut self) -> DomainResult<usize> {
        let max_reopens = self.config.mission.max_task_reopens;
        let retryable: Vec<TaskId> = self
            .graph
            .failed()
            .into_iter()
            .filter(|t| t.started_at.is_some() && t.reopen_count < max_reopens)
            .map(|t| t.id.clone())
            .collect();
        for id in &retryable {
            info!(task_id = %id, "re-opening failed task");
            self.graph.reopen(id)?;
        }

        for task in self.graph.failed() {
            if task.started_at.is_some() {
                let reason = task.failure.as_deref().unwrap_or("unknown failure");
                self.state
                    .add_caveat(format!("task {} failed: {reason}", task.id));
            }
        }

        loop {
            let stranded = self.graph.stranded();
            if stranded.is_empty() {
                break;
            }
            for (id, reason) in stranded {
                self.graph.abandon(&id, &reason)?;
                self.state
                    .add_caveat(format!("task {id} skipped: {reason}"));
            }
        }
        Ok(retryable.len())
    }

    fn uncovered(&self, store: &EvidenceStore) -> Vec<Dimension> {
        let covered = store.covered_dimensions();
        self.state
            .dimensions
            .iter()
            .filter(|d| !covered.contains(&d.name))
            .cloned()
            .collect()
    }

    fn fresh_task_id(&mut self, prefix: &str) -> TaskId {
        loop {
            let id = self.state.next_task_id(prefix);
            if !self.graph.contains(&id) {
                return id;
            }
        }
    }

    /// One EXECUTE task per uncovered dimension not already being worked.
    fn inject_gap_tasks(&mut self, uncovered: &[Dimension]) -> DomainResult<usize> {
        let in_flight: BTreeSet<String> = self
            .graph
            .tasks()
            .filter(|t| !t.status.is_terminal())
            .flat_map(|t| t.dimensions.iter().cloned())
            .collect();

        let mut injected = 0;
        for dimension in uncovered.iter().filter(|d| !in_flight.contains(&d.name)) {
            let id = self.fresh_task_id("gap");
            let priority = if dimension.primary {
                GAP_PRIORITY_PRIMARY
            } else {
                GAP_PRIORITY_SECONDARY
            };
            let task = Task::execute(id.clone(), format!("Cover {}", dimension.name))
                .with_description(format!(
                    "Find sourced evidence on '{}' for: {}",
                    dimension.name, self.state.topic
                ))
                .with_priority(priority)
                .with_dimensions([dimension.name.clone()]);
            self.graph.add_task(task, BTreeSet::new())?;
            info!(task_id = %id, dimension = %dimension.name, "gap task injected");
            injected += 1;
        }
        Ok(injected)
    }

    async fn inject_arbitration_tasks(&mut self) -> DomainResult<usize> {
        let unassigned = self.resolver.unassigned_high();
        for conflict_id in &unassigned {
            let topic = self
                .resolver
                .ledger()
                .get(*conflict_id)
                .map(|c| c.topic.clone())
                .ok_or(DomainError::ConflictNotFound(*conflict_id))?;
            let id = self.fresh_task_id("conflict");
            let task = Task::new(id.clone(), TaskKind::Conflict, format!("Arbitrate {conflict_id}"))
                .with_description(format!(
                    "Gather arbitration evidence on '{topic}' for conflict {conflict_id}"
                ))
                .with_priority(ARBITRATION_PRIORITY)
                .with_scope(topic)
                .with_conflict(*conflict_id);
            self.graph.add_task(task, BTreeSet::new())?;
            self.resolver.assign_arbitration(*conflict_id, id.clone())?;
            info!(task_id = %id, conflict_id = %conflict_id, "arbitration task injected");
        }
        Ok(unassigned.len())
    }

    /// Quarantine facts that failed the gate and queue remediation work.
    async fn remediate_gate(&mut self, offending: Vec<FactId>, at_ceiling: bool) -> DomainResult<bool> {
        if self.state.gate_remediations >= self.config.mission.max_gate_remediations {
            return Err(DomainError::CitationGateBlocked { facts: offending });
        }
        self.state.gate_remediations += 1;

        let mut dimension_sets: BTreeSet<Vec<String>> = BTreeSet::new();
        {
            let mut store = self.evidence.write().await;
            for fact_id in &offending {
                if let Some(fact) = store.fact(*fact_id) {
                    dimension_sets.insert(fact.dimensions.iter().cloned().collect());
                }
                store.quarantine(*fact_id, "cites no resolvable source");
            }
        }
        let listed: Vec<String> = offending.iter().map(ToString::to_string).collect();
        self.state
            .add_caveat(format!("facts quarantined by citation gate: {}", listed.join(", ")));

        if at_ceiling {
            return Ok(false);
        }
        for dimensions in dimension_sets {
            let id = self.fresh_task_id("remediate");
            let task = Task::execute(id.clone(), "Replace quarantined evidence")
                .with_description(format!(
                    "Re-source quarantined findings for: {}",
                    self.state.topic
                ))
                .with_priority(GAP_PRIORITY_PRIMARY)
                .with_dimensions(dimensions);
            self.graph.add_task(task, BTreeSet::new())?;
            info!(task_id = %id, "remediation task injected");
        }
        Ok(true)
    }

    async fn reflect(&mut self) -> DomainResult<()> {
        let at_ceiling = self.state.iteration_limit_reached();
        let reopened = self.route_failures()?;

        {
            let mut store = self.evidence.write().await;
            let reports = store.take_contradictions();
            drop(store);
            let store = self.evidence.read().await;
            let pass = self.resolver.process_reports(&store, reports)?;
            let arbitrated = self.resolver.resolve_arbitrated(&store, &self.graph)?;
            debug!(
                resolved = pass.resolved.len(),
                pending_high = pass.needs_arbitration.len(),
                arbitrated = arbitrated.len(),
                "conflict pass finished"
            );
        }

        let uncovered = self.uncovered(&*self.evidence.read().await);

        if at_ceiling {
            let limit = DomainError::IterationLimitExceeded {
                iteration: self.state.iteration,
                max: self.state.max_iterations,
            };
            warn!(error = %limit, "forcing synthesis");
            self.state.add_caveat(limit.to_string());

            let forced = {
                let store = self.evidence.read().await;
                self.resolver.force_resolve_pending(&store)?
            };
            for conflict_id in forced {
                self.state.add_caveat(format!(
                    "conflict {conflict_id} force-resolved without completed arbitration"
                ));
            }
            for dimension in &uncovered {
                self.state
                    .add_caveat(format!("dimension '{}' has no supporting fact", dimension.name));
            }
        } else {
            let arbitration = self.inject_arbitration_tasks().await?;
            let gaps = self.inject_gap_tasks(&uncovered)?;
            let pending_high = self.resolver.ledger().pending_high().count();
            if reopened > 0 || arbitration > 0 || gaps > 0 || pending_high > 0 || !self.graph.is_quiescent() {
                info!(
                    reopened,
                    arbitration,
                    gaps,
                    pending_high,
                    uncovered = uncovered.len(),
                    "more research needed"
                );
                return self.transition(MissionPhase::Researching).await;
            }
        }

        let report = CitationGate::check(&*self.evidence.read().await);
        if let GateVerdict::Blocked { facts } = report.verdict {
            let more_research = self.remediate_gate(facts, at_ceiling).await?;
            if more_research {
                return self.transition(MissionPhase::Researching).await;
            }
            let recheck = CitationGate::check(&*self.evidence.read().await);
            recheck.into_result()?;
        }

        self.transition(MissionPhase::Synthesizing).await
    }

    async fn bundle(&mut self) -> SynthesisBundle {
        let partial: Vec<TaskId> = self
            .graph
            .tasks()
            .filter(|t| t.partial && t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();
        for id in partial {
            self.state
                .add_caveat(format!("task {id} stopped before saturation"));
        }

        let store = self.evidence.read().await;
        let facts: Vec<_> = store.active_facts().cloned().collect();
        let cited: BTreeSet<_> = facts
            .iter()
            .flat_map(|f| store.effective_sources(f.id))
            .collect();
        let sources = cited
            .into_iter()
            .filter_map(|id| store.source(id).cloned())
            .collect();

        SynthesisBundle {
            topic: self.state.topic.clone(),
            facts,
            sources,
            conflicts: self.resolver.ledger().conflicts().to_vec(),
            caveats: self.state.caveats.clone(),
            uncovered_dimensions: self.uncovered(&store),
        }
    }

    async fn synthesize(&mut self) -> DomainResult<()> {
        CitationGate::check(&*self.evidence.read().await).into_result()?;
        if let Some(conflict) = self.resolver.ledger().pending_high().next() {
            return Err(DomainError::Unrecoverable {
                context: format!("conflict {} is unresolved at synthesis", conflict.id),
            });
        }

        let bundle = self.bundle().await;
        let receipt = self.synthesizer.synthesize(&bundle).await?;
        info!(
            output = %receipt.output.display(),
            facts = receipt.facts_used,
            caveats = bundle.caveats.len(),
            "synthesis confirmed"
        );
        self.state.receipt = Some(receipt);
        self.transition(MissionPhase::Completed).await
    }

    /// Output of a completed mission.
    pub fn output(&self) -> Option<PathBuf> {
        self.state.receipt.as_ref().map(|r| r.output.clone())
    }
}
