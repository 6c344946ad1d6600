//! Wave-based dispatch of ready tasks to a research worker.
//!
//! Every task in a wave runs concurrently (bounded by `max_concurrency`)
//! and the wave returns only once every member has reported back. Each
//! EXECUTE task owns its own saturation controller; the evidence store is
//! the only shared state.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CancelFlag, DispatchConfig, DispatchOutcome, DispatchRequest, SaturationConfig, Task, TaskId,
    TaskKind, WorkerStatus,
};
use crate::domain::ports::ResearchWorker;
use crate::services::evidence_store::SharedEvidence;
use crate::services::exclusive_resource::ExclusiveResource;
use crate::services::saturation::{BatchObservation, SaturationController, StopDecision};

/// Name of the global exclusive resource.
pub const BROWSER_RESOURCE: &str = "__browser__";

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum concurrent tasks per wave
    pub max_concurrency: usize,
    /// Timeout per dispatch attempt
    pub timeout: Duration,
    pub saturation: SaturationConfig,
}

impl DispatcherConfig {
    pub fn new(dispatch: &DispatchConfig, saturation: SaturationConfig) -> Self {
        Self {
            max_concurrency: dispatch.max_concurrency.max(1),
            timeout: Duration::from_secs(dispatch.timeout_secs),
            saturation,
        }
    }
}

/// Live cancel flags, one per running dispatch.
#[derive(Debug, Default)]
pub struct CancelRegistry {
    flags: Mutex<HashMap<TaskId, CancelFlag>>,
    revoked_all: AtomicBool,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the flag for a dispatch. After `revoke_all` new flags start
    /// out revoked.
    pub fn register(&self, task: &TaskId) -> CancelFlag {
        let flag = CancelFlag::new();
        if self.revoked_all.load(Ordering::SeqCst) {
            flag.revoke();
        }
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task.clone(), flag.clone());
        flag
    }

    pub fn unregister(&self, task: &TaskId) {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(task);
    }

    /// Revoke one dispatch. Returns false if it is not running.
    pub fn revoke(&self, task: &TaskId) -> bool {
        match self
            .flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task)
        {
            Some(flag) => {
                flag.revoke();
                true
            }
            None => false,
        }
    }

    /// Revoke every live dispatch and any started later.
    pub fn revoke_all(&self) {
        self.revoked_all.store(true, Ordering::SeqCst);
        let flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        info!(live = flags.len(), "revoking all dispatches");
        for flag in flags.values() {
            flag.revoke();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.revoked_all.load(Ordering::SeqCst)
    }
}

/// Report for one task of a wave.
#[derive(Debug)]
pub struct TaskRun {
    pub task_id: TaskId,
    pub batches: u32,
    pub saturation_counter: u32,
    /// Stopped at the batch cap or by cancellation before saturating
    pub partial: bool,
    pub decision: Option<StopDecision>,
    pub result: DomainResult<()>,
}

impl TaskRun {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            batches: 0,
            saturation_counter: 0,
            partial: false,
            decision: None,
            result: Ok(()),
        }
    }
}

pub struct ResearchDispatcher {
    worker: Arc<dyn ResearchWorker>,
    evidence: SharedEvidence,
    exclusive: Arc<ExclusiveResource>,
    cancels: Arc<CancelRegistry>,
    config: DispatcherConfig,
}

impl ResearchDispatcher {
    pub fn new(
        worker: Arc<dyn ResearchWorker>,
        evidence: SharedEvidence,
        exclusive: Arc<ExclusiveResource>,
        cancels: Arc<CancelRegistry>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            worker,
            evidence,
            exclusive,
            cancels,
            config,
        }
    }

    pub fn cancels(&self) -> &Arc<CancelRegistry> {
        &self.cancels
    }

    /// Run a wave of tasks and wait for every one of them.
    pub async fn dispatch_wave(&self, tasks: Vec<Task>) -> Vec<TaskRun> {
        info!(
            tasks = tasks.len(),
            worker = self.worker.name(),
            "dispatching wave"
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut slots = Vec::with_capacity(tasks.len());

        for task in tasks {
            let task_id = task.id.clone();
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    let mut run = TaskRun::new(task_id);
                    run.result = Err(DomainError::Unrecoverable {
                        context: "dispatch semaphore closed".to_string(),
                    });
                    slots.push(Slot::Done(run));
                    continue;
                }
            };

            let unit = TaskUnit {
                worker: Arc::clone(&self.worker),
                evidence: Arc::clone(&self.evidence),
                exclusive: Arc::clone(&self.exclusive),
                cancel: self.cancels.register(&task_id),
                config: self.config.clone(),
            };
            let handle = tokio::spawn(async move {
                let _permit = permit;
                unit.run(task).await
            });
            slots.push(Slot::Spawned(task_id, handle));
        }

        // Fan-in: every member reports before the wave returns.
        join_all(slots.into_iter().map(|slot| async move {
            match slot {
                Slot::Done(run) => run,
                Slot::Spawned(task_id, handle) => {
                    let run = handle.await.unwrap_or_else(|err| {
                        let mut run = TaskRun::new(task_id.clone());
                        run.result = Err(DomainError::DispatchFailed {
                            task: task_id.clone(),
                            batch: 0,
                            reason: format!("dispatch panicked: {err}"),
                        });
                        run
                    });
                    self.cancels.unregister(&task_id);
                    run
                }
            }
        }))
        .await
    }
}

enum Slot {
    Spawned(TaskId, JoinHandle<TaskRun>),
    Done(TaskRun),
}

/// Everything one spawned task needs.
struct TaskUnit {
    worker: Arc<dyn ResearchWorker>,
    evidence: SharedEvidence,
    exclusive: Arc<ExclusiveResource>,
    cancel: CancelFlag,
    config: DispatcherConfig,
}

impl TaskUnit {
    async fn run(self, task: Task) -> TaskRun {
        let mut run = TaskRun::new(task.id.clone());
        let result = match task.kind {
            TaskKind::Execute => self.run_saturation(&task, &mut run).await,
            TaskKind::Conflict => self.run_arbitration(&task, &mut run).await,
            TaskKind::Plan => Ok(()),
        };
        if let Err(err) = &result {
            warn!(task_id = %task.id, error = %err, "task dispatch failed");
        }
        run.result = result;
        run
    }

    fn request(&self, task: &Task, batch: u32, k: u32) -> DispatchRequest {
        DispatchRequest {
            task_id: task.id.clone(),
            kind: task.kind,
            description: task.description.clone(),
            k,
            scope: task.scope.clone(),
            batch,
            attempt: 1,
            dimensions: task.dimensions.clone(),
        }
    }

    async fn run_saturation(&self, task: &Task, run: &mut TaskRun) -> DomainResult<()> {
        let mut controller = SaturationController::new(self.config.saturation);
        let declared: BTreeSet<&String> = task.dimensions.iter().collect();

        loop {
            if self.cancel.is_revoked() {
                info!(task_id = %task.id, batch = controller.batch_index(), "dispatch revoked; keeping partial results");
                run.partial = true;
                break;
            }

            let plan = controller.next_batch();
            let outcome = self
                .dispatch_with_retry(task, self.request(task, plan.batch, plan.k))
                .await?;

            let observation = {
                let mut store = self.evidence.write().await;
                let report = store.ingest(&task.id, &task.dimensions, outcome);
                let covered = store.covered_dimensions();
                BatchObservation {
                    informative: report.is_informative(),
                    dimensions_covered: declared.iter().all(|d| covered.contains(*d)),
                    tier1_sources: store.tier1_sources_for_task(&task.id),
                }
            };
            let decision = controller.record(observation);
            run.batches = controller.batch_index();
            run.saturation_counter = controller.saturation_counter();
            run.decision = Some(decision);

            debug!(
                task_id = %task.id,
                batch = plan.batch,
                k = plan.k,
                informative = observation.informative,
                tier1 = observation.tier1_sources,
                saturation_counter = controller.saturation_counter(),
                decision = ?decision,
                "batch recorded"
            );

            match decision {
                StopDecision::Continue => {}
                StopDecision::Saturated => {
                    info!(task_id = %task.id, batches = run.batches, "task saturated");
                    break;
                }
                StopDecision::ForceStopped => {
                    warn!(task_id = %task.id, batches = run.batches, "batch cap reached before saturation; task partial");
                    run.partial = true;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn run_arbitration(&self, task: &Task, run: &mut TaskRun) -> DomainResult<()> {
        let request = self.request(task, 1, self.config.saturation.k_expand);
        let outcome = self.dispatch_with_retry(task, request).await?;
        let report = self
            .evidence
            .write()
            .await
            .ingest(&task.id, &task.dimensions, outcome);
        run.batches = 1;
        info!(
            task_id = %task.id,
            facts = report.facts_added.len(),
            corroborations = report.corroborations,
            "arbitration batch recorded"
        );
        Ok(())
    }

    /// One attempt plus exactly one retry with the same parameters.
    async fn dispatch_with_retry(
        &self,
        task: &Task,
        mut request: DispatchRequest,
    ) -> DomainResult<DispatchOutcome> {
        let batch = request.batch;
        let mut last_error = None;

        for attempt in 1..=2 {
            request.attempt = attempt;
            let error = match self.attempt(task, request.clone()).await {
                Ok(outcome) => {
                    if outcome.status == WorkerStatus::Partial {
                        debug!(task_id = %task.id, batch, "worker returned partial batch");
                    }
                    return Ok(outcome);
                }
                Err(err) => err,
            };
            if attempt == 1 {
                warn!(task_id = %task.id, batch, error = %error, "dispatch attempt failed; retrying once");
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| DomainError::DispatchFailed {
            task: task.id.clone(),
            batch,
            reason: "no attempt made".to_string(),
        }))
    }

    async fn attempt(&self, task: &Task, request: DispatchRequest) -> DomainResult<DispatchOutcome> {
        let batch = request.batch;
        let _guard = if task.exclusive_resource {
            Some(self.exclusive.acquire(task.id.as_str()).await.map_err(|err| {
                DomainError::DispatchFailed {
                    task: task.id.clone(),
                    batch,
                    reason: err.to_string(),
                }
            })?)
        } else {
            None
        };

        debug!(task_id = %task.id, batch, k = request.k, attempt = request.attempt, "dispatching batch");
        match timeout(self.config.timeout, self.worker.dispatch(request, self.cancel.clone())).await {
            Ok(Ok(outcome)) if outcome.status == WorkerStatus::Failure => {
                Err(DomainError::DispatchFailed {
                    task: task.id.clone(),
                    batch,
                    reason: outcome
                        .message
                        .unwrap_or_else(|| "worker reported failure".to_string()),
                })
            }
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(DomainError::DispatchFailed {
                task: task.id.clone(),
                batch,
                reason: err.to_string(),
            }),
            Err(_) => Err(DomainError::DispatchTimeout {
                task: task.id.clone(),
                batch,
                timeout_secs: self.config.timeout.as_secs(),
            }),
        }
    }
}
