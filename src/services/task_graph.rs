//! Task graph: the dependency-aware store of research tasks.
//!
//! The graph exclusively owns its tasks; every status change goes through
//! the transition API here. Dependencies may reference tasks that have not
//! been added yet; such tasks stay blocked until the dependency exists and
//! completes.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskId, TaskKind, TaskStatus};

/// Directed acyclic graph of tasks with typed dependencies and status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Task>", try_from = "Vec<Task>")]
pub struct TaskGraph {
    /// Tasks in insertion order
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    /// Reverse edges, including edges from not-yet-added dependencies
    dependents: HashMap<TaskId, BTreeSet<TaskId>>,
    next_seq: u64,
}

/// Depth-first search along `depends_on` edges from `node`. On success
/// `path` holds the chain of task ids ending at `target`.
fn find_path(
    node: &TaskId,
    target: &TaskId,
    tasks: &HashMap<&TaskId, &BTreeSet<TaskId>>,
    visited: &mut HashSet<TaskId>,
    path: &mut Vec<TaskId>,
) -> bool {
    path.push(node.clone());
    if node == target {
        return true;
    }
    if visited.insert(node.clone()) {
        if let Some(deps) = tasks.get(node) {
            for dep in deps.iter() {
                if find_path(dep, target, tasks, visited, path) {
                    return true;
                }
            }
        }
    }
    path.pop();
    false
}

/// Depth-first cycle search from `node`. On success `path` ends with the
/// task that closes the cycle.
fn detect_cycle_util(
    node: &TaskId,
    graph: &HashMap<&TaskId, &BTreeSet<TaskId>>,
    visited: &mut HashSet<TaskId>,
    rec_stack: &mut HashSet<TaskId>,
    path: &mut Vec<TaskId>,
) -> bool {
    visited.insert(node.clone());
    rec_stack.insert(node.clone());
    path.push(node.clone());

    if let Some(neighbors) = graph.get(node) {
        for neighbor in neighbors.iter() {
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|id| id == neighbor) {
                    path.drain(0..cycle_start);
                    path.push(neighbor.clone());
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    fn get_mut(&mut self, id: &TaskId) -> DomainResult<&mut Task> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.tasks[i]),
            None => Err(DomainError::TaskNotFound(id.clone())),
        }
    }

    fn edges(&self) -> HashMap<&TaskId, &BTreeSet<TaskId>> {
        self.tasks.iter().map(|t| (&t.id, &t.depends_on)).collect()
    }

    fn is_completed(&self, id: &TaskId) -> bool {
        self.get(id)
            .is_some_and(|t| t.status == TaskStatus::Completed)
    }

    fn deps_completed(&self, deps: &BTreeSet<TaskId>) -> bool {
        deps.iter().all(|d| self.is_completed(d))
    }

    /// Path `task -> dep -> ... -> task` if adding `task -> dep` closes a cycle.
    fn cycle_through(&self, task: &TaskId, deps: &BTreeSet<TaskId>) -> Option<Vec<TaskId>> {
        let edges = self.edges();
        for dep in deps {
            let mut visited = HashSet::new();
            let mut path = vec![task.clone()];
            if find_path(dep, task, &edges, &mut visited, &mut path) {
                return Some(path);
            }
        }
        None
    }

    /// Insert a task with its dependency set.
    ///
    /// Fails with `Cycle` if the new edges would close a cycle; the graph is
    /// left unchanged on any error.
    pub fn add_task(&mut self, mut task: Task, deps: BTreeSet<TaskId>) -> DomainResult<()> {
        if self.contains(&task.id) {
            return Err(DomainError::DuplicateTask(task.id));
        }
        if let Some(path) = self.cycle_through(&task.id, &deps) {
            warn!(task_id = %task.id, "rejected task: dependency cycle");
            return Err(DomainError::Cycle {
                task: task.id,
                path,
            });
        }

        task.status = if self.deps_completed(&deps) {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        task.depends_on = deps;
        task.seq = self.next_seq;
        self.next_seq += 1;

        for dep in &task.depends_on {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(task.id.clone());
        }

        debug!(
            task_id = %task.id,
            kind = task.kind.as_str(),
            status = %task.status,
            deps = task.depends_on.len(),
            "task added"
        );
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Add one edge `task -> dep` to a task that has not started.
    pub fn add_dependency(&mut self, task: &TaskId, dep: TaskId) -> DomainResult<()> {
        let status = self
            .get(task)
            .map(|t| t.status)
            .ok_or_else(|| DomainError::TaskNotFound(task.clone()))?;
        if !matches!(status, TaskStatus::Pending | TaskStatus::Blocked) {
            return Err(DomainError::InvalidTransition {
                task: task.clone(),
                from: status.to_string(),
                to: TaskStatus::Blocked.to_string(),
            });
        }
        let single = BTreeSet::from([dep.clone()]);
        if let Some(path) = self.cycle_through(task, &single) {
            return Err(DomainError::Cycle {
                task: task.clone(),
                path,
            });
        }

        let dep_done = self.is_completed(&dep);
        self.dependents
            .entry(dep.clone())
            .or_default()
            .insert(task.clone());
        let entry = self.get_mut(task)?;
        entry.depends_on.insert(dep);
        if !dep_done && entry.status == TaskStatus::Pending {
            entry.status = TaskStatus::Blocked;
        }
        Ok(())
    }

    /// Pending tasks whose dependencies are all completed, by descending
    /// priority then insertion order.
    pub fn ready_set(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && self.deps_completed(&t.depends_on))
            .collect();
        ready.sort_by_key(|t| (Reverse(t.priority), t.seq));
        ready
    }

    pub fn in_progress(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .collect()
    }

    /// No task is ready and none is running.
    pub fn is_quiescent(&self) -> bool {
        self.ready_set().is_empty() && self.in_progress().is_empty()
    }

    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    fn transition(&mut self, id: &TaskId, to: TaskStatus) -> DomainResult<()> {
        let task = self.get_mut(id)?;
        task.transition_to(to)
            .map_err(|_| DomainError::InvalidTransition {
                task: id.clone(),
                from: task.status.to_string(),
                to: to.to_string(),
            })
    }

    /// Move a ready task to `InProgress`.
    pub fn start(&mut self, id: &TaskId) -> DomainResult<()> {
        let task = self
            .get(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        if !self.deps_completed(&task.depends_on) {
            return Err(DomainError::InvalidTransition {
                task: id.clone(),
                from: task.status.to_string(),
                to: TaskStatus::InProgress.to_string(),
            });
        }
        self.transition(id, TaskStatus::InProgress)
    }

    /// Complete a task and unblock dependents whose dependencies are now all
    /// complete. Returns the newly pending task ids.
    pub fn mark_complete(&mut self, id: &TaskId) -> DomainResult<Vec<TaskId>> {
        self.transition(id, TaskStatus::Completed)?;
        Ok(self.refresh_dependents(id))
    }

    /// Fail a task. Its dependents stay blocked.
    pub fn mark_failed(&mut self, id: &TaskId, reason: impl Into<String>) -> DomainResult<()> {
        self.transition(id, TaskStatus::Failed)?;
        let reason = reason.into();
        warn!(task_id = %id, reason = %reason, "task failed");
        self.get_mut(id)?.failure = Some(reason);
        Ok(())
    }

    /// Flag a task as stopped before its saturation criteria were met.
    pub fn flag_partial(&mut self, id: &TaskId) -> DomainResult<()> {
        self.get_mut(id)?.partial = true;
        Ok(())
    }

    /// Re-open a failed task for another attempt.
    pub fn reopen(&mut self, id: &TaskId) -> DomainResult<()> {
        let deps = self
            .get(id)
            .map(|t| t.depends_on.clone())
            .ok_or_else(|| DomainError::TaskNotFound(id.clone()))?;
        let to = if self.deps_completed(&deps) {
            TaskStatus::Pending
        } else {
            TaskStatus::Blocked
        };
        self.transition(id, to)?;
        let task = self.get_mut(id)?;
        task.reopen_count += 1;
        task.failure = None;
        task.partial = false;
        Ok(())
    }

    /// Route around a blocked task that can never run.
    pub fn abandon(&mut self, id: &TaskId, reason: impl Into<String>) -> DomainResult<()> {
        self.transition(id, TaskStatus::Failed)?;
        let reason = reason.into();
        warn!(task_id = %id, reason = %reason, "task abandoned");
        self.get_mut(id)?.failure = Some(reason);
        Ok(())
    }

    /// Return tasks left `InProgress` by an interrupted run to the ready
    /// pool. Does not count as a re-open.
    pub fn requeue_interrupted(&mut self) -> Vec<TaskId> {
        let interrupted: Vec<TaskId> = self.in_progress().iter().map(|t| t.id.clone()).collect();
        for id in &interrupted {
            if let Some(&i) = self.index.get(id) {
                let task = &mut self.tasks[i];
                task.status = TaskStatus::Pending;
                task.started_at = None;
                debug!(task_id = %id, "interrupted task requeued");
            }
        }
        interrupted
    }

    /// Blocked tasks that can never become ready, with the reason: a
    /// dependency failed or does not exist.
    pub fn stranded(&self) -> Vec<(TaskId, String)> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Blocked)
            .filter_map(|t| {
                t.depends_on.iter().find_map(|dep| match self.get(dep) {
                    None => Some((t.id.clone(), format!("dependency {dep} does not exist"))),
                    Some(d) if d.status == TaskStatus::Failed => {
                        Some((t.id.clone(), format!("dependency {dep} failed")))
                    }
                    Some(_) => None,
                })
            })
            .collect()
    }

    /// Failed tasks, in insertion order.
    pub fn failed(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect()
    }

    /// Tasks of the given kind, in insertion order.
    pub fn by_kind(&self, kind: TaskKind) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }

    fn refresh_dependents(&mut self, id: &TaskId) -> Vec<TaskId> {
        let candidates: Vec<TaskId> = self
            .dependents
            .get(id)
            .map(|d| d.iter().cloned().collect())
            .unwrap_or_default();

        let mut unblocked = Vec::new();
        for dependent in candidates {
            let ready = self.get(&dependent).is_some_and(|t| {
                t.status == TaskStatus::Blocked && self.deps_completed(&t.depends_on)
            });
            if ready && self.transition(&dependent, TaskStatus::Pending).is_ok() {
                debug!(task_id = %dependent, unblocked_by = %id, "task unblocked");
                unblocked.push(dependent);
            }
        }
        unblocked
    }
}

impl From<TaskGraph> for Vec<Task> {
    fn from(graph: TaskGraph) -> Self {
        graph.tasks
    }
}

impl TryFrom<Vec<Task>> for TaskGraph {
    type Error = DomainError;

    /// Rebuild a graph from persisted tasks, keeping their statuses.
    fn try_from(tasks: Vec<Task>) -> Result<Self, Self::Error> {
        let mut index = HashMap::new();
        let mut dependents: HashMap<TaskId, BTreeSet<TaskId>> = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(DomainError::DuplicateTask(task.id.clone()));
            }
            for dep in &task.depends_on {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(task.id.clone());
            }
        }

        let edges: HashMap<&TaskId, &BTreeSet<TaskId>> =
            tasks.iter().map(|t| (&t.id, &t.depends_on)).collect();
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        for task in &tasks {
            let mut path = Vec::new();
            if !visited.contains(&task.id)
                && detect_cycle_util(&task.id, &edges, &mut visited, &mut rec_stack, &mut path)
            {
                return Err(DomainError::Cycle {
                    task: task.id.clone(),
                    path,
                });
            }
        }

        let next_seq = tasks.iter().map(|t| t.seq + 1).max().unwrap_or(0);
        Ok(Self {
            tasks,
            index,
            dependents,
            next_seq,
        })
    }
}
