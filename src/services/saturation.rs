//! Adaptive stopping for EXECUTE tasks.
//!
//! One controller exists per task execution. It picks the document count
//! `k` for each batch and decides after every batch whether research on the
//! task has saturated. Decisions depend only on the sequence of recorded
//! observations and the parameters.

use serde::{Deserialize, Serialize};

use crate::domain::models::SaturationConfig;

/// Parameters of the next batch to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// 1-based batch index
    pub batch: u32,
    pub k: u32,
}

/// What the controller needs to know about a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchObservation {
    pub informative: bool,
    /// Every declared task dimension has at least one supporting fact
    pub dimensions_covered: bool,
    /// Tier-1 sources attached to this task's facts
    pub tier1_sources: usize,
}

/// Outcome of recording a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopDecision {
    Continue,
    /// All stopping criteria hold
    Saturated,
    /// Batch cap reached without meeting the criteria; the task is partial
    ForceStopped,
}

impl StopDecision {
    pub fn is_stop(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

#[derive(Debug, Clone)]
pub struct SaturationController {
    config: SaturationConfig,
    batch_index: u32,
    saturation_counter: u32,
    last_informative: Option<bool>,
    k_history: Vec<u32>,
}

impl SaturationController {
    pub fn new(config: SaturationConfig) -> Self {
        Self {
            config,
            batch_index: 0,
            saturation_counter: 0,
            last_informative: None,
            k_history: Vec::new(),
        }
    }

    /// Batches recorded so far.
    pub fn batch_index(&self) -> u32 {
        self.batch_index
    }

    pub fn saturation_counter(&self) -> u32 {
        self.saturation_counter
    }

    /// `k` of every recorded batch, in order.
    pub fn k_history(&self) -> &[u32] {
        &self.k_history
    }

    /// Documents per query for the upcoming batch.
    pub fn next_k(&self) -> u32 {
        let upcoming = self.batch_index + 1;
        if upcoming <= 2 {
            return self.config.k_initial;
        }
        if self.last_informative == Some(false) || self.saturation_counter >= 1 {
            self.config.k_expand
        } else {
            self.config.k_initial
        }
    }

    pub fn next_batch(&self) -> BatchPlan {
        BatchPlan {
            batch: self.batch_index + 1,
            k: self.next_k(),
        }
    }

    fn criteria_met(&self, obs: &BatchObservation) -> bool {
        self.batch_index >= self.config.min_batches
            && self.saturation_counter >= self.config.saturation_threshold
            && obs.dimensions_covered
            && obs.tier1_sources >= self.config.min_tier1_sources
    }

    /// Record a finished batch and decide whether to continue.
    pub fn record(&mut self, obs: BatchObservation) -> StopDecision {
        self.k_history.push(self.next_k());
        self.batch_index += 1;
        if obs.informative {
            self.saturation_counter = 0;
        } else {
            self.saturation_counter += 1;
        }
        self.last_informative = Some(obs.informative);

        if self.criteria_met(&obs) {
            StopDecision::Saturated
        } else if self.batch_index >= self.config.max_batches {
            StopDecision::ForceStopped
        } else {
            StopDecision::Continue
        }
    }
}
