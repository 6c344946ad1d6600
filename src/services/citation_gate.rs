//! Closed-world citation check run before synthesis.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FactId, SourceId};
use crate::services::evidence_store::EvidenceStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum GateVerdict {
    Pass,
    /// Facts with no valid source or citing an absent source
    Blocked { facts: Vec<FactId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    #[serde(flatten)]
    pub verdict: GateVerdict,
    /// Fact to resolvable sources, for every checked fact
    pub index: BTreeMap<FactId, BTreeSet<SourceId>>,
    pub checked: usize,
}

impl GateReport {
    pub fn passed(&self) -> bool {
        self.verdict == GateVerdict::Pass
    }

    pub fn into_result(self) -> DomainResult<Self> {
        match &self.verdict {
            GateVerdict::Pass => Ok(self),
            GateVerdict::Blocked { facts } => Err(DomainError::CitationGateBlocked {
                facts: facts.clone(),
            }),
        }
    }
}

/// Read-only validator of the fact to source citation index.
///
/// Quarantined facts are excluded. The check has no side effects and may
/// be repeated as evidence accumulates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationGate;

impl CitationGate {
    pub fn check(store: &EvidenceStore) -> GateReport {
        let mut index = BTreeMap::new();
        let mut offending = Vec::new();

        for fact in store.active_facts() {
            let cited = store.effective_sources(fact.id);
            let resolved: BTreeSet<SourceId> = cited
                .iter()
                .copied()
                .filter(|id| store.source(*id).is_some())
                .collect();

            if fact.source_ids.is_empty() || resolved.len() != cited.len() {
                offending.push(fact.id);
            }
            index.insert(fact.id, resolved);
        }

        let verdict = if offending.is_empty() {
            info!(facts = index.len(), "citation gate passed");
            GateVerdict::Pass
        } else {
            warn!(
                facts = ?offending.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "citation gate blocked"
            );
            GateVerdict::Blocked { facts: offending }
        };

        GateReport {
            verdict,
            checked: index.len(),
            index,
        }
    }
}
