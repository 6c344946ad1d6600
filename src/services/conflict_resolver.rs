//! Evidence-weighted conflict resolution.
//!
//! Topic matching and severity come from upstream reports; this module only
//! scores the facts involved and records a decision. Conflicts are never
//! deleted and both facts stay in the evidence store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Conflict, ConflictId, ContradictionReport, DecisionBasis, FactId, FactWeight, ResolverConfig,
    Resolution, Severity, Source, TaskId,
};
use crate::services::evidence_store::EvidenceStore;
use crate::services::task_graph::TaskGraph;

const AUTHORITY_WEIGHT: f64 = 0.6;
const FRESHNESS_WEIGHT: f64 = 0.4;

/// `W = 0.6 * authority + 0.4 * freshness` for one source.
pub fn source_weight(source: &Source) -> f64 {
    AUTHORITY_WEIGHT * source.source_type.authority() + FRESHNESS_WEIGHT * source.freshness.score()
}

/// Score a fact by its highest-weighted effective source.
pub fn weigh(store: &EvidenceStore, fact_id: FactId) -> DomainResult<FactWeight> {
    let fact = store.fact(fact_id).ok_or(DomainError::FactNotFound(fact_id))?;
    let sources: Vec<&Source> = store
        .effective_sources(fact_id)
        .into_iter()
        .filter_map(|id| store.source(id))
        .collect();

    // Ties between sources go to the lower id.
    let best = sources
        .iter()
        .copied()
        .fold(None::<&Source>, |best, s| match best {
            Some(b) if source_weight(b) >= source_weight(s) => Some(b),
            _ => Some(s),
        })
        .ok_or_else(|| DomainError::Hallucination {
            task: fact.task_id.clone(),
            field: "source_ids",
            reason: format!("fact {fact_id} has no registered source to weigh"),
        })?;

    Ok(FactWeight {
        fact_id,
        best_source: best.id,
        authority: best.source_type.authority(),
        freshness: best.freshness.score(),
        weight: source_weight(best),
        corroborating_sources: sources.len(),
        extracted_at: fact.extracted_at,
    })
}

/// Persistent record of every conflict, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictLedger {
    conflicts: Vec<Conflict>,
    last_id: u64,
}

impl ConflictLedger {
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn get(&self, id: ConflictId) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: ConflictId) -> DomainResult<&mut Conflict> {
        self.conflicts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DomainError::ConflictNotFound(id))
    }

    pub fn pending_high(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.is_pending_high())
    }

    pub fn involving(&self, fact: FactId) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(move |c| c.involves(fact))
    }

    /// Facts of every recorded conflict on `topic`.
    fn facts_on_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = FactId> + 'a {
        self.conflicts
            .iter()
            .filter(move |c| c.topic == topic)
            .flat_map(|c| [c.fact_a, c.fact_b])
    }

    fn has_pair(&self, a: FactId, b: FactId) -> bool {
        self.conflicts.iter().any(|c| c.involves(a) && c.involves(b))
    }

    fn open(&mut self, a: FactId, b: FactId, topic: &str, severity: Severity) -> ConflictId {
        self.last_id += 1;
        let id = ConflictId::new(self.last_id);
        self.conflicts.push(Conflict::new(id, a, b, topic, severity));
        id
    }
}

/// Result of one pass over new contradiction reports.
#[derive(Debug, Default)]
pub struct ResolutionPass {
    /// Conflicts created and resolved immediately (LOW/MEDIUM)
    pub resolved: Vec<ConflictId>,
    /// HIGH conflicts awaiting an arbitration task
    pub needs_arbitration: Vec<ConflictId>,
}

#[derive(Debug, Clone)]
pub struct ConflictResolver {
    config: ResolverConfig,
    ledger: ConflictLedger,
}

impl ConflictResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_ledger(config, ConflictLedger::default())
    }

    pub fn with_ledger(config: ResolverConfig, ledger: ConflictLedger) -> Self {
        Self { config, ledger }
    }

    pub fn ledger(&self) -> &ConflictLedger {
        &self.ledger
    }

    /// Order two weighted facts; `Greater` means `a` is preferred.
    fn compare(&self, a: &FactWeight, b: &FactWeight) -> (Ordering, DecisionBasis) {
        if (a.weight - b.weight).abs() > self.config.tie_epsilon {
            return (
                a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal),
                DecisionBasis::Weight,
            );
        }
        match a.corroborating_sources.cmp(&b.corroborating_sources) {
            Ordering::Equal => {}
            ord => return (ord, DecisionBasis::Corroboration),
        }
        // Later extraction wins; ids are monotonic so they break exact ties.
        let ord = a
            .extracted_at
            .cmp(&b.extracted_at)
            .then(a.fact_id.cmp(&b.fact_id));
        (ord, DecisionBasis::Recency)
    }

    /// Pick between two facts and explain the choice.
    pub fn decide(&self, store: &EvidenceStore, a: FactId, b: FactId) -> DomainResult<Resolution> {
        let wa = weigh(store, a)?;
        let wb = weigh(store, b)?;
        let (ord, basis) = self.compare(&wa, &wb);
        let (winner, loser) = if ord == Ordering::Less {
            (&wb, &wa)
        } else {
            (&wa, &wb)
        };

        let reasoning = match basis {
            DecisionBasis::Weight => format!(
                "{} adopted over {}: weight {:.2} (source {}) vs {:.2} (source {})",
                winner.fact_id,
                loser.fact_id,
                winner.weight,
                winner.best_source,
                loser.weight,
                loser.best_source
            ),
            DecisionBasis::Corroboration => format!(
                "{} adopted over {}: weights tied within {} ({:.2} vs {:.2}); {} supporting sources vs {}",
                winner.fact_id,
                loser.fact_id,
                self.config.tie_epsilon,
                winner.weight,
                loser.weight,
                winner.corroborating_sources,
                loser.corroborating_sources
            ),
            DecisionBasis::Recency => format!(
                "{} adopted over {}: weights and corroboration tied ({:.2}, {} sources); more recently extracted",
                winner.fact_id, loser.fact_id, winner.weight, winner.corroborating_sources
            ),
        };
        let adopted = winner.fact_id;

        Ok(Resolution {
            adopted,
            basis,
            reasoning,
            weights: vec![wa, wb],
            forced: false,
            resolved_at: Utc::now(),
        })
    }

    /// Best fact of a topic group under the decision rule.
    fn group_winner(&self, store: &EvidenceStore, facts: &BTreeSet<FactId>) -> DomainResult<FactId> {
        let mut best: Option<FactWeight> = None;
        for id in facts {
            let w = weigh(store, *id)?;
            best = match best {
                Some(b) if self.compare(&b, &w).0 != Ordering::Less => Some(b),
                _ => Some(w),
            };
        }
        best.map(|w| w.fact_id)
            .ok_or_else(|| DomainError::Unrecoverable {
                context: "empty contradiction group".to_string(),
            })
    }

    /// Turn new contradiction reports into conflicts.
    ///
    /// Reports are grouped by topic, together with the facts of earlier
    /// conflicts on the same topic. The group winner is paired with every
    /// other fact of the group it has not met yet. LOW and MEDIUM conflicts are resolved on the
    /// spot; HIGH ones wait for arbitration.
    pub fn process_reports(
        &mut self,
        store: &EvidenceStore,
        reports: Vec<ContradictionReport>,
    ) -> DomainResult<ResolutionPass> {
        let mut groups: BTreeMap<String, (BTreeSet<FactId>, Severity)> = BTreeMap::new();
        for report in reports {
            let entry = groups
                .entry(report.topic.clone())
                .or_insert_with(|| (BTreeSet::new(), report.severity));
            entry.0.insert(report.fact_a);
            entry.0.insert(report.fact_b);
            entry.1 = entry.1.max(report.severity);
        }

        let mut pass = ResolutionPass::default();
        for (topic, (mut facts, severity)) in groups {
            facts.extend(self.ledger.facts_on_topic(&topic));
            let facts: BTreeSet<FactId> = facts
                .into_iter()
                .filter(|f| !store.is_quarantined(*f))
                .collect();
            if facts.len() < 2 {
                continue;
            }
            let winner = self.group_winner(store, &facts)?;
            for other in facts.iter().copied().filter(|f| *f != winner) {
                if self.ledger.has_pair(winner, other) {
                    continue;
                }
                let id = self.ledger.open(winner, other, &topic, severity);
                info!(
                    conflict_id = %id,
                    fact_a = %winner,
                    fact_b = %other,
                    topic = %topic,
                    severity = %severity,
                    "conflict recorded"
                );
                if severity == Severity::High {
                    pass.needs_arbitration.push(id);
                } else {
                    self.resolve(store, id, false)?;
                    pass.resolved.push(id);
                }
            }
        }
        Ok(pass)
    }

    fn resolve(&mut self, store: &EvidenceStore, id: ConflictId, forced: bool) -> DomainResult<()> {
        let (a, b) = {
            let conflict = self.ledger.get(id).ok_or(DomainError::ConflictNotFound(id))?;
            (conflict.fact_a, conflict.fact_b)
        };
        let mut resolution = self.decide(store, a, b)?;
        resolution.forced = forced;
        info!(
            conflict_id = %id,
            adopted = %resolution.adopted,
            basis = ?resolution.basis,
            forced,
            "conflict resolved"
        );
        self.ledger.get_mut(id)?.amend(resolution);
        Ok(())
    }

    /// Link a HIGH conflict to the CONFLICT task gathering its evidence.
    pub fn assign_arbitration(&mut self, id: ConflictId, task: TaskId) -> DomainResult<()> {
        self.ledger.get_mut(id)?.arbitration_task = Some(task);
        Ok(())
    }

    /// HIGH conflicts that have no arbitration task yet.
    pub fn unassigned_high(&self) -> Vec<ConflictId> {
        self.ledger
            .pending_high()
            .filter(|c| c.arbitration_task.is_none())
            .map(|c| c.id)
            .collect()
    }

    /// Resolve HIGH conflicts whose arbitration task has finished, using
    /// whatever evidence is now present.
    pub fn resolve_arbitrated(
        &mut self,
        store: &EvidenceStore,
        graph: &TaskGraph,
    ) -> DomainResult<Vec<ConflictId>> {
        let ready: Vec<ConflictId> = self
            .ledger
            .pending_high()
            .filter(|c| {
                c.arbitration_task
                    .as_ref()
                    .and_then(|t| graph.get(t))
                    .is_some_and(|t| t.status.is_terminal())
            })
            .map(|c| c.id)
            .collect();
        for id in &ready {
            self.resolve(store, *id, false)?;
        }
        Ok(ready)
    }

    /// Resolve every pending HIGH conflict without waiting for arbitration.
    pub fn force_resolve_pending(&mut self, store: &EvidenceStore) -> DomainResult<Vec<ConflictId>> {
        let pending: Vec<ConflictId> = self.ledger.pending_high().map(|c| c.id).collect();
        for id in &pending {
            debug!(conflict_id = %id, "forcing resolution at iteration ceiling");
            self.resolve(store, *id, true)?;
        }
        Ok(pending)
    }
}
