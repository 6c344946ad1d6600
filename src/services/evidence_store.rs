//! Append-only ledger of sources and facts.
//!
//! Ids are assigned from monotonic counters. Facts must cite at least one
//! registered source; anything else is rejected at insertion with the
//! offending field named.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Confidence, ContradictionReport, Corroboration, Datum, DispatchOutcome, Fact, FactCandidate,
    FactId, Quarantine, Source, SourceCandidate, SourceId, SourceRef, TaskId,
};

/// Evidence store shared between concurrently dispatched tasks.
pub type SharedEvidence = Arc<RwLock<EvidenceStore>>;

/// A fact as submitted for insertion, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewFact {
    pub statement: String,
    pub source_ids: BTreeSet<SourceId>,
    pub confidence: Confidence,
    pub task_id: TaskId,
    pub dimensions: BTreeSet<String>,
    pub datum: Option<Datum>,
}

impl NewFact {
    pub fn new(
        task_id: TaskId,
        statement: impl Into<String>,
        source_ids: impl IntoIterator<Item = SourceId>,
        confidence: Confidence,
    ) -> Self {
        Self {
            statement: statement.into(),
            source_ids: source_ids.into_iter().collect(),
            confidence,
            task_id,
            dimensions: BTreeSet::new(),
            datum: None,
        }
    }

    pub fn with_dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_datum(mut self, datum: Datum) -> Self {
        self.datum = Some(datum);
        self
    }
}

/// What one worker batch added to the store.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub facts_added: Vec<FactId>,
    /// Sources first registered by this batch and cited by an admitted
    /// fact or corroboration
    pub new_sources: usize,
    /// Sources first registered by this batch, cited or not
    pub sources_registered: usize,
    /// Declared task dimensions that had no supporting fact before this batch
    pub new_dimensions: usize,
    /// Quantitative data whose key was not present before this batch
    pub new_data: usize,
    pub contradictions: usize,
    pub corroborations: usize,
    /// Candidates refused at insertion, with the reason
    pub rejected: Vec<DomainError>,
}

impl IngestReport {
    /// Whether the batch produced new relevant information.
    ///
    /// A detected contradiction or corroboration counts as informative.
    /// Sources nobody cites do not.
    pub fn is_informative(&self) -> bool {
        self.new_sources > 0
            || self.new_dimensions > 0
            || self.new_data > 0
            || self.contradictions > 0
            || self.corroborations > 0
    }
}

/// Owner of all sources, facts and the records appended about them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceStore {
    sources: BTreeMap<SourceId, Source>,
    facts: BTreeMap<FactId, Fact>,
    #[serde(default)]
    corroborations: Vec<Corroboration>,
    #[serde(default)]
    contradictions: Vec<ContradictionReport>,
    /// Contradiction reports already handed to the resolver
    #[serde(default)]
    contradictions_consumed: usize,
    #[serde(default)]
    quarantine: Vec<Quarantine>,
    last_source_id: u64,
    last_fact_id: u64,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedEvidence {
        Arc::new(RwLock::new(self))
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(&id)
    }

    pub fn fact(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(&id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    /// All facts, quarantined ones included.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values()
    }

    /// Facts that are not quarantined.
    pub fn active_facts(&self) -> impl Iterator<Item = &Fact> {
        self.facts.values().filter(|f| !self.is_quarantined(f.id))
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_by_url(&self, url: &str) -> Option<&Source> {
        let url = url.trim();
        self.sources.values().find(|s| s.url == url)
    }

    /// Register a newly reported reference, deduplicated by URL.
    ///
    /// Returns the id and whether the source was new.
    pub fn register_source(
        &mut self,
        candidate: SourceCandidate,
        discovered_by: &TaskId,
    ) -> (SourceId, bool) {
        if let Some(existing) = self.source_by_url(&candidate.url) {
            return (existing.id, false);
        }

        self.last_source_id += 1;
        let id = SourceId::new(self.last_source_id);
        let source = Source {
            id,
            url: candidate.url.trim().to_string(),
            title: candidate.title,
            source_type: candidate.source_type,
            credibility_tier: candidate.credibility_tier,
            freshness: candidate.freshness,
            accessed_at: Utc::now(),
            local_archive_path: candidate.local_archive_path,
            discovered_by: discovered_by.clone(),
        };
        debug!(
            source_id = %id,
            url = %source.url,
            tier = u8::from(source.credibility_tier),
            task_id = %discovered_by,
            "source registered"
        );
        self.sources.insert(id, source);
        (id, true)
    }

    /// Insert a sourced fact.
    ///
    /// Fails with `Hallucination` if the source set is empty or names a
    /// source that is not registered; the store is unchanged on error.
    pub fn insert_fact(&mut self, fact: NewFact) -> DomainResult<FactId> {
        if fact.statement.trim().is_empty() {
            return Err(DomainError::Hallucination {
                task: fact.task_id,
                field: "statement",
                reason: "is empty".to_string(),
            });
        }
        if fact.source_ids.is_empty() {
            return Err(DomainError::Hallucination {
                task: fact.task_id,
                field: "source_ids",
                reason: "is empty".to_string(),
            });
        }
        if let Some(missing) = fact.source_ids.iter().find(|id| !self.sources.contains_key(id)) {
            return Err(DomainError::Hallucination {
                task: fact.task_id,
                field: "source_ids",
                reason: format!("references unregistered source {missing}"),
            });
        }

        self.last_fact_id += 1;
        let id = FactId::new(self.last_fact_id);
        self.facts.insert(
            id,
            Fact {
                id,
                statement: fact.statement,
                source_ids: fact.source_ids,
                confidence: fact.confidence,
                extracted_at: Utc::now(),
                task_id: fact.task_id,
                dimensions: fact.dimensions,
                datum: fact.datum,
            },
        );
        Ok(id)
    }

    /// Attach an additional supporting source to an existing fact.
    ///
    /// Returns false when the source already supports the fact.
    pub fn corroborate(
        &mut self,
        fact_id: FactId,
        source_id: SourceId,
        reported_by: &TaskId,
    ) -> DomainResult<bool> {
        if !self.facts.contains_key(&fact_id) {
            return Err(DomainError::FactNotFound(fact_id));
        }
        if !self.sources.contains_key(&source_id) {
            return Err(DomainError::Hallucination {
                task: reported_by.clone(),
                field: "sources",
                reason: format!("references unregistered source {source_id}"),
            });
        }
        if self.effective_sources(fact_id).contains(&source_id) {
            return Ok(false);
        }
        self.corroborations.push(Corroboration {
            fact_id,
            source_id,
            reported_by: reported_by.clone(),
        });
        Ok(true)
    }

    /// Record that two facts contradict each other on a topic.
    pub fn report_contradiction(&mut self, report: ContradictionReport) -> DomainResult<()> {
        for id in [report.fact_a, report.fact_b] {
            if !self.facts.contains_key(&id) {
                return Err(DomainError::FactNotFound(id));
            }
        }
        debug!(
            fact_a = %report.fact_a,
            fact_b = %report.fact_b,
            topic = %report.topic,
            severity = %report.severity,
            "contradiction reported"
        );
        self.contradictions.push(report);
        Ok(())
    }

    /// Original sources of a fact plus every corroboration.
    pub fn effective_sources(&self, fact_id: FactId) -> BTreeSet<SourceId> {
        let mut ids: BTreeSet<SourceId> = self
            .facts
            .get(&fact_id)
            .map(|f| f.source_ids.clone())
            .unwrap_or_default();
        ids.extend(
            self.corroborations
                .iter()
                .filter(|c| c.fact_id == fact_id)
                .map(|c| c.source_id),
        );
        ids
    }

    pub fn corroborations(&self) -> &[Corroboration] {
        &self.corroborations
    }

    pub fn contradictions(&self) -> &[ContradictionReport] {
        &self.contradictions
    }

    /// Contradiction reports not yet handed out, advancing the cursor.
    pub fn take_contradictions(&mut self) -> Vec<ContradictionReport> {
        let fresh = self.contradictions[self.contradictions_consumed.min(self.contradictions.len())..]
            .to_vec();
        self.contradictions_consumed = self.contradictions.len();
        fresh
    }

    /// Distinct tier-1 sources supporting facts extracted by `task`.
    pub fn tier1_sources_for_task(&self, task: &TaskId) -> usize {
        self.active_facts()
            .filter(|f| &f.task_id == task)
            .flat_map(|f| self.effective_sources(f.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| self.sources.get(id).is_some_and(Source::is_tier1))
            .count()
    }

    /// Dimensions with at least one supporting, non-quarantined fact.
    pub fn covered_dimensions(&self) -> BTreeSet<String> {
        self.active_facts()
            .flat_map(|f| f.dimensions.iter().cloned())
            .collect()
    }

    fn known_datum_keys(&self) -> BTreeSet<String> {
        self.active_facts()
            .filter_map(|f| f.datum.as_ref().map(|d| d.key.clone()))
            .collect()
    }

    pub fn quarantine(&mut self, fact_id: FactId, reason: impl Into<String>) {
        if self.is_quarantined(fact_id) {
            return;
        }
        let reason = reason.into();
        warn!(fact_id = %fact_id, reason = %reason, "fact quarantined");
        self.quarantine.push(Quarantine {
            fact_id,
            reason,
            quarantined_at: Utc::now(),
        });
    }

    pub fn is_quarantined(&self, fact_id: FactId) -> bool {
        self.quarantine.iter().any(|q| q.fact_id == fact_id)
    }

    pub fn quarantined(&self) -> &[Quarantine] {
        &self.quarantine
    }

    /// Fold one worker batch into the store.
    ///
    /// Sources are registered first so facts may cite them by URL. Rejected
    /// candidates leave the store untouched and are returned in the report;
    /// the rest of the batch is still applied. `declared` are the task's
    /// dimensions.
    pub fn ingest(&mut self, task: &TaskId, declared: &[String], outcome: DispatchOutcome) -> IngestReport {
        let mut report = IngestReport::default();

        let mut fresh = BTreeSet::new();
        for candidate in outcome.sources {
            let (id, is_new) = self.register_source(candidate, task);
            if is_new {
                fresh.insert(id);
            }
        }
        report.sources_registered = fresh.len();

        let mut cited_fresh = BTreeSet::new();
        for candidate in outcome.facts {
            match self.ingest_fact(task, declared, candidate, &mut report) {
                Ok(cited) => cited_fresh.extend(cited.intersection(&fresh).copied()),
                Err(err) => {
                    warn!(task_id = %task, error = %err, "candidate fact rejected");
                    report.rejected.push(err);
                }
            }
        }
        report.new_sources = cited_fresh.len();

        debug!(
            task_id = %task,
            facts = report.facts_added.len(),
            new_sources = report.new_sources,
            sources_registered = report.sources_registered,
            new_dimensions = report.new_dimensions,
            new_data = report.new_data,
            contradictions = report.contradictions,
            corroborations = report.corroborations,
            rejected = report.rejected.len(),
            "batch ingested"
        );
        report
    }

    /// Every fact a candidate corroborates or contradicts must exist.
    fn check_links(&self, candidate: &FactCandidate) -> DomainResult<()> {
        let linked = candidate
            .corroborates
            .iter()
            .chain(candidate.contradicts.iter().map(|c| &c.fact));
        for id in linked {
            if !self.facts.contains_key(id) {
                return Err(DomainError::FactNotFound(*id));
            }
        }
        Ok(())
    }

    fn resolve_refs(&self, task: &TaskId, refs: &[SourceRef]) -> DomainResult<BTreeSet<SourceId>> {
        refs.iter()
            .map(|r| match r {
                SourceRef::Url(url) => {
                    self.source_by_url(url)
                        .map(|s| s.id)
                        .ok_or_else(|| DomainError::Hallucination {
                            task: task.clone(),
                            field: "sources",
                            reason: format!("cites unregistered url {url}"),
                        })
                }
                SourceRef::Id(id) if self.sources.contains_key(id) => Ok(*id),
                SourceRef::Id(id) => Err(DomainError::Hallucination {
                    task: task.clone(),
                    field: "sources",
                    reason: format!("references unregistered source {id}"),
                }),
            })
            .collect()
    }

    /// Apply one candidate; returns the sources it cites. Nothing is
    /// written unless the whole candidate is valid.
    fn ingest_fact(
        &mut self,
        task: &TaskId,
        declared: &[String],
        candidate: FactCandidate,
        report: &mut IngestReport,
    ) -> DomainResult<BTreeSet<SourceId>> {
        let source_ids = self.resolve_refs(task, &candidate.sources)?;
        self.check_links(&candidate)?;

        // A corroborating candidate restates existing facts; only its
        // sources are recorded.
        if !candidate.corroborates.is_empty() {
            if source_ids.is_empty() {
                return Err(DomainError::Hallucination {
                    task: task.clone(),
                    field: "sources",
                    reason: "is empty".to_string(),
                });
            }
            for fact_id in &candidate.corroborates {
                for source_id in &source_ids {
                    if self.corroborate(*fact_id, *source_id, task)? {
                        report.corroborations += 1;
                    }
                }
            }
            return Ok(source_ids);
        }

        let covered = self.covered_dimensions();
        let known_keys = self.known_datum_keys();
        let new_dimensions = candidate
            .dimensions
            .iter()
            .filter(|d| declared.contains(*d) && !covered.contains(*d))
            .collect::<BTreeSet<_>>()
            .len();
        let new_datum = candidate
            .datum
            .as_ref()
            .is_some_and(|d| !known_keys.contains(&d.key));

        let fact_id = self.insert_fact(NewFact {
            statement: candidate.statement,
            source_ids: source_ids.clone(),
            confidence: candidate.confidence,
            task_id: task.clone(),
            dimensions: candidate.dimensions.into_iter().collect(),
            datum: candidate.datum,
        })?;
        report.facts_added.push(fact_id);
        report.new_dimensions += new_dimensions;
        if new_datum {
            report.new_data += 1;
        }

        for claim in candidate.contradicts {
            self.report_contradiction(ContradictionReport {
                fact_a: claim.fact,
                fact_b: fact_id,
                topic: claim.topic,
                severity: claim.severity,
                reported_by: task.clone(),
            })?;
            report.contradictions += 1;
        }
        Ok(source_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        ContradictionClaim, CredibilityTier, FreshnessBucket, Severity, SourceType,
    };

    fn task() -> TaskId {
        TaskId::new("E1")
    }

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn candidate(url: &str, tier: CredibilityTier) -> SourceCandidate {
        SourceCandidate {
            url: url.to_string(),
            title: url.to_string(),
            source_type: SourceType::Official,
            credibility_tier: tier,
            freshness: FreshnessBucket::WithinScope,
            local_archive_path: None,
        }
    }

    fn fact_citing(url: &str, dims: &[&str]) -> FactCandidate {
        FactCandidate {
            statement: format!("claim from {url}"),
            sources: vec![SourceRef::Url(url.to_string())],
            confidence: Confidence::High,
            dimensions: dims.iter().map(ToString::to_string).collect(),
            datum: None,
            corroborates: vec![],
            contradicts: vec![],
        }
    }

    #[test]
    fn test_register_source_dedupes_by_url() {
        let mut store = EvidenceStore::new();
        let (a, new_a) = store.register_source(candidate("https://a.gov", CredibilityTier::Tier1), &task());
        let (b, new_b) = store.register_source(candidate(" https://a.gov ", CredibilityTier::Tier1), &task());
        assert!(new_a);
        assert!(!new_b);
        assert_eq!(a, b);
        assert_eq!(store.source_count(), 1);
    }

    #[test]
    fn test_empty_sources_rejected_with_field() {
        let mut store = EvidenceStore::new();
        let err = store
            .insert_fact(NewFact::new(task(), "x", [], Confidence::Low))
            .unwrap_err();
        match err {
            DomainError::Hallucination { field, .. } => assert_eq!(field, "source_ids"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.fact_count(), 0);
    }

    #[test]
    fn test_dangling_source_rejected() {
        let mut store = EvidenceStore::new();
        let err = store
            .insert_fact(NewFact::new(task(), "x", [SourceId::new(9)], Confidence::Low))
            .unwrap_err();
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut store = EvidenceStore::new();
        let (s, _) = store.register_source(candidate("https://a.gov", CredibilityTier::Tier1), &task());
        let f1 = store.insert_fact(NewFact::new(task(), "one", [s], Confidence::High)).unwrap();
        let f2 = store.insert_fact(NewFact::new(task(), "two", [s], Confidence::High)).unwrap();
        assert_eq!(f1, FactId::new(1));
        assert_eq!(f2, FactId::new(2));
    }

    #[test]
    fn test_ingest_counts_novelty() {
        let mut store = EvidenceStore::new();
        let outcome = DispatchOutcome {
            sources: vec![candidate("https://a.gov", CredibilityTier::Tier1)],
            facts: vec![
                fact_citing("https://a.gov", &["market size"]),
                fact_citing("https://missing.example", &["growth"]),
            ],
            ..DispatchOutcome::default()
        };

        let report = store.ingest(&task(), &dims(&["market size", "growth"]), outcome);
        assert_eq!(report.new_sources, 1);
        assert_eq!(report.new_dimensions, 1);
        assert_eq!(report.facts_added.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(report.is_informative());

        // Same material again adds a fact but nothing new.
        let again = DispatchOutcome {
            sources: vec![candidate("https://a.gov", CredibilityTier::Tier1)],
            facts: vec![fact_citing("https://a.gov", &["market size"])],
            ..DispatchOutcome::default()
        };
        let report = store.ingest(&task(), &dims(&["market size"]), again);
        assert!(!report.is_informative());
    }

    #[test]
    fn test_corroboration_extends_effective_sources() {
        let mut store = EvidenceStore::new();
        store.ingest(
            &task(),
            &[],
            DispatchOutcome {
                sources: vec![candidate("https://a.gov", CredibilityTier::Tier1)],
                facts: vec![fact_citing("https://a.gov", &[])],
                ..DispatchOutcome::default()
            },
        );
        let mut support = fact_citing("https://b.edu", &[]);
        support.corroborates = vec![FactId::new(1)];
        let report = store.ingest(
            &TaskId::new("E2"),
            &[],
            DispatchOutcome {
                sources: vec![candidate("https://b.edu", CredibilityTier::Tier1)],
                facts: vec![support],
                ..DispatchOutcome::default()
            },
        );

        assert_eq!(report.corroborations, 1);
        assert_eq!(store.fact_count(), 1);
        assert_eq!(store.effective_sources(FactId::new(1)).len(), 2);
        assert_eq!(store.fact(FactId::new(1)).unwrap().source_ids.len(), 1);
    }

    #[test]
    fn test_contradiction_reports_are_consumed_once() {
        let mut store = EvidenceStore::new();
        let (s, _) = store.register_source(candidate("https://a.gov", CredibilityTier::Tier1), &task());
        let first = store.insert_fact(NewFact::new(task(), "up", [s], Confidence::High)).unwrap();

        let mut rival = fact_citing("https://a.gov", &[]);
        rival.contradicts = vec![ContradictionClaim {
            fact: first,
            topic: "trend".to_string(),
            severity: Severity::Low,
        }];
        let report = store.ingest(
            &task(),
            &[],
            DispatchOutcome {
                facts: vec![rival],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.contradictions, 1);
        assert_eq!(store.take_contradictions().len(), 1);
        assert!(store.take_contradictions().is_empty());
        assert_eq!(store.contradictions().len(), 1);
    }

    #[test]
    fn test_tier1_count_and_coverage_skip_quarantined() {
        let mut store = EvidenceStore::new();
        let (t1, _) = store.register_source(candidate("https://a.gov", CredibilityTier::Tier1), &task());
        let (t2, _) = store.register_source(candidate("https://blog.example", CredibilityTier::Tier2), &task());
        let f = store
            .insert_fact(NewFact::new(task(), "a", [t1, t2], Confidence::High).with_dimensions(["cost"]))
            .unwrap();

        assert_eq!(store.tier1_sources_for_task(&task()), 1);
        assert!(store.covered_dimensions().contains("cost"));

        store.quarantine(f, "test");
        store.quarantine(f, "twice");
        assert_eq!(store.quarantined().len(), 1);
        assert_eq!(store.tier1_sources_for_task(&task()), 0);
        assert!(store.covered_dimensions().is_empty());
        assert!(store.fact(f).is_some());
    }

    #[test]
    fn test_uncited_sources_are_not_informative() {
        let mut store = EvidenceStore::new();
        let report = store.ingest(
            &task(),
            &dims(&["cost"]),
            DispatchOutcome {
                sources: vec![candidate("https://new.gov", CredibilityTier::Tier1)],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.sources_registered, 1);
        assert_eq!(report.new_sources, 0);
        assert!(!report.is_informative());

        // A rejected fact citing a fresh source does not count either.
        let mut orphan = fact_citing("https://fresh.gov", &[]);
        orphan.statement = "  ".to_string();
        let report = store.ingest(
            &task(),
            &[],
            DispatchOutcome {
                sources: vec![candidate("https://fresh.gov", CredibilityTier::Tier1)],
                facts: vec![orphan],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.rejected.len(), 1);
        assert!(!report.is_informative());
    }

    #[test]
    fn test_only_declared_dimensions_count_as_new() {
        let mut store = EvidenceStore::new();
        let report = store.ingest(
            &task(),
            &dims(&["cost"]),
            DispatchOutcome {
                facts: vec![fact_citing("https://a.gov", &["risk"])],
                sources: vec![candidate("https://a.gov", CredibilityTier::Tier1)],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.new_dimensions, 0);
        assert_eq!(report.new_sources, 1);

        let report = store.ingest(
            &task(),
            &dims(&["cost"]),
            DispatchOutcome {
                facts: vec![fact_citing("https://a.gov", &["cost"])],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.new_dimensions, 1);
        assert!(report.is_informative());
    }

    #[test]
    fn test_candidate_with_unknown_link_leaves_store_unchanged() {
        let mut store = EvidenceStore::new();
        store.ingest(
            &task(),
            &[],
            DispatchOutcome {
                sources: vec![
                    candidate("https://a.gov", CredibilityTier::Tier1),
                    candidate("https://b.gov", CredibilityTier::Tier1),
                ],
                facts: vec![fact_citing("https://a.gov", &[])],
                ..DispatchOutcome::default()
            },
        );
        let before = store.clone();

        let mut rival = fact_citing("https://a.gov", &[]);
        rival.contradicts = vec![
            ContradictionClaim {
                fact: FactId::new(1),
                topic: "trend".to_string(),
                severity: Severity::Low,
            },
            ContradictionClaim {
                fact: FactId::new(99),
                topic: "trend".to_string(),
                severity: Severity::Low,
            },
        ];
        let mut support = fact_citing("https://b.gov", &[]);
        support.corroborates = vec![FactId::new(1), FactId::new(42)];

        let report = store.ingest(
            &task(),
            &[],
            DispatchOutcome {
                facts: vec![rival, support],
                ..DispatchOutcome::default()
            },
        );
        assert_eq!(report.rejected.len(), 2);
        assert!(report.facts_added.is_empty());
        assert_eq!(report.contradictions, 0);
        assert_eq!(report.corroborations, 0);
        assert!(matches!(report.rejected[0], DomainError::FactNotFound(id) if id == FactId::new(99)));
        assert_eq!(store, before);
    }

    #[test]
    fn test_serde_roundtrip_is_byte_identical() {
        let mut store = EvidenceStore::new();
        let (s, _) = store.register_source(candidate("https://a.gov", CredibilityTier::Tier1), &task());
        store.insert_fact(NewFact::new(task(), "a", [s], Confidence::Medium)).unwrap();

        let bytes = serde_json::to_vec_pretty(&store).unwrap();
        let restored: EvidenceStore = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, store);
        assert_eq!(serde_json::to_vec_pretty(&restored).unwrap(), bytes);
    }
}
