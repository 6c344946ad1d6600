//! Common test utilities for integration tests
//!
//! Provides shared fixtures and builders used across multiple integration
//! test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use deepresearch::adapters::{
    BundleSynthesizer, FilePlanner, JsonSnapshotStore, ReplayFixture, ReplayStep, ReplayWorker,
};
use deepresearch::application::Collaborators;
use deepresearch::domain::models::{
    Confidence, ContradictionClaim, CredibilityTier, Datum, DispatchOutcome, FactCandidate, FactId,
    FreshnessBucket, Severity, SourceCandidate, SourceRef, SourceType,
};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Files of one mission laid out in a temp dir.
pub struct MissionFiles {
    pub dir: TempDir,
    pub plan: PathBuf,
    pub output: PathBuf,
    pub snapshot: PathBuf,
}

impl MissionFiles {
    pub fn new(plan_yaml: &str) -> Self {
        let dir = temp_dir();
        let plan = dir.path().join("plan.yaml");
        std::fs::write(&plan, plan_yaml).expect("Failed to write plan");
        Self {
            output: dir.path().join("report.json"),
            snapshot: dir.path().join(".deepresearch").join("mission.json"),
            plan,
            dir,
        }
    }

    pub fn rewrite_plan(&self, plan_yaml: &str) {
        std::fs::write(&self.plan, plan_yaml).expect("Failed to rewrite plan");
    }

    pub fn collaborators(&self, worker: Arc<ReplayWorker>) -> Collaborators {
        Collaborators {
            planner: Arc::new(FilePlanner::new(&self.plan)),
            worker,
            synthesizer: Arc::new(BundleSynthesizer::new(&self.output)),
            snapshots: Arc::new(self.snapshot_store()),
        }
    }

    pub fn snapshot_store(&self) -> JsonSnapshotStore {
        JsonSnapshotStore::new(&self.snapshot)
    }

    pub fn report(&self) -> serde_json::Value {
        read_json(&self.output)
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let bytes = std::fs::read(path).expect("Failed to read output");
    serde_json::from_slice(&bytes).expect("Output is not JSON")
}

pub fn worker(fixture: ReplayFixture) -> Arc<ReplayWorker> {
    Arc::new(ReplayWorker::new(fixture))
}

pub fn source(url: &str, source_type: SourceType, tier: CredibilityTier, freshness: FreshnessBucket) -> SourceCandidate {
    SourceCandidate {
        url: url.to_string(),
        title: String::new(),
        source_type,
        credibility_tier: tier,
        freshness,
        local_archive_path: None,
    }
}

pub fn official(url: &str) -> SourceCandidate {
    source(url, SourceType::Official, CredibilityTier::Tier1, FreshnessBucket::WithinScope)
}

pub fn fact(statement: &str, urls: &[&str], dimensions: &[&str]) -> FactCandidate {
    FactCandidate {
        statement: statement.to_string(),
        sources: urls.iter().map(|u| SourceRef::Url((*u).to_string())).collect(),
        confidence: Confidence::High,
        dimensions: dimensions.iter().map(ToString::to_string).collect(),
        datum: None,
        corroborates: vec![],
        contradicts: vec![],
    }
}

pub fn with_datum(mut candidate: FactCandidate, key: &str, value: &str) -> FactCandidate {
    candidate.datum = Some(Datum {
        key: key.to_string(),
        value: value.to_string(),
        unit: None,
    });
    candidate
}

pub fn contradicting(mut candidate: FactCandidate, fact: u64, topic: &str, severity: Severity) -> FactCandidate {
    candidate.contradicts.push(ContradictionClaim {
        fact: FactId::new(fact),
        topic: topic.to_string(),
        severity,
    });
    candidate
}

/// A batch serving `facts` backed by `sources`.
pub fn batch(sources: Vec<SourceCandidate>, facts: Vec<FactCandidate>) -> ReplayStep {
    ReplayStep::Outcome(DispatchOutcome {
        facts,
        sources,
        ..DispatchOutcome::default()
    })
}

/// One informative batch: a fresh tier-1 source and a fact on `dimensions`.
pub fn informative(task: &str, n: u32, dimensions: &[&str]) -> ReplayStep {
    let url = format!("https://{task}-{n}.gov/report");
    batch(
        vec![official(&url)],
        vec![fact(&format!("{task} finding {n}"), &[&url], dimensions)],
    )
}
