//! Types exchanged with external research workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::conflict::Severity;
use super::evidence::{Confidence, CredibilityTier, Datum, FactId, FreshnessBucket, SourceId, SourceType};
use super::task::{TaskId, TaskKind};

/// One batch of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub description: String,
    /// Documents requested per query
    pub k: u32,
    pub scope: Option<String>,
    /// 1-based batch index within the task
    pub batch: u32,
    /// 1 for the first try, 2 for the single retry
    pub attempt: u32,
    pub dimensions: Vec<String>,
}

/// Worker-reported completion status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Success,
    Partial,
    Failure,
}

/// How a candidate fact points at its sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    /// A source in the same batch or already registered, matched by URL
    Url(String),
    /// An already registered source
    Id(SourceId),
}

/// A newly discovered reference reported by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCandidate {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub source_type: SourceType,
    pub credibility_tier: CredibilityTier,
    pub freshness: FreshnessBucket,
    #[serde(default)]
    pub local_archive_path: Option<String>,
}

/// Upstream claim that a candidate contradicts an existing fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionClaim {
    pub fact: FactId,
    pub topic: String,
    pub severity: Severity,
}

/// A statement extracted by a worker, not yet admitted to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCandidate {
    pub statement: String,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    pub confidence: Confidence,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub datum: Option<Datum>,
    /// Existing facts this candidate supports with additional sources
    #[serde(default)]
    pub corroborates: Vec<FactId>,
    #[serde(default)]
    pub contradicts: Vec<ContradictionClaim>,
}

/// Everything a worker returns for one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DispatchOutcome {
    #[serde(default)]
    pub facts: Vec<FactCandidate>,
    #[serde(default)]
    pub sources: Vec<SourceCandidate>,
    #[serde(default)]
    pub status: WorkerStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl DispatchOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Failure,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Cooperative cancellation signal for one dispatch.
///
/// The flag starts out present; revoking it (the analogue of deleting a
/// lock file) tells downstream work to stop early and return what it has.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    revoked: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is revoked.
    pub async fn revoked(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_revoked() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_source_ref_serde() {
        let by_url: SourceRef = serde_json::from_str(r#"{"url":"https://x.gov/a"}"#).unwrap();
        assert_eq!(by_url, SourceRef::Url("https://x.gov/a".to_string()));
        let by_id: SourceRef = serde_json::from_str(r#"{"id":3}"#).unwrap();
        assert_eq!(by_id, SourceRef::Id(SourceId::new(3)));
    }

    #[test]
    fn test_outcome_defaults() {
        let outcome: DispatchOutcome = serde_json::from_str("{}").unwrap();
        assert_eq!(outcome.status, WorkerStatus::Success);
        assert!(outcome.facts.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_flag_wakes_waiter() {
        let flag = CancelFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.revoked().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!flag.is_revoked());
        flag.revoke();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(flag.is_revoked());
    }
}
