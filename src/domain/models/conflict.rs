//! Conflict types for tracking contradictions between facts.
//!
//! Conflicts are explicit records, never hidden errors. Both facts stay in
//! the evidence store; the resolution only says which one is adopted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::evidence::{FactId, SourceId};
use super::task::TaskId;

/// Monotonically assigned conflict identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(u64);

impl ConflictId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Importance of a conflict, supplied by the caller.
///
/// HIGH touches the core question or a primary dimension, MEDIUM a
/// secondary claim, LOW a minor numeric discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one fact, taken from its highest-weighted supporting source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactWeight {
    pub fact_id: FactId,
    pub best_source: SourceId,
    pub authority: f64,
    pub freshness: f64,
    pub weight: f64,
    /// Number of distinct supporting sources (original plus corroborations)
    pub corroborating_sources: usize,
    pub extracted_at: DateTime<Utc>,
}

/// Which rule decided the adopted fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// Higher evidence weight
    Weight,
    /// Weights tied; more independent corroborating sources
    Corroboration,
    /// Weights and corroboration tied; most recently extracted
    Recency,
}

/// Decision attached to a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub adopted: FactId,
    pub basis: DecisionBasis,
    pub reasoning: String,
    pub weights: Vec<FactWeight>,
    /// Resolved without completed arbitration (iteration ceiling)
    #[serde(default)]
    pub forced: bool,
    pub resolved_at: DateTime<Utc>,
}

/// A recorded contradiction between two facts sharing a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: ConflictId,
    pub fact_a: FactId,
    pub fact_b: FactId,
    pub topic: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    /// CONFLICT task gathering arbitration evidence (HIGH severity only)
    #[serde(default)]
    pub arbitration_task: Option<TaskId>,
    /// Resolution followed by any later amendments, oldest first
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
}

impl Conflict {
    pub fn new(
        id: ConflictId,
        fact_a: FactId,
        fact_b: FactId,
        topic: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id,
            fact_a,
            fact_b,
            topic: topic.into(),
            severity,
            created_at: Utc::now(),
            arbitration_task: None,
            resolutions: Vec::new(),
        }
    }

    /// Current effective resolution (the latest amendment).
    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolutions.last()
    }

    pub fn is_resolved(&self) -> bool {
        !self.resolutions.is_empty()
    }

    /// Whether this conflict still blocks synthesis.
    pub fn is_pending_high(&self) -> bool {
        self.severity == Severity::High && !self.is_resolved()
    }

    pub fn involves(&self, fact: FactId) -> bool {
        self.fact_a == fact || self.fact_b == fact
    }

    /// Append a resolution. Earlier resolutions are kept as history.
    pub(crate) fn amend(&mut self, resolution: Resolution) {
        self.resolutions.push(resolution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(adopted: u64) -> Resolution {
        Resolution {
            adopted: FactId::new(adopted),
            basis: DecisionBasis::Weight,
            reasoning: "test".to_string(),
            weights: vec![],
            forced: false,
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_amend_keeps_history() {
        let mut conflict = Conflict::new(
            ConflictId::new(1),
            FactId::new(1),
            FactId::new(2),
            "market size",
            Severity::High,
        );
        assert!(conflict.is_pending_high());

        conflict.amend(resolution(1));
        conflict.amend(resolution(2));

        assert_eq!(conflict.resolutions.len(), 2);
        assert_eq!(conflict.resolution().unwrap().adopted, FactId::new(2));
        assert_eq!(conflict.resolutions[0].adopted, FactId::new(1));
        assert!(!conflict.is_pending_high());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
