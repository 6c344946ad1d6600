//! Evidence domain models: sources, facts and the append-only records that
//! amend them.
//!
//! Sources and facts are immutable once registered. Everything learned
//! afterwards about a fact (extra support, contradictions, quarantine) is
//! appended as a separate record.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::Severity;
use super::task::TaskId;

/// Monotonically assigned source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(u64);

impl SourceId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Monotonically assigned fact identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(u64);

impl FactId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Credibility bucket of a source. Tier 1 is official, government,
/// academic or peer-reviewed material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CredibilityTier {
    Tier1 = 1,
    Tier2 = 2,
    Tier3 = 3,
}

impl TryFrom<u8> for CredibilityTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Tier1),
            2 => Ok(Self::Tier2),
            3 => Ok(Self::Tier3),
            other => Err(format!("credibility tier must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<CredibilityTier> for u8 {
    fn from(tier: CredibilityTier) -> Self {
        tier as Self
    }
}

/// Publication type of a source, which fixes its authority score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// .gov / .edu / official publications
    Official,
    PeerReviewed,
    IndustryReport,
    ReputablePress,
    Blog,
    Forum,
    Social,
}

impl SourceType {
    /// Authority lookup used by evidence weighting.
    pub const fn authority(self) -> f64 {
        match self {
            Self::Official => 1.0,
            Self::PeerReviewed => 0.9,
            Self::IndustryReport => 0.8,
            Self::ReputablePress => 0.7,
            Self::Blog | Self::Forum | Self::Social => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::PeerReviewed => "peer_reviewed",
            Self::IndustryReport => "industry_report",
            Self::ReputablePress => "reputable_press",
            Self::Blog => "blog",
            Self::Forum => "forum",
            Self::Social => "social",
        }
    }
}

/// Recency bucket of a source relative to the mission's time scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessBucket {
    WithinScope,
    OneYearOld,
    TwoPlusYears,
    ClearlyOutdated,
}

impl FreshnessBucket {
    pub const fn score(self) -> f64 {
        match self {
            Self::WithinScope => 1.0,
            Self::OneYearOld => 0.8,
            Self::TwoPlusYears => 0.6,
            Self::ClearlyOutdated => 0.3,
        }
    }
}

/// A registered reference. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub credibility_tier: CredibilityTier,
    pub freshness: FreshnessBucket,
    pub accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub local_archive_path: Option<String>,
    /// Task whose worker first reported this source
    pub discovered_by: TaskId,
}

impl Source {
    pub fn is_tier1(&self) -> bool {
        self.credibility_tier == CredibilityTier::Tier1
    }
}

/// Confidence a worker attached to an extracted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A quantitative datum carried by a fact. Two data with the same key
/// describe the same measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datum {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
}

/// A sourced statement. Immutable after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub statement: String,
    pub source_ids: BTreeSet<SourceId>,
    pub confidence: Confidence,
    pub extracted_at: DateTime<Utc>,
    pub task_id: TaskId,
    #[serde(default)]
    pub dimensions: BTreeSet<String>,
    #[serde(default)]
    pub datum: Option<Datum>,
}

/// Additional support for an existing fact, found later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corroboration {
    pub fact_id: FactId,
    pub source_id: SourceId,
    pub reported_by: TaskId,
}

/// Upstream signal that two facts share a topic and contradict each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionReport {
    pub fact_a: FactId,
    pub fact_b: FactId,
    pub topic: String,
    pub severity: Severity,
    pub reported_by: TaskId,
}

/// A fact excluded from downstream use after failing the citation gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quarantine {
    pub fact_id: FactId,
    pub reason: String,
    pub quarantined_at: DateTime<Utc>,
}
