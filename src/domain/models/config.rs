use serde::{Deserialize, Serialize};

/// Main configuration structure for a research mission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Mission-level limits
    #[serde(default)]
    pub mission: MissionConfig,

    /// Adaptive stopping parameters
    #[serde(default)]
    pub saturation: SaturationConfig,

    /// Conflict resolution parameters
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Worker dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Snapshot persistence configuration
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

/// Mission-level limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MissionConfig {
    /// Hard ceiling on RESEARCHING/REFLECTING rounds
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Times a failed task is re-opened before its dependents are routed around
    #[serde(default = "default_max_task_reopens")]
    pub max_task_reopens: u32,

    /// Quarantine attempts before a blocked citation gate becomes fatal
    #[serde(default = "default_max_gate_remediations")]
    pub max_gate_remediations: u32,
}

const fn default_max_iterations() -> u32 {
    50
}

const fn default_max_task_reopens() -> u32 {
    1
}

const fn default_max_gate_remediations() -> u32 {
    1
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_task_reopens: default_max_task_reopens(),
            max_gate_remediations: default_max_gate_remediations(),
        }
    }
}

/// Saturation controller parameters (per EXECUTE task)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SaturationConfig {
    /// Documents per query for the first batches and after informative batches
    #[serde(default = "default_k_initial")]
    pub k_initial: u32,

    /// Documents per query once batches stop yielding new information
    #[serde(default = "default_k_expand")]
    pub k_expand: u32,

    #[serde(default = "default_min_batches")]
    pub min_batches: u32,

    /// Hard cap; reaching it without saturating flags the task partial
    #[serde(default = "default_max_batches")]
    pub max_batches: u32,

    /// Consecutive non-informative batches required to stop
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: u32,

    #[serde(default = "default_min_tier1_sources")]
    pub min_tier1_sources: usize,
}

const fn default_k_initial() -> u32 {
    5
}

const fn default_k_expand() -> u32 {
    10
}

const fn default_min_batches() -> u32 {
    2
}

const fn default_max_batches() -> u32 {
    10
}

const fn default_saturation_threshold() -> u32 {
    2
}

const fn default_min_tier1_sources() -> usize {
    3
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            k_initial: default_k_initial(),
            k_expand: default_k_expand(),
            min_batches: default_min_batches(),
            max_batches: default_max_batches(),
            saturation_threshold: default_saturation_threshold(),
            min_tier1_sources: default_min_tier1_sources(),
        }
    }
}

/// Conflict resolver parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResolverConfig {
    /// Weights closer than this are treated as tied
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
}

const fn default_tie_epsilon() -> f64 {
    0.01
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: default_tie_epsilon(),
        }
    }
}

/// Worker dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchConfig {
    /// Timeout per dispatch attempt (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum concurrent tasks per ready wave
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How long a dispatch waits for the exclusive resource (seconds)
    #[serde(default = "default_exclusive_wait_secs")]
    pub exclusive_wait_secs: u64,

    /// After this long a holder of the exclusive resource is force-released (seconds)
    #[serde(default = "default_exclusive_lease_secs")]
    pub exclusive_lease_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    600
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_exclusive_wait_secs() -> u64 {
    300
}

const fn default_exclusive_lease_secs() -> u64 {
    600
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            exclusive_wait_secs: default_exclusive_wait_secs(),
            exclusive_lease_secs: default_exclusive_lease_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated JSON log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SnapshotConfig {
    /// Path of the committed mission snapshot
    #[serde(default = "default_snapshot_path")]
    pub path: String,
}

fn default_snapshot_path() -> String {
    ".deepresearch/mission.json".to_string()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}
