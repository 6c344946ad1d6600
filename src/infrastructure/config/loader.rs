use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project-local configuration and mission state.
pub const CONFIG_DIR: &str = ".deepresearch";

/// Prefix of environment overrides, e.g. `DEEPRESEARCH_MISSION__MAX_ITERATIONS`.
pub const ENV_PREFIX: &str = "DEEPRESEARCH_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid k_initial: {0}. Must be positive")]
    InvalidInitialK(u32),

    #[error("Invalid k_expand: {k_expand}. Must be at least k_initial ({k_initial})")]
    InvalidExpandK { k_initial: u32, k_expand: u32 },

    #[error("Invalid batch bounds: min_batches ({0}) must not exceed max_batches ({1})")]
    InvalidBatchBounds(u32, u32),

    #[error("Invalid saturation_threshold: {0}. Must be at least 1")]
    InvalidSaturationThreshold(u32),

    #[error("Invalid tie_epsilon: {0}. Must be a non-negative number")]
    InvalidTieEpsilon(f64),

    #[error("Invalid max_concurrency: {0}. Must be at least 1")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid dispatch timeout: {0}s. Must be positive")]
    InvalidTimeout(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Snapshot path cannot be empty")]
    EmptySnapshotPath,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .deepresearch/config.yaml
    /// 3. .deepresearch/local.yaml (optional local overrides)
    /// 4. Environment variables (DEEPRESEARCH_* prefix, `__` nests)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new(CONFIG_DIR))
    }

    /// Same as [`ConfigLoader::load`] with the YAML layers read from `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.mission.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(config.mission.max_iterations));
        }

        let sat = &config.saturation;
        if sat.k_initial == 0 {
            return Err(ConfigError::InvalidInitialK(sat.k_initial));
        }
        if sat.k_expand < sat.k_initial {
            return Err(ConfigError::InvalidExpandK {
                k_initial: sat.k_initial,
                k_expand: sat.k_expand,
            });
        }
        if sat.min_batches > sat.max_batches {
            return Err(ConfigError::InvalidBatchBounds(sat.min_batches, sat.max_batches));
        }
        if sat.saturation_threshold == 0 {
            return Err(ConfigError::InvalidSaturationThreshold(sat.saturation_threshold));
        }

        let epsilon = config.resolver.tie_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(ConfigError::InvalidTieEpsilon(epsilon));
        }

        if config.dispatch.max_concurrency == 0 {
            return Err(ConfigError::InvalidMaxConcurrency(config.dispatch.max_concurrency));
        }
        if config.dispatch.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.dispatch.timeout_secs));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.snapshot.path.trim().is_empty() {
            return Err(ConfigError::EmptySnapshotPath);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mission.max_iterations, 50);
        assert_eq!(config.mission.max_task_reopens, 1);
        assert_eq!(config.saturation.k_initial, 5);
        assert_eq!(config.saturation.k_expand, 10);
        assert_eq!(config.saturation.min_tier1_sources, 3);
        assert!((config.resolver.tie_epsilon - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.dispatch.timeout_secs, 600);
        assert_eq!(config.snapshot.path, ".deepresearch/mission.json");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
mission:
  max_iterations: 8
saturation:
  k_initial: 3
  k_expand: 6
  max_batches: 4
dispatch:
  max_concurrency: 2
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.mission.max_iterations, 8);
        assert_eq!(config.mission.max_gate_remediations, 1);
        assert_eq!(config.saturation.k_initial, 3);
        assert_eq!(config.saturation.max_batches, 4);
        assert_eq!(config.saturation.min_batches, 2);
        assert_eq!(config.dispatch.max_concurrency, 2);
        assert_eq!(config.logging.format, "json");
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_batch_bounds() {
        let mut config = Config::default();
        config.saturation.min_batches = 5;
        config.saturation.max_batches = 3;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBatchBounds(5, 3))
        ));
    }

    #[test]
    fn test_validate_k_ordering() {
        let mut config = Config::default();
        config.saturation.k_initial = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidInitialK(0))
        ));

        let mut config = Config::default();
        config.saturation.k_expand = 4;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidExpandK {
                k_initial: 5,
                k_expand: 4
            })
        ));
    }

    #[test]
    fn test_validate_zero_threshold() {
        let mut config = Config::default();
        config.saturation.saturation_threshold = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSaturationThreshold(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_settings() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }

        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }

    #[test]
    fn test_validate_empty_snapshot_path() {
        let mut config = Config::default();
        config.snapshot.path = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptySnapshotPath)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "mission:\n  max_iterations: 20\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        fs::write(dir.path().join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        temp_env::with_vars_unset(
            ["DEEPRESEARCH_MISSION__MAX_ITERATIONS", "DEEPRESEARCH_LOGGING__LEVEL"],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.mission.max_iterations, 20);
                assert_eq!(config.logging.level, "debug", "local.yaml should win");
                assert_eq!(config.logging.format, "json", "base value should persist");
            },
        );
    }

    #[test]
    fn test_env_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "mission:\n  max_iterations: 20\n").unwrap();

        temp_env::with_vars(
            [
                ("DEEPRESEARCH_MISSION__MAX_ITERATIONS", Some("7")),
                ("DEEPRESEARCH_DISPATCH__TIMEOUT_SECS", Some("30")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.mission.max_iterations, 7);
                assert_eq!(config.dispatch.timeout_secs, 30);
            },
        );
    }

    #[test]
    fn test_env_override_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_var("DEEPRESEARCH_SATURATION__K_INITIAL", Some("0"), || {
            let err = ConfigLoader::load_from_dir(dir.path()).unwrap_err();
            assert!(err.downcast_ref::<ConfigError>().is_some());
        });
    }
}
