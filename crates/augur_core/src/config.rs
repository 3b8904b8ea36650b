use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AugurConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl AugurConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: AugurConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("AUGUR_DATA_DIR") {
            self.engine.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("AUGUR_HEARTBEAT_SECS") {
            if let Ok(n) = v.parse() {
                self.engine.heartbeat_secs = n;
            }
        }
        if let Ok(v) = std::env::var("AUGUR_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("AUGUR_LOG_JSON") {
            self.logging.json = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the persisted JSON state files.
    pub data_dir: PathBuf,
    /// Seconds between heartbeat cycles.
    pub heartbeat_secs: u64,
    /// Age in cycles at which a prophecy snapshot gets scored.
    pub evaluation_horizon: u64,
    /// Size of the recent-evaluation ring in prophecy stats.
    pub recent_results_capacity: usize,
    /// Snapshots kept on disk; oldest evaluated ones are dropped first.
    pub max_snapshots: usize,
    /// Upper bound on weight adjustments accepted per cycle.
    pub max_adjustments_per_cycle: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("augur_data"),
            heartbeat_secs: 1800,
            evaluation_horizon: 48,
            recent_results_capacity: 50,
            max_snapshots: 500,
            max_adjustments_per_cycle: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub level: String,
    pub json: bool,
    /// When set, logs also go to a daily-rolling file in this directory.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_dir: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AugurConfig::default();
        assert_eq!(cfg.engine.heartbeat_secs, 1800);
        assert_eq!(cfg.engine.evaluation_horizon, 48);
        assert_eq!(cfg.engine.max_adjustments_per_cycle, 5);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.logging.file_dir.is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[engine]
data_dir = "/var/lib/augur"
"#;
        let cfg: AugurConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.engine.data_dir, PathBuf::from("/var/lib/augur"));
        // Defaults for unspecified fields
        assert_eq!(cfg.engine.evaluation_horizon, 48);
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[engine]
data_dir = "state"
heartbeat_secs = 600
evaluation_horizon = 24
recent_results_capacity = 10
max_snapshots = 100
max_adjustments_per_cycle = 3

[logging]
level = "debug"
json = true
file_dir = "logs"
"#;
        let cfg: AugurConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.engine.heartbeat_secs, 600);
        assert_eq!(cfg.engine.evaluation_horizon, 24);
        assert_eq!(cfg.engine.recent_results_capacity, 10);
        assert_eq!(cfg.engine.max_snapshots, 100);
        assert_eq!(cfg.engine.max_adjustments_per_cycle, 3);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert_eq!(cfg.logging.file_dir, Some(PathBuf::from("logs")));
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("AUGUR_HEARTBEAT_SECS", "60");
        std::env::set_var("AUGUR_LOG_JSON", "true");

        let mut cfg = AugurConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.engine.heartbeat_secs, 60);
        assert!(cfg.logging.json);

        std::env::remove_var("AUGUR_HEARTBEAT_SECS");
        std::env::remove_var("AUGUR_LOG_JSON");

        // Part 2: nonexistent path returns defaults (no env interference)
        let cfg = AugurConfig::load_or_default("/nonexistent/augur.toml");
        assert_eq!(cfg.engine.heartbeat_secs, 1800);
    }
}
