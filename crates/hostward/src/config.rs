//! Runtime configuration for assessment runs.

use hostward_core::{ConfigError, Result};
use hostward_probes::{ProbeOptions, DEFAULT_ENUMERATION_PATHS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How category runs are scheduled and bounded.
///
/// Scoring thresholds are not part of this: they are fixed per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentConfig {
    /// Upper bound for a single probe (default: 1000ms).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Wall-clock budget for a whole category run (default: 2000ms).
    #[serde(default = "default_category_budget")]
    pub category_budget_ms: u64,

    /// Delay after each progressive emission, for UIs (default: off).
    #[serde(default)]
    pub pacing_ms: u64,

    /// Run independent probes of a category concurrently (default: true).
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,

    /// Subprocess timeout handed to command evidence (default: 800ms).
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Directories the signature matcher enumerates.
    #[serde(default = "default_enumeration_paths")]
    pub enumeration_paths: Vec<String>,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            category_budget_ms: default_category_budget(),
            pacing_ms: 0,
            concurrent: default_concurrent(),
            command_timeout_ms: default_command_timeout(),
            enumeration_paths: default_enumeration_paths(),
        }
    }
}

impl AssessmentConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject budgets that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid("probe_timeout_ms must be positive".into()));
        }
        if self.category_budget_ms == 0 {
            return Err(ConfigError::Invalid("category_budget_ms must be positive".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid("command_timeout_ms must be positive".into()));
        }
        if self.probe_timeout_ms > self.category_budget_ms {
            return Err(ConfigError::Invalid(format!(
                "probe_timeout_ms ({}) exceeds category_budget_ms ({})",
                self.probe_timeout_ms, self.category_budget_ms
            )));
        }
        Ok(())
    }

    /// Per-probe timeout.
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Per-category budget.
    pub const fn category_budget(&self) -> Duration {
        Duration::from_millis(self.category_budget_ms)
    }

    /// Emission pacing; zero when disabled.
    pub const fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Command evidence timeout.
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Options for the probe catalogue.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            enumeration_paths: self.enumeration_paths.clone(),
        }
    }
}

// Default value functions for serde.
const fn default_probe_timeout() -> u64 {
    1000
}

const fn default_category_budget() -> u64 {
    2000
}

const fn default_concurrent() -> bool {
    true
}

const fn default_command_timeout() -> u64 {
    800
}

fn default_enumeration_paths() -> Vec<String> {
    DEFAULT_ENUMERATION_PATHS
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AssessmentConfig::default();
        assert_eq!(config.probe_timeout(), Duration::from_secs(1));
        assert_eq!(config.category_budget(), Duration::from_secs(2));
        assert!(config.pacing().is_zero());
        assert!(config.concurrent);
        assert_eq!(config.command_timeout_ms, 800);
        assert_eq!(config.probe_options(), ProbeOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config = AssessmentConfig::from_toml("concurrent = false\npacing_ms = 150\n").unwrap();
        assert!(!config.concurrent);
        assert_eq!(config.pacing(), Duration::from_millis(150));
        assert_eq!(config.category_budget_ms, 2000);
        assert_eq!(config.enumeration_paths, default_enumeration_paths());
    }

    #[test]
    fn inconsistent_budgets_are_rejected() {
        let config = AssessmentConfig {
            probe_timeout_ms: 5000,
            ..AssessmentConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = AssessmentConfig {
            category_budget_ms: 0,
            ..AssessmentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_falls_back_and_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(AssessmentConfig::load(&missing).unwrap(), AssessmentConfig::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "probe_timeout_ms = \"soon\"").unwrap();
        assert!(matches!(
            AssessmentConfig::load(&broken),
            Err(ConfigError::Parse(_))
        ));

        let tuned = dir.path().join("tuned.toml");
        std::fs::write(&tuned, "category_budget_ms = 4000\nprobe_timeout_ms = 1500\n").unwrap();
        let config = AssessmentConfig::load(&tuned).unwrap();
        assert_eq!(config.probe_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_config_serialization() {
        let config = AssessmentConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = AssessmentConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
