//! Output formatting for different formats.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use hostward::{AssessmentResult, Classification};
use serde::{Deserialize, Serialize};
use std::process::ExitCode;
use std::str::FromStr;

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Progress spinners and tables with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "table" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, json, yaml",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Print `value` as JSON or YAML. Pretty output is the caller's job.
pub fn print_structured<T: Serialize>(format: OutputFormat, value: &T) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Pretty => anyhow::bail!("structured output requested in pretty mode"),
    }
    Ok(())
}

/// Machine-readable assessment report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Stable identifier of the assessed host
    pub node_id: String,
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Version of the denylist matched against
    pub denylist_version: String,
    /// One result per assessed category
    pub results: Vec<AssessmentResult>,
}

impl Report {
    /// Report for this host, stamped now.
    pub fn new(denylist_version: &str, results: Vec<AssessmentResult>) -> Self {
        Self {
            node_id: node_id(),
            generated_at: Utc::now(),
            denylist_version: denylist_version.to_string(),
            results,
        }
    }

    /// Worst classification across results.
    pub fn worst(&self) -> Classification {
        worst(&self.results)
    }
}

/// Worst classification across `results`; passed when empty.
pub fn worst(results: &[AssessmentResult]) -> Classification {
    results
        .iter()
        .map(|r| r.classification)
        .max_by_key(|c| c.severity())
        .unwrap_or(Classification::Passed)
}

/// Process exit status for a classification.
pub fn exit_code(classification: Classification) -> ExitCode {
    ExitCode::from(classification.severity())
}

/// Classification label in its color.
pub fn verdict(classification: Classification) -> ColoredString {
    let label = classification.to_string();
    match classification {
        Classification::Passed => label.green().bold(),
        Classification::Warning => label.yellow().bold(),
        Classification::Failed => label.red().bold(),
    }
}

/// Machine identity: `/etc/machine-id`, then the hostname.
pub fn node_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let trimmed = id.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }

    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}
