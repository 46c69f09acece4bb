//! Deterministic reduction of probe outcomes into a classification.
//!
//! ```text
//! achieved = Σ weight(o) for passed o
//! total    = Σ weight(o)
//! score    = round(100 * achieved / total)
//!
//! Failed   if a zero-tolerance finding is present
//!          or no evidence at all could be gathered
//!          or no critical probe passed (when the set has any)
//!          or the exact percentage is below the fail threshold
//! Passed   if every critical probe passed
//!          and the exact percentage reaches the pass threshold
//! Warning  otherwise
//! ```
//!
//! Thresholds are compared against the unrounded percentage, so a score
//! that only reaches a threshold through rounding takes the more severe
//! classification.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::category::Category;
use crate::error::{ConfigError, Result};
use crate::probe::{ProbeDescriptor, ProbeOutcome, Tier};

/// Pass/fail thresholds for one category, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScorePolicy {
    /// Minimum percentage for `Passed`
    pub pass_threshold: u8,
    /// Percentages below this are `Failed`
    pub fail_threshold: u8,
}

impl ScorePolicy {
    /// 90 to pass, below 50 fails.
    pub const DEFAULT: Self = Self {
        pass_threshold: 90,
        fail_threshold: 50,
    };

    /// Reject inverted or out-of-range thresholds.
    pub const fn validate(self) -> Result<()> {
        if self.pass_threshold > 100 || self.fail_threshold > self.pass_threshold {
            return Err(ConfigError::InvalidThresholds {
                pass: self.pass_threshold,
                fail: self.fail_threshold,
            });
        }
        Ok(())
    }
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Tri-state verdict for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// All critical checks passed and the score reached the pass threshold
    Passed,
    /// Between pass and fail
    Warning,
    /// Compromised or insufficiently protected
    Failed,
}

impl Classification {
    /// Ordinal severity, higher is worse.
    #[must_use]
    pub const fn severity(self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::Warning => 1,
            Self::Failed => 2,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Warning => write!(f, "WARNING"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Scored result of one category run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    /// Category assessed
    pub category: Category,
    /// Verdict
    pub classification: Classification,
    /// `round(100 * achieved / total)`; thresholds apply to this value
    pub score_percent: u8,
    /// Outcomes that passed, in declared order
    pub passed_outcomes: Vec<ProbeOutcome>,
    /// Outcomes that failed, in declared order
    pub failed_outcomes: Vec<ProbeOutcome>,
    /// Faults, timeouts, assumptions and vetoes worth surfacing
    pub warnings: Vec<String>,
    /// What to do about the failures
    pub recommendation: String,
}

impl AssessmentResult {
    /// Total number of outcomes.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.passed_outcomes.len() + self.failed_outcomes.len()
    }

    /// Look up an outcome by probe name.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&ProbeOutcome> {
        self.passed_outcomes
            .iter()
            .chain(&self.failed_outcomes)
            .find(|o| o.name == name)
    }
}

/// Validated scorer for one probe set.
#[derive(Debug, Clone)]
pub struct Scorer {
    category: Category,
    policy: ScorePolicy,
    descriptors: Vec<ProbeDescriptor>,
    has_critical: bool,
}

impl Scorer {
    /// Build a scorer, rejecting configuration faults eagerly.
    pub fn new(
        category: Category,
        policy: ScorePolicy,
        descriptors: Vec<ProbeDescriptor>,
    ) -> Result<Self> {
        policy.validate()?;

        if descriptors.is_empty() {
            return Err(ConfigError::EmptyProbeSet {
                category: category.to_string(),
            });
        }

        let total: f64 = descriptors.iter().map(|d| d.weight).sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight {
                category: category.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for d in &descriptors {
            if !d.weight.is_finite() || d.weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: d.name.to_string(),
                    weight: d.weight,
                });
            }
            if !seen.insert(d.name) {
                return Err(ConfigError::DuplicateProbe {
                    category: category.to_string(),
                    name: d.name.to_string(),
                });
            }
        }

        let has_critical = descriptors.iter().any(|d| d.tier == Tier::Critical);
        Ok(Self {
            category,
            policy,
            descriptors,
            has_critical,
        })
    }

    /// Category this scorer belongs to.
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Thresholds in force.
    pub const fn policy(&self) -> ScorePolicy {
        self.policy
    }

    /// Descriptors this scorer was validated against.
    pub fn descriptors(&self) -> &[ProbeDescriptor] {
        &self.descriptors
    }

    /// Reduce outcomes to a result.
    ///
    /// Also used on partial runs: only the outcomes given are scored.
    #[must_use]
    pub fn score(&self, outcomes: &[ProbeOutcome]) -> AssessmentResult {
        let total: f64 = outcomes.iter().map(|o| o.weight).sum();
        let achieved: f64 = outcomes.iter().filter(|o| o.passed).map(|o| o.weight).sum();
        let exact = if total > 0.0 {
            100.0 * achieved / total
        } else {
            0.0
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let score_percent = exact.round().clamp(0.0, 100.0) as u8;

        let veto = outcomes.iter().any(ProbeOutcome::is_veto);
        let no_evidence =
            outcomes.is_empty() || outcomes.iter().all(|o| o.error.is_some() || o.assumed);
        let critical_total = outcomes.iter().filter(|o| o.is_critical()).count();
        let critical_passed = outcomes
            .iter()
            .filter(|o| o.is_critical() && o.passed)
            .count();

        let classification = if veto || no_evidence {
            Classification::Failed
        } else if self.has_critical && critical_total > 0 && critical_passed == 0 {
            Classification::Failed
        } else if score_percent < self.policy.fail_threshold {
            Classification::Failed
        } else if critical_passed == critical_total && score_percent >= self.policy.pass_threshold {
            Classification::Passed
        } else {
            Classification::Warning
        };

        let (passed_outcomes, failed_outcomes): (Vec<_>, Vec<_>) =
            outcomes.iter().cloned().partition(|o| o.passed);

        AssessmentResult {
            category: self.category,
            classification,
            score_percent,
            warnings: warnings(outcomes),
            recommendation: self.recommendation(&failed_outcomes, no_evidence),
            passed_outcomes,
            failed_outcomes,
        }
    }

    fn recommendation(&self, failed: &[ProbeOutcome], no_evidence: bool) -> String {
        let title = self.category.title();
        if no_evidence {
            return format!(
                "No evidence could be gathered for {title}; treat the host as unverified \
                 and re-run with the access the probes need."
            );
        }
        if failed.is_empty() {
            return format!("All {title} checks passed. No action needed.");
        }

        let mut lines = Vec::with_capacity(failed.len() + 1);
        lines.push(format!("{title}: {} check(s) need attention.", failed.len()));
        for outcome in failed {
            let template = self
                .descriptors
                .iter()
                .find(|d| d.name == outcome.name)
                .map(|d| d.remediation)
                .filter(|r| !r.is_empty());
            let line = template.map_or_else(
                || format!("- Investigate `{}`.", outcome.name),
                |text| format!("- {text}"),
            );
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines.join("\n")
    }
}

fn warnings(outcomes: &[ProbeOutcome]) -> Vec<String> {
    let mut warnings = Vec::new();
    for o in outcomes {
        if o.is_veto() {
            warnings.push(format!("{}: zero-tolerance finding: {}", o.name, o.evidence));
        } else if let Some(error) = &o.error {
            warnings.push(format!("{}: {error}", o.name));
        } else if o.assumed {
            warnings.push(format!("{}: {}", o.name, o.evidence));
        }
    }
    warnings
}
