//! Probe contract and outcome types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ProbeContext;
use crate::error::ProbeError;

/// Scoring tier of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Failure alone forbids a `Passed` classification
    Critical,
    /// Contributes weight only
    Supplementary,
}

/// How a probe resolves when it cannot reach a verdict from evidence.
///
/// Applies to exhausted fallback chains and to internal faults. Timeouts
/// and cancellation ignore it: an interrupted probe never passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Treat the check as satisfied
    FailOpen,
    /// Treat the check as violated
    FailClosed,
}

impl FailurePolicy {
    /// Verdict this policy assigns when evidence is missing.
    #[must_use]
    pub const fn default_verdict(self) -> bool {
        matches!(self, Self::FailOpen)
    }

    /// Short label used in evidence text.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FailOpen => "fail-open",
            Self::FailClosed => "fail-closed",
        }
    }
}

/// Static description of a probe: identity, weight and policies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeDescriptor {
    /// Unique name within its probe set
    pub name: &'static str,
    /// Relative weight, must be > 0
    pub weight: f64,
    /// Scoring tier
    pub tier: Tier,
    /// Resolution when evidence is missing or the probe faults
    pub policy: FailurePolicy,
    /// A failure is a zero-tolerance finding
    pub veto: bool,
    /// Shared mutable acquisition state this probe touches
    pub resource: Option<&'static str>,
    /// Advice shown when this probe fails
    pub remediation: &'static str,
}

impl ProbeDescriptor {
    /// Critical-tier probe, fail-closed by default.
    #[must_use]
    pub const fn critical(name: &'static str, weight: f64) -> Self {
        Self::new(name, weight, Tier::Critical)
    }

    /// Supplementary-tier probe, fail-closed by default.
    #[must_use]
    pub const fn supplementary(name: &'static str, weight: f64) -> Self {
        Self::new(name, weight, Tier::Supplementary)
    }

    const fn new(name: &'static str, weight: f64, tier: Tier) -> Self {
        Self {
            name,
            weight,
            tier,
            policy: FailurePolicy::FailClosed,
            veto: false,
            resource: None,
            remediation: "",
        }
    }

    /// Resolve missing evidence as satisfied.
    #[must_use]
    pub const fn fail_open(mut self) -> Self {
        self.policy = FailurePolicy::FailOpen;
        self
    }

    /// Resolve missing evidence as violated.
    #[must_use]
    pub const fn fail_closed(mut self) -> Self {
        self.policy = FailurePolicy::FailClosed;
        self
    }

    /// Mark failures as zero-tolerance findings.
    #[must_use]
    pub const fn veto(mut self) -> Self {
        self.veto = true;
        self
    }

    /// Declare shared acquisition state.
    #[must_use]
    pub const fn resource(mut self, resource: &'static str) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Remediation template.
    #[must_use]
    pub const fn remediation(mut self, text: &'static str) -> Self {
        self.remediation = text;
        self
    }

    /// Whether this probe touches shared mutable state.
    #[must_use]
    pub const fn is_stateful(&self) -> bool {
        self.resource.is_some()
    }
}

/// One typed key/value sub-finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    /// Key
    pub key: String,
    /// Value
    pub value: String,
}

/// What a probe concluded, before scoring metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Verdict
    pub passed: bool,
    /// Human-readable evidence
    pub evidence: String,
    /// Sub-findings
    pub details: Vec<Detail>,
    /// Verdict came from the failure policy, not from evidence
    pub assumed: bool,
}

impl Finding {
    /// A passing finding.
    pub fn pass(evidence: impl Into<String>) -> Self {
        Self::verdict(true, evidence)
    }

    /// A failing finding.
    pub fn fail(evidence: impl Into<String>) -> Self {
        Self::verdict(false, evidence)
    }

    /// A finding with an explicit verdict.
    pub fn verdict(passed: bool, evidence: impl Into<String>) -> Self {
        Self {
            passed,
            evidence: evidence.into(),
            details: Vec::new(),
            assumed: false,
        }
    }

    /// Evidence was unavailable; apply `policy`.
    pub fn unresolved(policy: FailurePolicy, reason: &str) -> Self {
        let assumption = if policy.default_verdict() {
            "assumed satisfied"
        } else {
            "assumed violated"
        };
        Self {
            passed: policy.default_verdict(),
            evidence: format!("evidence unavailable ({reason}); {assumption} ({})", policy.label()),
            details: Vec::new(),
            assumed: true,
        }
    }

    /// Attach a sub-finding.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push(Detail {
            key: key.into(),
            value: value.into(),
        });
        self
    }
}

/// Scored result of one probe execution. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Probe name
    pub name: String,
    /// Verdict
    pub passed: bool,
    /// Human-readable evidence
    pub evidence: String,
    /// Relative weight (> 0)
    pub weight: f64,
    /// Scoring tier
    pub tier: Tier,
    /// Internal fault, timeout or cancellation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sub-findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Detail>,
    /// Verdict came from the failure policy, not from evidence
    #[serde(default)]
    pub assumed: bool,
    /// Failure is a zero-tolerance finding
    #[serde(default)]
    pub veto: bool,
}

impl ProbeOutcome {
    /// Attach scoring metadata to a finding.
    #[must_use]
    pub fn from_finding(descriptor: &ProbeDescriptor, finding: Finding) -> Self {
        Self {
            name: descriptor.name.to_string(),
            passed: finding.passed,
            evidence: finding.evidence,
            weight: descriptor.weight,
            tier: descriptor.tier,
            error: None,
            details: finding.details,
            assumed: finding.assumed,
            veto: descriptor.veto,
        }
    }

    /// Outcome for a probe that faulted; the failure policy decides the verdict.
    #[must_use]
    pub fn faulted(descriptor: &ProbeDescriptor, error: &ProbeError) -> Self {
        let passed = descriptor.policy.default_verdict();
        Self {
            name: descriptor.name.to_string(),
            passed,
            evidence: format!("probe fault; resolved {}", descriptor.policy.label()),
            weight: descriptor.weight,
            tier: descriptor.tier,
            error: Some(error.to_string()),
            details: Vec::new(),
            assumed: true,
            veto: descriptor.veto,
        }
    }

    /// Outcome for a probe that never finished (timeout, budget, cancellation).
    #[must_use]
    pub fn interrupted(descriptor: &ProbeDescriptor, reason: &str) -> Self {
        Self {
            name: descriptor.name.to_string(),
            passed: false,
            evidence: format!("evidence unavailable: {reason}"),
            weight: descriptor.weight,
            tier: descriptor.tier,
            error: Some(reason.to_string()),
            details: Vec::new(),
            assumed: false,
            veto: descriptor.veto,
        }
    }

    /// Critical-tier outcome.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.tier == Tier::Critical
    }

    /// Failing outcome that vetoes a passing classification.
    ///
    /// Only an observed failure vetoes; an assumed verdict, a fault or an
    /// interruption stays an ordinary non-passing outcome.
    #[must_use]
    pub const fn is_veto(&self) -> bool {
        self.veto && !self.passed && !self.assumed && self.error.is_none()
    }
}

/// One discrete security check.
///
/// `evaluate` may return an error; the probe boundary
/// ([`crate::runner::run_probe`]) converts it into an outcome using the
/// descriptor's failure policy.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Identity, weight and policies.
    fn descriptor(&self) -> &ProbeDescriptor;

    /// Gather evidence and apply the pass/fail rule.
    async fn evaluate(&self, ctx: &ProbeContext) -> Result<Finding, ProbeError>;
}
