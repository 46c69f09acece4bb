//! Progressive assessment state emitted by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::scoring::{AssessmentResult, Classification};

/// Where a category run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not started; never emitted, a stream yields nothing before its run starts
    Idle,
    /// Probes in flight
    Running,
    /// Final verdict; nothing follows
    Terminal(Classification),
}

/// One emission for a category run. Each emission supersedes the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentState {
    /// Category being assessed
    pub category: Category,
    /// Lifecycle phase
    pub phase: Phase,
    /// Score of the outcomes gathered so far (final result when terminal)
    pub partial: Option<AssessmentResult>,
    /// Latest progress message
    pub stage: Option<String>,
    /// Probes finished
    pub completed: usize,
    /// Probes in the set
    pub total: usize,
}

impl AssessmentState {
    /// Terminal state carrying the final result.
    #[must_use]
    pub fn terminal(result: AssessmentResult) -> Self {
        let total = result.probe_count();
        Self {
            category: result.category,
            phase: Phase::Terminal(result.classification),
            partial: Some(result),
            stage: None,
            completed: total,
            total,
        }
    }

    /// Whether this is the final emission.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self.phase, Phase::Terminal(_))
    }

    /// The final result, if terminal.
    #[must_use]
    pub fn into_result(self) -> Option<AssessmentResult> {
        if self.is_terminal() {
            self.partial
        } else {
            None
        }
    }
}
