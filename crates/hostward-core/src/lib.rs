//! # hostward-core
//!
//! Probe contract, evidence model and trust scoring for hostward.
//!
//! Nothing in this crate touches the host. Probes consume facts through
//! the [`evidence`] interfaces, the [`runner`] turns every probe execution
//! into a well-formed [`ProbeOutcome`], and the [`Scorer`] reduces a probe
//! set's outcomes into an explainable [`AssessmentResult`].
//!
//! ## Data Flow
//!
//! ```text
//! EvidenceSources ──> Probe::evaluate ──> run_probe ──> ProbeOutcome
//!                     (FallbackChain)     (policy,       │
//!                                          timeout,      ▼
//!                                          key sweep)  Scorer::score
//!                                                        │
//!                                                        ▼
//!                                                AssessmentResult
//! ```

pub mod category;
pub mod context;
pub mod error;
pub mod evidence;
pub mod hash;
pub mod probe;
pub mod runner;
pub mod scoring;
pub mod set;
pub mod signature;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use category::{Category, UnknownCategory};
pub use context::{KeyLedger, ProbeContext, Progress, ScopedKey};
pub use error::{ConfigError, EvidenceError, ProbeError, Result};
pub use evidence::{Evidence, EvidenceSources, Fact, FallbackChain};
pub use probe::{Detail, FailurePolicy, Finding, Probe, ProbeDescriptor, ProbeOutcome, Tier};
pub use runner::run_probe;
pub use scoring::{AssessmentResult, Classification, ScorePolicy, Scorer};
pub use set::{ProbeSet, ProbeSetBuilder};
pub use signature::{match_signatures, Denylist, MatchPass, MatchReport, SignatureEntry};
pub use state::{AssessmentState, Phase};
