//! Evidence model: tri-state facts and the sources that produce them.
//!
//! An evidence source answers one question about the host. It either knows
//! the answer or says why it does not; it never picks a default on the
//! caller's behalf. Coercion of `Unknown` into pass/fail belongs to the
//! probe that consumes the fact (see [`crate::FailurePolicy`]).

pub mod chain;
pub mod sources;

pub use chain::{Acquisition, Attempt, FallbackChain, Resolution};
pub use sources::{
    CommandEvidence, ConnectionType, EntityEnumerationEvidence, EvidenceSources, FileEvidence,
    FileFacts, HardwareKeyEvidence, KeyAttestation, KeySpec, NetworkEvidence, NetworkFacts,
    PackageEvidence, PropertyEvidence,
};

use serde::{Deserialize, Serialize};

/// Result of one evidence acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Evidence<T> {
    /// The source produced ground truth or a usable inference
    Known(T),
    /// The source could not answer; carries the reason
    Unknown(String),
}

/// A single boolean fact about the host.
pub type Fact = Evidence<bool>;

impl<T> Evidence<T> {
    /// Build an `Unknown` from anything displayable.
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::Unknown(reason.into())
    }

    /// Returns true if the source answered.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The answer, if there is one.
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown(_) => None,
        }
    }

    /// Borrow the answer, if there is one.
    pub const fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown(_) => None,
        }
    }

    /// Why the source could not answer.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Known(_) => None,
            Self::Unknown(reason) => Some(reason),
        }
    }

    /// Transform a known answer.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Evidence<U> {
        match self {
            Self::Known(value) => Evidence::Known(f(value)),
            Self::Unknown(reason) => Evidence::Unknown(reason),
        }
    }

    /// Chain a fallible interpretation onto a known answer.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Evidence<U>) -> Evidence<U> {
        match self {
            Self::Known(value) => f(value),
            Self::Unknown(reason) => Evidence::Unknown(reason),
        }
    }

    /// Keep a known answer, otherwise ask `f` with the failure reason.
    pub fn or_else(self, f: impl FnOnce(String) -> Self) -> Self {
        match self {
            Self::Known(value) => Self::Known(value),
            Self::Unknown(reason) => f(reason),
        }
    }
}

impl<T> From<Option<T>> for Evidence<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(|| Self::unknown("no value"), Self::Known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_survives_map_and_and_then() {
        let e: Evidence<&str> = Evidence::unknown("permission denied");
        let mapped = e.map(|s| s.len()).and_then(|n| Evidence::Known(n > 2));
        assert_eq!(mapped.reason(), Some("permission denied"));
        assert!(!mapped.is_known());
    }

    #[test]
    fn or_else_sees_reason() {
        let e: Fact = Evidence::unknown("absent");
        let recovered = e.or_else(|reason| Evidence::Known(reason == "absent"));
        assert_eq!(recovered, Evidence::Known(true));
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_string(&Evidence::Known(true)).unwrap();
        assert_eq!(json, r#"{"state":"known","value":true}"#);
    }
}
