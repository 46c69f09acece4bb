use thiserror::Error;

/// Result type alias for configuration-time operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration faults.
///
/// These are rejected eagerly when a probe set, scorer or denylist is
/// constructed, never deferred to scoring time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Probe set has no probes
    #[error("probe set `{category}` is empty")]
    EmptyProbeSet {
        /// Category the set belongs to
        category: String,
    },

    /// Two probes in one set share a name
    #[error("duplicate probe name `{name}` in `{category}`")]
    DuplicateProbe {
        /// Category the set belongs to
        category: String,
        /// The repeated probe name
        name: String,
    },

    /// A probe weight is zero, negative, NaN or infinite
    #[error("probe `{name}` has invalid weight {weight}")]
    InvalidWeight {
        /// Offending probe
        name: String,
        /// The rejected weight
        weight: f64,
    },

    /// Weights of a set add up to nothing usable
    #[error("probe set `{category}` has zero total weight")]
    ZeroTotalWeight {
        /// Category the set belongs to
        category: String,
    },

    /// Thresholds are inverted or outside 0..=100
    #[error("invalid thresholds: pass {pass}, fail {fail}")]
    InvalidThresholds {
        /// Pass threshold
        pass: u8,
        /// Fail threshold
        fail: u8,
    },

    /// No probe set registered for a category
    #[error("no probe set registered for category `{0}`")]
    MissingProbeSet(String),

    /// Signature denylist is malformed
    #[error("invalid denylist: {0}")]
    Denylist(String),

    /// Config file could not be parsed
    #[error("config parse error: {0}")]
    Parse(String),

    /// Config values are inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures raised by stateful evidence providers (hardware key stores).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    /// The provider does not exist on this host
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the operation
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The provider failed while handling the request
    #[error("provider error: {0}")]
    Provider(String),
}

/// Probe internal faults.
///
/// Caught at the probe boundary and converted into a documented
/// fail-open or fail-closed outcome; never reaches the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Evidence provider failed in a way the probe cannot interpret
    #[error("evidence provider failed: {0}")]
    Provider(String),

    /// Evidence was present but unparseable
    #[error("malformed evidence: {0}")]
    Malformed(String),

    /// Key store operation failed
    #[error("key store error: {0}")]
    KeyStore(#[from] EvidenceError),

    /// The probe panicked
    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    /// Returns true if the fault came from a caught panic
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }

    /// Returns true if the fault originated in a key store
    #[must_use]
    pub const fn is_key_store(&self) -> bool {
        matches!(self, Self::KeyStore(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_store_errors_convert() {
        let err: ProbeError = EvidenceError::Provider("keymint crashed".into()).into();
        assert!(err.is_key_store());
        assert!(!err.is_panic());
        assert_eq!(
            err.to_string(),
            "key store error: provider error: keymint crashed"
        );
    }
}
