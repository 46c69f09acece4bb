//! Evidence source interfaces consumed by probes.
//!
//! Implementations live outside the core (see `hostward-host`). Every
//! method is infallible at the boundary: failures surface as
//! [`Evidence::Unknown`], except for the stateful key store whose
//! provider errors must reach the probe so it can document them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::Evidence;
use crate::error::EvidenceError;

/// Metadata about one filesystem path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFacts {
    /// Path exists (symlinks are not followed)
    pub exists: bool,
    /// Current process can read it (the target, for symlinks)
    pub readable: bool,
    /// Current process can write it (the target, for symlinks)
    pub writable: bool,
    /// Size in bytes of the target (0 when absent or dangling)
    pub size_bytes: u64,
}

impl FileFacts {
    /// Facts for a path that does not exist.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            exists: false,
            readable: false,
            writable: false,
            size_bytes: 0,
        }
    }
}

/// Parameters for a test key created in a hardware-backed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// Key algorithm, e.g. `EC` or `AES`
    pub algorithm: String,
    /// Key size in bits
    pub size_bits: u32,
    /// Ask for the dedicated secure element (StrongBox) rather than the TEE
    pub require_strongbox: bool,
}

impl KeySpec {
    /// P-256 signing key in the default secure environment.
    #[must_use]
    pub fn ec_p256() -> Self {
        Self {
            algorithm: "EC".into(),
            size_bits: 256,
            require_strongbox: false,
        }
    }

    /// Same key, pinned to StrongBox.
    #[must_use]
    pub fn strongbox_ec_p256() -> Self {
        Self {
            require_strongbox: true,
            ..Self::ec_p256()
        }
    }
}

/// What the key store reports about a freshly created key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttestation {
    /// A key now exists under the alias
    pub created: bool,
    /// Key material lives inside secure hardware
    pub inside_secure_hardware: bool,
    /// Key material lives in a dedicated secure element
    pub strongbox_backed: bool,
}

/// Kind of active network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// No active link
    None,
    /// Wired link
    Ethernet,
    /// Wireless LAN
    Wifi,
    /// Mobile data
    Cellular,
    /// Link type could not be classified
    Other,
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Ethernet => write!(f, "ethernet"),
            Self::Wifi => write!(f, "wifi"),
            Self::Cellular => write!(f, "cellular"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Network configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFacts {
    /// Active link type
    pub connection_type: ConnectionType,
    /// A VPN tunnel is up
    pub vpn_active: bool,
    /// Configured proxy, if any
    pub proxy: Option<String>,
    /// Configured DNS resolvers
    pub dns_servers: Vec<String>,
    /// TLS protocol versions the platform will negotiate, e.g. `TLSv1.2`
    pub tls_protocols: Vec<String>,
}

/// Filesystem metadata and small content reads.
#[async_trait]
pub trait FileEvidence: Send + Sync {
    /// Existence and access facts for `path`.
    async fn inspect(&self, path: &str) -> Evidence<FileFacts>;

    /// Read at most `max_bytes` of `path` as text.
    async fn read(&self, path: &str, max_bytes: usize) -> Evidence<String>;
}

/// OS or build property lookup.
#[async_trait]
pub trait PropertyEvidence: Send + Sync {
    /// Value of `key`; absent or denied properties are `Unknown`.
    async fn property(&self, key: &str) -> Evidence<String>;
}

/// Subprocess execution.
#[async_trait]
pub trait CommandEvidence: Send + Sync {
    /// Standard output of `argv`; timeout, denial or non-zero exit is `Unknown`.
    async fn run(&self, argv: &[&str], timeout: Duration) -> Evidence<String>;
}

/// Installed-application presence.
#[async_trait]
pub trait PackageEvidence: Send + Sync {
    /// Whether `identifier` is installed.
    async fn installed(&self, identifier: &str) -> Evidence<bool>;
}

/// Hardware-backed key store.
///
/// Stateful: every alias handed to `create` must later be passed to
/// `delete`. Probes never call these directly; they go through
/// [`crate::KeyLedger`].
#[async_trait]
pub trait HardwareKeyEvidence: Send + Sync {
    /// Create a key under `alias` and report where it lives.
    async fn create(&self, alias: &str, spec: &KeySpec) -> Result<KeyAttestation, EvidenceError>;

    /// Delete `alias`. Deleting an alias that does not exist succeeds.
    async fn delete(&self, alias: &str) -> Result<(), EvidenceError>;
}

/// Network configuration.
#[async_trait]
pub trait NetworkEvidence: Send + Sync {
    /// Current network configuration.
    async fn snapshot(&self) -> Evidence<NetworkFacts>;
}

/// Directory-listing-based presence checks.
#[async_trait]
pub trait EntityEnumerationEvidence: Send + Sync {
    /// Names of the entities found directly under `base_path`.
    async fn enumerate(&self, base_path: &str) -> Evidence<BTreeSet<String>>;
}

/// Every evidence source a probe may consult.
#[derive(Clone)]
pub struct EvidenceSources {
    /// Filesystem
    pub files: Arc<dyn FileEvidence>,
    /// Properties
    pub properties: Arc<dyn PropertyEvidence>,
    /// Subprocesses
    pub commands: Arc<dyn CommandEvidence>,
    /// Packages
    pub packages: Arc<dyn PackageEvidence>,
    /// Key store
    pub keys: Arc<dyn HardwareKeyEvidence>,
    /// Network
    pub network: Arc<dyn NetworkEvidence>,
    /// Entity enumeration
    pub entities: Arc<dyn EntityEnumerationEvidence>,
}

impl std::fmt::Debug for EvidenceSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceSources").finish_non_exhaustive()
    }
}
