//! # hostward-host
//!
//! Evidence sources backed by the local Linux or Android host.
//!
//! | interface | adapter |
//! |---|---|
//! | files | [`HostFiles`]: `symlink_metadata` + bounded reads |
//! | properties | [`HostProperties`]: `getprop`, then build.prop files |
//! | commands | [`HostCommands`]: `tokio::process` with kill-on-timeout |
//! | packages | [`HostPackages`]: pm, dpkg, rpm, pacman |
//! | keys | [`UnavailableKeyStore`] unless a platform store is supplied |
//! | network | [`HostNetwork`]: sysfs, resolv.conf, proxy env, OpenSSL floor |
//! | entities | [`HostEntities`]: one-level `walkdir` listings |

pub mod commands;
pub mod entities;
pub mod files;
pub mod keys;
pub mod network;
pub mod packages;
pub mod properties;

pub use commands::HostCommands;
pub use entities::HostEntities;
pub use files::{Credentials, HostFiles};
pub use keys::UnavailableKeyStore;
pub use network::HostNetwork;
pub use packages::HostPackages;
pub use properties::HostProperties;

use hostward_core::evidence::{EvidenceSources, HardwareKeyEvidence};
use std::sync::Arc;
use std::time::Duration;

/// Host evidence sources; subprocesses are bounded by `command_timeout`.
pub fn host_sources(command_timeout: Duration) -> EvidenceSources {
    host_sources_with_keys(command_timeout, Arc::new(UnavailableKeyStore))
}

/// Host evidence sources with a platform key store.
pub fn host_sources_with_keys(
    command_timeout: Duration,
    keys: Arc<dyn HardwareKeyEvidence>,
) -> EvidenceSources {
    EvidenceSources {
        files: Arc::new(HostFiles::new()),
        properties: Arc::new(HostProperties::new(command_timeout)),
        commands: Arc::new(HostCommands),
        packages: Arc::new(HostPackages::new(command_timeout)),
        keys,
        network: Arc::new(HostNetwork::new(command_timeout)),
        entities: Arc::new(HostEntities),
    }
}
