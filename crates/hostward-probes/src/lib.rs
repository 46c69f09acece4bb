//! # hostward-probes
//!
//! The standard probe catalogue: one probe set per [`Category`], plus the
//! embedded signature denylist the tooling probes match against.
//!
//! ```text
//! bootloader  verified boot, lock state, release keys, debugging
//! tee         hardware keystore, TEE/TPM nodes, StrongBox, attestation
//! selinux     enforcement, policy, boot overrides, enforce node
//! integrity   su binaries, root artefacts, read-only mounts, taint
//! network     TLS versions, proxy, resolvers, link, VPN
//! tooling     denylisted entities and packages, hooking frameworks
//! ```

pub mod bootloader;
pub mod denylist;
pub mod integrity;
pub mod network;
pub mod selinux;
mod support;
pub mod tee;
pub mod tooling;

use hostward_core::{Category, Denylist, ProbeSet, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Base paths enumerated for denylisted entities by default.
pub const DEFAULT_ENUMERATION_PATHS: &[&str] = &[
    "/data/app",
    "/data/data",
    "/data/local/tmp",
    "/system/app",
    "/system/priv-app",
    "/system/bin",
    "/system/xbin",
    "/usr/bin",
    "/usr/local/bin",
    "/opt",
];

/// Host-specific knobs the catalogue needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// Directories enumerated by the signature matcher
    pub enumeration_paths: Vec<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            enumeration_paths: DEFAULT_ENUMERATION_PATHS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

/// Standard probe set for `category`.
pub fn probe_set(
    category: Category,
    denylist: &Arc<Denylist>,
    options: &ProbeOptions,
) -> Result<ProbeSet> {
    match category {
        Category::Bootloader => bootloader::probe_set(),
        Category::Tee => tee::probe_set(),
        Category::Selinux => selinux::probe_set(),
        Category::Integrity => integrity::probe_set(),
        Category::Network => network::probe_set(),
        Category::Tooling => tooling::probe_set(denylist, options),
    }
}

/// Every standard probe set, in [`Category::ALL`] order.
pub fn standard_sets(denylist: &Arc<Denylist>, options: &ProbeOptions) -> Result<Vec<ProbeSet>> {
    Category::ALL
        .iter()
        .map(|&category| probe_set(category, denylist, options))
        .collect()
}
