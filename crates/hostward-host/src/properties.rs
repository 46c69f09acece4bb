//! Build and system properties.
//!
//! `getprop` answers on Android. Elsewhere, and when `getprop` is denied,
//! the build property files are parsed instead.

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, PropertyEvidence};
use std::time::Duration;

use crate::commands::{execute, Execution};
use crate::files::io_reason;

/// Property files searched when `getprop` cannot answer.
pub const BUILD_PROP_FILES: &[&str] = &[
    "/system/build.prop",
    "/system/etc/prop.default",
    "/vendor/build.prop",
    "/default.prop",
];

/// [`PropertyEvidence`] for Android-style properties.
#[derive(Debug, Clone)]
pub struct HostProperties {
    timeout: Duration,
    prop_files: Vec<String>,
}

impl HostProperties {
    /// Property lookups with `getprop` bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            prop_files: BUILD_PROP_FILES.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// Replace the property files consulted after `getprop`.
    #[must_use]
    pub fn with_prop_files(mut self, files: Vec<String>) -> Self {
        self.prop_files = files;
        self
    }

    async fn getprop(&self, key: &str) -> Evidence<String> {
        match execute(&["getprop", key], self.timeout).await {
            Execution::Completed {
                success: true,
                stdout,
            } => {
                let value = stdout.trim();
                if value.is_empty() {
                    Evidence::unknown("property not set")
                } else {
                    Evidence::Known(value.to_string())
                }
            }
            other => other.into_evidence(),
        }
    }

    async fn prop_file(&self, key: &str) -> Evidence<String> {
        let mut reasons = Vec::new();
        for path in &self.prop_files {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    if let Some(value) = lookup(&text, key) {
                        return Evidence::Known(value);
                    }
                }
                Err(e) => reasons.push(format!("{path}: {}", io_reason(&e))),
            }
        }
        if reasons.len() == self.prop_files.len() {
            Evidence::unknown("no build property file readable")
        } else {
            Evidence::unknown("property not set")
        }
    }
}

/// Value of `key` in a `key=value` property file.
fn lookup(text: &str, key: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().to_string())
        .last()
}

#[async_trait]
impl PropertyEvidence for HostProperties {
    async fn property(&self, key: &str) -> Evidence<String> {
        match self.getprop(key).await {
            Evidence::Known(value) => Evidence::Known(value),
            // getprop ran and knows nothing; the files hold the same store
            Evidence::Unknown(reason) if reason == "property not set" => Evidence::Unknown(reason),
            Evidence::Unknown(getprop) => self.prop_file(key).await.or_else(|files| {
                Evidence::Unknown(format!("getprop: {getprop}; build.prop: {files}"))
            }),
        }
    }
}
