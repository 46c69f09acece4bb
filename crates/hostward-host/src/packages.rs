//! Installed-package presence through the local package manager.

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, PackageEvidence};
use std::time::Duration;
use tracing::debug;

use crate::commands::{execute, Execution};

/// Query command per package manager; `{}` is the identifier.
///
/// Android's `pm` comes first, then dpkg, rpm and pacman.
const MANAGERS: &[(&str, &[&str])] = &[
    ("pm", &["pm", "path", "{}"]),
    ("dpkg", &["dpkg", "-s", "{}"]),
    ("rpm", &["rpm", "-q", "{}"]),
    ("pacman", &["pacman", "-Q", "{}"]),
];

/// [`PackageEvidence`] answered by the first package manager present.
#[derive(Debug, Clone)]
pub struct HostPackages {
    timeout: Duration,
}

impl HostPackages {
    /// Queries bounded by `timeout` each.
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PackageEvidence for HostPackages {
    async fn installed(&self, identifier: &str) -> Evidence<bool> {
        let mut reasons = Vec::new();
        for (manager, template) in MANAGERS {
            let argv: Vec<&str> = template
                .iter()
                .map(|arg| if *arg == "{}" { identifier } else { *arg })
                .collect();
            match execute(&argv, self.timeout).await {
                Execution::Completed { success, stdout } => {
                    // `pm path` exits 0 with empty output on some builds
                    let installed = success && (*manager != "pm" || !stdout.trim().is_empty());
                    debug!(manager, identifier, installed, "package query");
                    return Evidence::Known(installed);
                }
                Execution::Missing => {}
                other => reasons.push(format!("{manager}: {}", reason(&other))),
            }
        }
        if reasons.is_empty() {
            Evidence::unknown("no package manager found")
        } else {
            Evidence::unknown(reasons.join("; "))
        }
    }
}

fn reason(execution: &Execution) -> String {
    execution
        .clone()
        .into_evidence()
        .reason()
        .unwrap_or("query failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absurd_package_is_not_installed_or_unknown() {
        let packages = HostPackages::new(Duration::from_secs(5));
        let answer = packages.installed("hostward-test-no-such-package").await;
        assert_ne!(answer, Evidence::Known(true));
    }
}
