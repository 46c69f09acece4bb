//! Mandatory access control state (SELinux, with AppArmor as the
//! equivalent on hosts that do not run SELinux).

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, FallbackChain};
use hostward_core::{
    Category, Finding, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet, Result,
};

use crate::support::{cmdline_overrides, conclude, file_matches, inspect, property_matches};

const ENFORCE: &str = "/sys/fs/selinux/enforce";
const POLICYVERS: &str = "/sys/fs/selinux/policyvers";
const APPARMOR_ENABLED: &str = "/sys/module/apparmor/parameters/enabled";
const APPARMOR_PROFILES: &str = "/sys/kernel/security/apparmor/profiles";

/// Kernel command-line tokens that switch MAC off or to permissive.
pub const MAC_OVERRIDES: &[&str] = &[
    "selinux=0",
    "enforcing=0",
    "apparmor=0",
    "security=none",
    "androidboot.selinux=permissive",
];

/// Probe set for [`Category::Selinux`].
pub fn probe_set() -> Result<ProbeSet> {
    ProbeSet::builder(Category::Selinux)
        .probe(MacEnforcing)
        .probe(PolicyLoaded)
        .probe(BootOverridesAbsent)
        .probe(EnforceNodeProtected)
        .build()
}

static MAC_ENFORCING: ProbeDescriptor = ProbeDescriptor::critical("mac_enforcing", 0.50)
    .remediation("Switch SELinux to enforcing mode (or enable AppArmor).");

/// Mandatory access control is enforcing.
pub struct MacEnforcing;

#[async_trait]
impl Probe for MacEnforcing {
    fn descriptor(&self) -> &ProbeDescriptor {
        &MAC_ENFORCING
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("mac enforcing")
            .direct("selinuxfs", file_matches(ctx, ENFORCE, &["1"], &["0"]))
            .direct(
                "apparmor module",
                file_matches(ctx, APPARMOR_ENABLED, &["Y"], &["N"]),
            )
            .inferred(
                "ro.boot.selinux",
                property_matches(ctx, "ro.boot.selinux", &["enforcing"], &["permissive", "disabled"]),
            )
            .inferred("getenforce", async {
                ctx.command(&["getenforce"]).await.and_then(|mode| {
                    match mode.trim().to_lowercase().as_str() {
                        "enforcing" => Evidence::Known(true),
                        "permissive" | "disabled" => Evidence::Known(false),
                        other => Evidence::unknown(format!("unexpected getenforce output `{other}`")),
                    }
                })
            })
            .resolve()
            .await;

        Ok(conclude(&MAC_ENFORCING, resolution, "enforcing", "not enforcing"))
    }
}

static POLICY_LOADED: ProbeDescriptor = ProbeDescriptor::critical("policy_loaded", 0.20)
    .remediation("Load a MAC policy at boot.");

/// A MAC policy is loaded.
pub struct PolicyLoaded;

#[async_trait]
impl Probe for PolicyLoaded {
    fn descriptor(&self) -> &ProbeDescriptor {
        &POLICY_LOADED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("policy loaded")
            .direct("selinux policyvers", async {
                ctx.read(POLICYVERS).await.map(|v| v.trim().parse::<u32>().is_ok())
            })
            .direct("apparmor profiles", async {
                ctx.read(APPARMOR_PROFILES).await.map(|p| !p.trim().is_empty())
            })
            .resolve()
            .await;

        Ok(conclude(&POLICY_LOADED, resolution, "policy loaded", "no policy loaded"))
    }
}

static BOOT_OVERRIDES_ABSENT: ProbeDescriptor =
    ProbeDescriptor::supplementary("boot_overrides_absent", 0.15)
        .fail_open()
        .remediation("Remove MAC overrides such as `selinux=0` from the kernel command line.");

/// MAC was not disabled from the bootloader.
pub struct BootOverridesAbsent;

#[async_trait]
impl Probe for BootOverridesAbsent {
    fn descriptor(&self) -> &ProbeDescriptor {
        &BOOT_OVERRIDES_ABSENT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(match cmdline_overrides(ctx, MAC_OVERRIDES).await {
            Evidence::Known(found) if found.is_empty() => Finding::pass("no MAC overrides at boot"),
            Evidence::Known(found) => Finding::fail(format!("MAC overrides: {}", found.join(" "))),
            Evidence::Unknown(reason) => Finding::unresolved(BOOT_OVERRIDES_ABSENT.policy, &reason),
        })
    }
}

static ENFORCE_NODE_PROTECTED: ProbeDescriptor =
    ProbeDescriptor::supplementary("enforce_node_protected", 0.15)
        .fail_open()
        .remediation("Do not run with privileges that can toggle SELinux enforcement.");

/// The assessing process cannot toggle enforcement.
pub struct EnforceNodeProtected;

#[async_trait]
impl Probe for EnforceNodeProtected {
    fn descriptor(&self) -> &ProbeDescriptor {
        &ENFORCE_NODE_PROTECTED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let fact = inspect(ctx, ENFORCE).await.and_then(|facts| {
            if facts.exists {
                Evidence::Known(!facts.writable)
            } else {
                Evidence::unknown("selinuxfs not mounted")
            }
        });
        Ok(match fact {
            Evidence::Known(true) => Finding::pass("enforce node is read-only to this process"),
            Evidence::Known(false) => Finding::fail("enforce node is writable by this process"),
            Evidence::Unknown(reason) => {
                Finding::unresolved(ENFORCE_NODE_PROTECTED.policy, &reason)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::evidence::FileFacts;
    use hostward_core::run_probe;
    use hostward_core::testing::StaticSources;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn sysfs_enforcing_passes() {
        let ctx = StaticSources::new()
            .content(ENFORCE, "1")
            .context(Category::Selinux);
        let outcome = run_probe(&MacEnforcing, &ctx, TIMEOUT).await;
        assert!(outcome.passed);
        assert!(!outcome.assumed);
    }

    #[tokio::test]
    async fn denied_property_falls_back_to_getenforce() {
        let ctx = StaticSources::new()
            .unreadable(ENFORCE, "permission denied")
            .denied_property("ro.boot.selinux", "permission denied")
            .command("getenforce", "Permissive\n")
            .context(Category::Selinux);
        let outcome = run_probe(&MacEnforcing, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(outcome.error.is_none());
        assert!(outcome.evidence.contains("via getenforce after 3 fallbacks"));
    }

    #[tokio::test]
    async fn apparmor_counts_as_mac() {
        let ctx = StaticSources::new()
            .content(APPARMOR_ENABLED, "Y\n")
            .content(APPARMOR_PROFILES, "/usr/bin/man (enforce)\n")
            .context(Category::Selinux);
        assert!(run_probe(&MacEnforcing, &ctx, TIMEOUT).await.passed);
        assert!(run_probe(&PolicyLoaded, &ctx, TIMEOUT).await.passed);
    }

    #[tokio::test]
    async fn selinux_zero_on_cmdline_fails() {
        let ctx = StaticSources::new()
            .content("/proc/cmdline", "root=/dev/vda selinux=0")
            .context(Category::Selinux);
        assert!(!run_probe(&BootOverridesAbsent, &ctx, TIMEOUT).await.passed);
    }

    #[tokio::test]
    async fn writable_enforce_node_fails() {
        let ctx = StaticSources::new()
            .file(
                ENFORCE,
                FileFacts {
                    exists: true,
                    readable: true,
                    writable: true,
                    size_bytes: 1,
                },
            )
            .context(Category::Selinux);
        assert!(!run_probe(&EnforceNodeProtected, &ctx, TIMEOUT).await.passed);
    }
}
