//! Verified boot and bootloader lock state.
//!
//! Android hosts answer through bootloader-provided properties; UEFI hosts
//! through efivars and the kernel's own enforcement switches.

use async_trait::async_trait;
use futures_util::FutureExt;
use hostward_core::evidence::{Evidence, FallbackChain};
use hostward_core::{
    Category, Finding, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet, Result,
};

use crate::support::{
    all_signals, cmdline_overrides, conclude, efi_flag, file_matches, file_number,
    property_matches,
};

/// Kernel command-line tokens that bypass normal boot hardening.
pub const DEBUG_OVERRIDES: &[&str] = &[
    "init=/bin/sh",
    "init=/bin/bash",
    "rd.break",
    "single",
    "systemd.debug-shell",
    "systemd.debug-shell=1",
    "androidboot.selinux=permissive",
    "selinux=0",
    "enforcing=0",
];

/// Probe set for [`Category::Bootloader`].
pub fn probe_set() -> Result<ProbeSet> {
    ProbeSet::builder(Category::Bootloader)
        .probe(VerifiedBoot)
        .probe(BootloaderLocked)
        .probe(ReleaseBuild)
        .probe(DebuggingDisabled)
        .probe(OemUnlockDisabled)
        .probe(BootArguments)
        .build()
}

static VERIFIED_BOOT: ProbeDescriptor = ProbeDescriptor::critical("verified_boot", 0.30)
    .remediation("Enable verified boot (Android AVB green state or UEFI Secure Boot).");

/// Boot chain is cryptographically verified.
pub struct VerifiedBoot;

#[async_trait]
impl Probe for VerifiedBoot {
    fn descriptor(&self) -> &ProbeDescriptor {
        &VERIFIED_BOOT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("verified boot")
            .direct(
                "ro.boot.verifiedbootstate",
                property_matches(
                    ctx,
                    "ro.boot.verifiedbootstate",
                    &["green"],
                    &["yellow", "orange", "red"],
                ),
            )
            .direct("efivar SecureBoot", async {
                efi_flag(ctx, "SecureBoot").await.map(|v| v == 1)
            })
            .inferred("mokutil", async {
                ctx.command(&["mokutil", "--sb-state"])
                    .await
                    .and_then(|out| {
                        let out = out.to_lowercase();
                        if out.contains("secureboot enabled") {
                            Evidence::Known(true)
                        } else if out.contains("secureboot disabled") {
                            Evidence::Known(false)
                        } else {
                            Evidence::unknown("unexpected mokutil output")
                        }
                    })
            })
            .resolve()
            .await;

        Ok(conclude(
            &VERIFIED_BOOT,
            resolution,
            "boot chain verified",
            "boot chain not verified",
        ))
    }
}

static BOOTLOADER_LOCKED: ProbeDescriptor = ProbeDescriptor::critical("bootloader_locked", 0.20)
    .remediation("Re-lock the bootloader or enrol platform keys so boot images cannot be replaced.");

/// Bootloader refuses unsigned images.
pub struct BootloaderLocked;

#[async_trait]
impl Probe for BootloaderLocked {
    fn descriptor(&self) -> &ProbeDescriptor {
        &BOOTLOADER_LOCKED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("bootloader locked")
            .direct(
                "ro.boot.flash.locked",
                property_matches(ctx, "ro.boot.flash.locked", &["1"], &["0"]),
            )
            .direct(
                "ro.boot.vbmeta.device_state",
                property_matches(ctx, "ro.boot.vbmeta.device_state", &["locked"], &["unlocked"]),
            )
            .direct("efivar SetupMode", async {
                efi_flag(ctx, "SetupMode").await.map(|v| v == 0)
            })
            .inferred(
                "ro.secureboot.lockstate",
                property_matches(ctx, "ro.secureboot.lockstate", &["locked"], &["unlocked"]),
            )
            .resolve()
            .await;

        Ok(conclude(
            &BOOTLOADER_LOCKED,
            resolution,
            "bootloader locked",
            "bootloader unlocked",
        ))
    }
}

static RELEASE_BUILD: ProbeDescriptor = ProbeDescriptor::critical("release_build", 0.15)
    .fail_open()
    .remediation("Run a release-signed build; test or development keys allow image substitution.");

/// Build is release-signed and enforces module signatures.
pub struct ReleaseBuild;

#[async_trait]
impl Probe for ReleaseBuild {
    fn descriptor(&self) -> &ProbeDescriptor {
        &RELEASE_BUILD
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let signals = vec![
            (
                "module.sig_enforce",
                file_matches(ctx, "/sys/module/module/parameters/sig_enforce", &["Y"], &["N"])
                    .boxed(),
            ),
            (
                "ro.build.tags",
                async {
                    ctx.property("ro.build.tags").await.and_then(|tags| {
                        if tags.contains("test-keys") || tags.contains("dev-keys") {
                            Evidence::Known(false)
                        } else if tags.contains("release-keys") {
                            Evidence::Known(true)
                        } else {
                            Evidence::unknown(format!("unrecognised build tags `{}`", tags.trim()))
                        }
                    })
                }
                .boxed(),
            ),
            (
                "ro.build.type",
                property_matches(ctx, "ro.build.type", &["user"], &["userdebug", "eng"]).boxed(),
            ),
        ];

        Ok(all_signals(&RELEASE_BUILD, signals, "release build", "test or development build").await)
    }
}

static DEBUGGING_DISABLED: ProbeDescriptor = ProbeDescriptor::critical("debugging_disabled", 0.15)
    .remediation("Disable debuggable builds and restrict ptrace (kernel.yama.ptrace_scope >= 1).");

/// Arbitrary processes cannot be debugged.
pub struct DebuggingDisabled;

#[async_trait]
impl Probe for DebuggingDisabled {
    fn descriptor(&self) -> &ProbeDescriptor {
        &DEBUGGING_DISABLED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let signals = vec![
            (
                "yama ptrace_scope",
                async {
                    file_number(ctx, "/proc/sys/kernel/yama/ptrace_scope")
                        .await
                        .map(|scope| scope >= 1)
                }
                .boxed(),
            ),
            (
                "ro.debuggable",
                property_matches(ctx, "ro.debuggable", &["0"], &["1"]).boxed(),
            ),
            (
                "ro.secure",
                property_matches(ctx, "ro.secure", &["1"], &["0"]).boxed(),
            ),
        ];

        Ok(all_signals(
            &DEBUGGING_DISABLED,
            signals,
            "debugging restricted",
            "debugging permitted",
        )
        .await)
    }
}

static OEM_UNLOCK_DISABLED: ProbeDescriptor =
    ProbeDescriptor::supplementary("oem_unlock_disabled", 0.10)
        .fail_open()
        .remediation("Turn off OEM unlocking or enable kernel lockdown.");

/// Bootloader cannot be unlocked from the running system.
pub struct OemUnlockDisabled;

#[async_trait]
impl Probe for OemUnlockDisabled {
    fn descriptor(&self) -> &ProbeDescriptor {
        &OEM_UNLOCK_DISABLED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("oem unlock disabled")
            .direct("kernel lockdown", async {
                ctx.read("/sys/kernel/security/lockdown")
                    .await
                    .and_then(|modes| lockdown_active(&modes))
            })
            .inferred(
                "sys.oem_unlock_allowed",
                property_matches(ctx, "sys.oem_unlock_allowed", &["0"], &["1"]),
            )
            .resolve()
            .await;

        Ok(conclude(
            &OEM_UNLOCK_DISABLED,
            resolution,
            "unlocking not permitted",
            "unlocking permitted",
        ))
    }
}

/// Parse `none [integrity] confidentiality`; the bracketed mode is active.
fn lockdown_active(modes: &str) -> Evidence<bool> {
    modes
        .split_whitespace()
        .find_map(|m| m.strip_prefix('[').and_then(|m| m.strip_suffix(']')))
        .map_or_else(
            || Evidence::unknown("no active lockdown mode"),
            |active| Evidence::Known(active != "none"),
        )
}

static BOOT_ARGUMENTS: ProbeDescriptor = ProbeDescriptor::supplementary("boot_arguments", 0.10)
    .fail_open()
    .remediation("Remove debug overrides from the kernel command line.");

/// Kernel command line carries no debug overrides.
pub struct BootArguments;

#[async_trait]
impl Probe for BootArguments {
    fn descriptor(&self) -> &ProbeDescriptor {
        &BOOT_ARGUMENTS
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        Ok(match cmdline_overrides(ctx, DEBUG_OVERRIDES).await {
            Evidence::Known(found) if found.is_empty() => {
                Finding::pass("kernel command line has no debug overrides")
            }
            Evidence::Known(found) => {
                let mut finding = Finding::fail(format!("debug overrides: {}", found.join(" ")));
                for token in found {
                    finding = finding.with_detail("override", token);
                }
                finding
            }
            Evidence::Unknown(reason) => Finding::unresolved(BOOT_ARGUMENTS.policy, &reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::testing::StaticSources;
    use hostward_core::{run_probe, Classification};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn set_builds() {
        let set = probe_set().unwrap();
        assert_eq!(set.len(), 6);
        let total: f64 = set.scorer().descriptors().iter().map(|d| d.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn lockdown_parsing() {
        assert_eq!(lockdown_active("none [integrity] confidentiality"), Evidence::Known(true));
        assert_eq!(lockdown_active("[none] integrity confidentiality"), Evidence::Known(false));
        assert!(!lockdown_active("").is_known());
    }

    #[tokio::test]
    async fn android_green_state_passes() {
        let ctx = StaticSources::new()
            .property("ro.boot.verifiedbootstate", "green")
            .context(Category::Bootloader);
        let outcome = run_probe(&VerifiedBoot, &ctx, TIMEOUT).await;
        assert!(outcome.passed);
        assert!(outcome.evidence.contains("via ro.boot.verifiedbootstate"));
    }

    #[tokio::test]
    async fn mokutil_is_consulted_last() {
        let ctx = StaticSources::new()
            .command("mokutil --sb-state", "SecureBoot disabled\n")
            .context(Category::Bootloader);
        let outcome = run_probe(&VerifiedBoot, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(outcome.evidence.contains("after 2 fallbacks"));
    }

    #[tokio::test]
    async fn test_keys_fail_release_build() {
        let ctx = StaticSources::new()
            .property("ro.build.tags", "test-keys")
            .context(Category::Bootloader);
        assert!(!run_probe(&ReleaseBuild, &ctx, TIMEOUT).await.passed);
    }

    #[tokio::test]
    async fn debuggable_build_fails() {
        let ctx = StaticSources::new()
            .property("ro.debuggable", "1")
            .property("ro.secure", "1")
            .context(Category::Bootloader);
        assert!(!run_probe(&DebuggingDisabled, &ctx, TIMEOUT).await.passed);
    }

    #[tokio::test]
    async fn restricted_ptrace_does_not_hide_a_debuggable_build() {
        let ctx = StaticSources::new()
            .content("/proc/sys/kernel/yama/ptrace_scope", "1\n")
            .property("ro.debuggable", "1")
            .context(Category::Bootloader);
        let outcome = run_probe(&DebuggingDisabled, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(!outcome.assumed);
        assert!(outcome.evidence.contains("via ro.debuggable"));
    }

    #[tokio::test]
    async fn restricted_ptrace_alone_passes() {
        let ctx = StaticSources::new()
            .content("/proc/sys/kernel/yama/ptrace_scope", "2\n")
            .context(Category::Bootloader);
        let outcome = run_probe(&DebuggingDisabled, &ctx, TIMEOUT).await;
        assert!(outcome.passed);
        assert!(!outcome.assumed);
        assert!(outcome.evidence.contains("via yama ptrace_scope"));
    }

    #[tokio::test]
    async fn module_signing_does_not_hide_test_keys() {
        for (key, value) in [("ro.build.tags", "test-keys"), ("ro.build.type", "eng")] {
            let ctx = StaticSources::new()
                .content("/sys/module/module/parameters/sig_enforce", "Y\n")
                .property(key, value)
                .context(Category::Bootloader);
            let outcome = run_probe(&ReleaseBuild, &ctx, TIMEOUT).await;
            assert!(!outcome.passed, "{key}={value}");
            assert!(outcome.evidence.contains(key));
        }
    }

    #[tokio::test]
    async fn single_user_boot_is_flagged() {
        let ctx = StaticSources::new()
            .content("/proc/cmdline", "BOOT_IMAGE=/vmlinuz root=/dev/sda1 single quiet")
            .context(Category::Bootloader);
        let outcome = run_probe(&BootArguments, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.details[0].value, "single");
    }

    #[tokio::test]
    async fn silent_host_fails_closed_probes_only() {
        let ctx = StaticSources::new().context(Category::Bootloader);
        let set = probe_set().unwrap();
        let mut outcomes = Vec::new();
        for probe in set.probes() {
            outcomes.push(run_probe(probe.as_ref(), &ctx, TIMEOUT).await);
        }
        assert!(!outcomes[0].passed, "verified_boot is fail-closed");
        assert!(outcomes[2].passed, "release_build is fail-open");
        assert!(outcomes.iter().all(|o| o.assumed));
        assert_eq!(set.scorer().score(&outcomes).classification, Classification::Failed);
    }
}
