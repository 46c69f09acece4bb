//! System file and partition integrity.
//!
//! Every probe here reports progress per stage so callers can show where
//! a long scan is.

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, FallbackChain};
use hostward_core::{
    Category, Finding, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet, Result,
};

use crate::support::{absence_finding, conclude, file_number, inspect, present_paths};

/// Well-known locations of Android `su` binaries.
pub const SU_PATHS: &[&str] = &[
    "/system/bin/su",
    "/system/xbin/su",
    "/system/sbin/su",
    "/sbin/su",
    "/su/bin/su",
    "/system/su",
    "/system/bin/.ext/.su",
    "/system/usr/we-need-root/su-backup",
    "/system/app/Superuser.apk",
    "/data/local/su",
    "/data/local/bin/su",
    "/data/local/xbin/su",
    "/cache/su",
    "/dev/su",
];

/// Files and directories left behind by root managers.
pub const ROOT_ARTIFACTS: &[&str] = &[
    "/sbin/.magisk",
    "/data/adb/magisk",
    "/data/adb/magisk.db",
    "/data/adb/modules",
    "/cache/.disable_magisk",
    "/dev/.magisk.unblock",
    "/init.magisk.rc",
    "/data/adb/ksu",
    "/data/adb/ksud",
    "/system/app/SuperSU",
    "/system/xbin/daemonsu",
    "/system/etc/init.d/99SuperSUDaemon",
];

/// Partitions that must be mounted read-only.
pub const SYSTEM_MOUNTS: &[&str] = &["/system", "/vendor", "/system_root"];

/// Directories holding system executables.
pub const SYSTEM_BIN_PATHS: &[&str] = &[
    "/system/bin",
    "/system/xbin",
    "/vendor/bin",
    "/usr/bin",
    "/usr/sbin",
    "/bin",
    "/sbin",
];

/// Probe set for [`Category::Integrity`].
pub fn probe_set() -> Result<ProbeSet> {
    ProbeSet::builder(Category::Integrity)
        .probe(SuBinariesAbsent)
        .probe(RootArtifactsAbsent)
        .probe(SystemReadOnly)
        .probe(SystemPathsUnwritable)
        .probe(KernelUntainted)
        .build()
}

static SU_BINARIES_ABSENT: ProbeDescriptor = ProbeDescriptor::critical("su_binaries_absent", 0.30)
    .remediation("Remove su binaries and reflash the system image.");

/// No `su` binary in the usual places.
pub struct SuBinariesAbsent;

#[async_trait]
impl Probe for SuBinariesAbsent {
    fn descriptor(&self) -> &ProbeDescriptor {
        &SU_BINARIES_ABSENT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        ctx.report(SU_BINARIES_ABSENT.name, format!("scanning {} su locations", SU_PATHS.len()));
        let scan = present_paths(ctx, SU_PATHS).await;
        Ok(absence_finding(&SU_BINARIES_ABSENT, scan, SU_PATHS.len(), "su binaries"))
    }
}

static ROOT_ARTIFACTS_ABSENT: ProbeDescriptor =
    ProbeDescriptor::critical("root_artifacts_absent", 0.20)
        .remediation("Uninstall the root manager (Magisk, KernelSU, SuperSU) and wipe its data.");

/// No root-manager artefacts on disk.
pub struct RootArtifactsAbsent;

#[async_trait]
impl Probe for RootArtifactsAbsent {
    fn descriptor(&self) -> &ProbeDescriptor {
        &ROOT_ARTIFACTS_ABSENT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        ctx.report(
            ROOT_ARTIFACTS_ABSENT.name,
            format!("scanning {} root-manager artefacts", ROOT_ARTIFACTS.len()),
        );
        let scan = present_paths(ctx, ROOT_ARTIFACTS).await;
        Ok(absence_finding(
            &ROOT_ARTIFACTS_ABSENT,
            scan,
            ROOT_ARTIFACTS.len(),
            "root artefacts",
        ))
    }
}

static SYSTEM_READ_ONLY: ProbeDescriptor = ProbeDescriptor::critical("system_read_only", 0.25)
    .fail_open()
    .remediation("Remount system partitions read-only and verify they were not modified.");

/// System partitions are mounted read-only.
pub struct SystemReadOnly;

#[async_trait]
impl Probe for SystemReadOnly {
    fn descriptor(&self) -> &ProbeDescriptor {
        &SYSTEM_READ_ONLY
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        ctx.report(SYSTEM_READ_ONLY.name, "reading mount table");
        let resolution = FallbackChain::new("system read-only")
            .direct("/proc/mounts", async {
                ctx.read("/proc/mounts")
                    .await
                    .and_then(|table| system_mounts_read_only(&parse_proc_mounts(&table)))
            })
            .inferred("mount", async {
                ctx.command(&["mount"])
                    .await
                    .and_then(|table| system_mounts_read_only(&parse_mount_output(&table)))
            })
            .resolve()
            .await;

        Ok(conclude(
            &SYSTEM_READ_ONLY,
            resolution,
            "system partitions mounted read-only",
            "a system partition is mounted read-write",
        ))
    }
}

/// `(mount point, options)` pairs from `/proc/mounts`.
fn parse_proc_mounts(table: &str) -> Vec<(String, String)> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let _device = fields.next()?;
            let point = fields.next()?;
            let _fstype = fields.next()?;
            let options = fields.next()?;
            Some((point.to_string(), options.to_string()))
        })
        .collect()
}

/// `(mount point, options)` pairs from `mount` output
/// (`dev on /system type ext4 (ro,seclabel)`).
fn parse_mount_output(table: &str) -> Vec<(String, String)> {
    table
        .lines()
        .filter_map(|line| {
            let (_, rest) = line.split_once(" on ")?;
            let (point, rest) = rest.split_once(" type ")?;
            let options = rest.split_once('(')?.1.trim_end().trim_end_matches(')');
            Some((point.to_string(), options.to_string()))
        })
        .collect()
}

fn system_mounts_read_only(mounts: &[(String, String)]) -> Evidence<bool> {
    let relevant: Vec<_> = mounts
        .iter()
        .filter(|(point, _)| SYSTEM_MOUNTS.contains(&point.as_str()))
        .collect();
    if relevant.is_empty() {
        return Evidence::unknown("no system partitions mounted");
    }
    Evidence::Known(
        relevant
            .iter()
            .all(|(_, options)| options.split(',').any(|o| o == "ro")),
    )
}

static SYSTEM_PATHS_UNWRITABLE: ProbeDescriptor =
    ProbeDescriptor::supplementary("system_paths_unwritable", 0.15)
        .fail_open()
        .remediation("Restore permissions on system binary directories.");

/// System binary directories are not writable by the assessing process.
pub struct SystemPathsUnwritable;

#[async_trait]
impl Probe for SystemPathsUnwritable {
    fn descriptor(&self) -> &ProbeDescriptor {
        &SYSTEM_PATHS_UNWRITABLE
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let mut existing = 0;
        let mut writable = Vec::new();
        for (index, path) in SYSTEM_BIN_PATHS.iter().enumerate() {
            ctx.report(
                SYSTEM_PATHS_UNWRITABLE.name,
                format!("checking {path} ({}/{})", index + 1, SYSTEM_BIN_PATHS.len()),
            );
            if let Evidence::Known(facts) = inspect(ctx, path).await {
                if facts.exists {
                    existing += 1;
                    if facts.writable {
                        writable.push((*path).to_string());
                    }
                }
            }
        }

        if existing == 0 {
            return Ok(Finding::unresolved(
                SYSTEM_PATHS_UNWRITABLE.policy,
                "no system binary directory found",
            ));
        }
        if writable.is_empty() {
            return Ok(Finding::pass(format!(
                "{existing} system binary directories are read-only"
            )));
        }
        let mut finding = Finding::fail(format!("writable: {}", writable.join(", ")));
        for path in writable {
            finding = finding.with_detail("writable", path);
        }
        Ok(finding)
    }
}

static KERNEL_UNTAINTED: ProbeDescriptor = ProbeDescriptor::supplementary("kernel_untainted", 0.10)
    .fail_open()
    .remediation("Investigate out-of-tree or unsigned kernel modules.");

/// Kernel taint mask is clear.
pub struct KernelUntainted;

#[async_trait]
impl Probe for KernelUntainted {
    fn descriptor(&self) -> &ProbeDescriptor {
        &KERNEL_UNTAINTED
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        ctx.report(KERNEL_UNTAINTED.name, "reading kernel taint mask");
        Ok(match file_number(ctx, "/proc/sys/kernel/tainted").await {
            Evidence::Known(0) => Finding::pass("kernel untainted"),
            Evidence::Known(mask) => {
                Finding::fail(format!("kernel tainted (mask {mask})")).with_detail("mask", mask.to_string())
            }
            Evidence::Unknown(reason) => Finding::unresolved(KERNEL_UNTAINTED.policy, &reason),
        })
    }
}
