//! Shared evidence helpers for the probe sets.

use futures_util::future::BoxFuture;
use hostward_core::evidence::{Evidence, Fact, FileFacts, Resolution};
use hostward_core::{Finding, ProbeContext, ProbeDescriptor};

/// Kernel command line.
pub const CMDLINE: &str = "/proc/cmdline";

/// UEFI global variable vendor GUID.
const EFI_GLOBAL: &str = "8be4df61-93ca-11d2-aa0d-00e098032b8c";

/// Turn a resolved fact into a finding.
///
/// `Unknown` is handed to the descriptor's failure policy.
pub fn conclude(
    descriptor: &ProbeDescriptor,
    resolution: Resolution<bool>,
    satisfied: &str,
    violated: &str,
) -> Finding {
    let provenance = resolution.provenance();
    let source = resolution.answered_by.unwrap_or("none");
    match resolution.evidence {
        Evidence::Known(true) => {
            Finding::pass(format!("{satisfied} ({provenance})")).with_detail("source", source)
        }
        Evidence::Known(false) => {
            Finding::fail(format!("{violated} ({provenance})")).with_detail("source", source)
        }
        Evidence::Unknown(reason) => Finding::unresolved(descriptor.policy, &reason),
    }
}

/// Independent signals that must all hold.
///
/// Every signal is consulted. Any violated signal fails the finding; the
/// descriptor's failure policy applies only when no signal answered.
pub async fn all_signals(
    descriptor: &ProbeDescriptor,
    signals: Vec<(&'static str, BoxFuture<'_, Fact>)>,
    satisfied: &str,
    violated: &str,
) -> Finding {
    let mut held = Vec::new();
    let mut broken = Vec::new();
    let mut unknown = Vec::new();
    for (name, signal) in signals {
        match signal.await {
            Evidence::Known(true) => held.push(name),
            Evidence::Known(false) => broken.push(name),
            Evidence::Unknown(reason) => unknown.push(format!("{name}: {reason}")),
        }
    }

    if !broken.is_empty() {
        let mut finding = Finding::fail(format!("{violated} (via {})", broken.join(", ")));
        for name in broken {
            finding = finding.with_detail("violated", name);
        }
        return finding;
    }
    if held.is_empty() {
        let reason = if unknown.is_empty() {
            String::from("no signal configured")
        } else {
            unknown.join("; ")
        };
        return Finding::unresolved(descriptor.policy, &reason);
    }
    let mut finding = Finding::pass(format!("{satisfied} (via {})", held.join(", ")));
    for name in held {
        finding = finding.with_detail("source", name);
    }
    finding
}

/// Property compared against accepted and rejected values.
///
/// Values in neither list are `Unknown`.
pub async fn property_matches(
    ctx: &ProbeContext,
    key: &str,
    accepted: &[&str],
    rejected: &[&str],
) -> Fact {
    ctx.property(key)
        .await
        .and_then(|value| classify(key, value.trim(), accepted, rejected))
}

/// File content compared against accepted and rejected values.
pub async fn file_matches(
    ctx: &ProbeContext,
    path: &str,
    accepted: &[&str],
    rejected: &[&str],
) -> Fact {
    ctx.read(path)
        .await
        .and_then(|text| classify(path, text.trim(), accepted, rejected))
}

fn classify(what: &str, value: &str, accepted: &[&str], rejected: &[&str]) -> Fact {
    if accepted.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        Evidence::Known(true)
    } else if rejected.iter().any(|r| r.eq_ignore_ascii_case(value)) {
        Evidence::Known(false)
    } else {
        Evidence::unknown(format!("unrecognised value `{value}` for {what}"))
    }
}

/// Integer file content, e.g. a sysctl.
pub async fn file_number(ctx: &ProbeContext, path: &str) -> Evidence<u64> {
    ctx.read(path).await.and_then(|text| {
        text.trim()
            .parse::<u64>()
            .map_or_else(|_| Evidence::unknown(format!("{path} is not a number")), Evidence::Known)
    })
}

/// Value byte of a UEFI global variable (`SecureBoot`, `SetupMode`).
///
/// efivarfs prefixes the payload with four attribute bytes.
pub async fn efi_flag(ctx: &ProbeContext, name: &str) -> Evidence<u8> {
    let path = format!("/sys/firmware/efi/efivars/{name}-{EFI_GLOBAL}");
    ctx.read(&path).await.and_then(|raw| {
        raw.as_bytes()
            .get(4)
            .copied()
            .map_or_else(|| Evidence::unknown(format!("{name} efivar truncated")), Evidence::Known)
    })
}

/// Metadata for `path`.
pub async fn inspect(ctx: &ProbeContext, path: &str) -> Evidence<FileFacts> {
    ctx.sources().files.inspect(path).await
}

/// Command-line tokens from `overrides` present on the kernel command line.
pub async fn cmdline_overrides(ctx: &ProbeContext, overrides: &[&str]) -> Evidence<Vec<String>> {
    ctx.read(CMDLINE).await.map(|cmdline| {
        cmdline
            .split_whitespace()
            .filter(|token| overrides.contains(token))
            .map(str::to_string)
            .collect()
    })
}

/// Which of `paths` exist.
///
/// `Known` only if every path could be inspected or at least one was found.
pub async fn present_paths(ctx: &ProbeContext, paths: &[&str]) -> Evidence<Vec<String>> {
    let mut found = Vec::new();
    let mut unknown = Vec::new();
    for path in paths {
        match inspect(ctx, path).await {
            Evidence::Known(facts) if facts.exists => found.push((*path).to_string()),
            Evidence::Known(_) => {}
            Evidence::Unknown(reason) => unknown.push(format!("{path}: {reason}")),
        }
    }
    if found.is_empty() && !unknown.is_empty() {
        Evidence::unknown(unknown.join("; "))
    } else {
        Evidence::Known(found)
    }
}

/// Finding for a presence-of-risk scan: passes when nothing was found.
pub fn absence_finding(
    descriptor: &ProbeDescriptor,
    scan: Evidence<Vec<String>>,
    checked: usize,
    what: &str,
) -> Finding {
    match scan {
        Evidence::Known(found) if found.is_empty() => {
            Finding::pass(format!("no {what} in {checked} location(s)"))
        }
        Evidence::Known(found) => {
            let mut finding = Finding::fail(format!("{what} found: {}", found.join(", ")));
            for path in found {
                finding = finding.with_detail("found", path);
            }
            finding
        }
        Evidence::Unknown(reason) => Finding::unresolved(descriptor.policy, &reason),
    }
}
