//! Known dangerous tooling, detected by signature matching.
//!
//! The two signature probes veto: a single hit keeps the category from
//! passing no matter what else passes.

use async_trait::async_trait;
use hostward_core::evidence::Evidence;
use hostward_core::{
    Category, Denylist, Finding, MatchPass, MatchReport, Probe, ProbeContext, ProbeDescriptor,
    ProbeError, ProbeSet, Result,
};
use std::sync::Arc;
use tracing::debug;

use crate::ProbeOptions;

/// Denylist class matched through package presence.
pub const PACKAGE_CLASS: &str = "package";

/// Substrings of mapped objects that reveal an injected hooking framework.
pub const HOOKING_MARKERS: &[&str] = &["frida", "xposed", "substrate", "lsposed", "edxposed"];

/// Probe set for [`Category::Tooling`].
pub fn probe_set(denylist: &Arc<Denylist>, options: &ProbeOptions) -> Result<ProbeSet> {
    ProbeSet::builder(Category::Tooling)
        .probe(DenylistedEntities::new(
            Arc::clone(denylist),
            options.enumeration_paths.clone(),
        ))
        .probe(DenylistedPackages::new(Arc::clone(denylist)))
        .probe(HookingArtifacts)
        .build()
}

fn match_finding(report: MatchReport, checked: &str) -> Finding {
    if !report.any_match {
        return Finding::pass(format!("no denylisted entity among {checked}"));
    }
    let names: Vec<&str> = report.matched.iter().map(|e| e.identifier.as_str()).collect();
    let mut finding = Finding::fail(format!("denylisted: {}", names.join(", ")));
    for entry in &report.matched {
        finding = finding.with_detail(entry.category.clone(), entry.identifier.clone());
    }
    finding
}

static DENYLISTED_ENTITIES: ProbeDescriptor =
    ProbeDescriptor::critical("denylisted_entities", 0.50)
        .veto()
        .remediation("Remove the denylisted tools and treat the host as compromised until reinstalled.");

/// No denylisted entity under the enumeration paths.
pub struct DenylistedEntities {
    denylist: Arc<Denylist>,
    paths: Vec<String>,
}

impl DenylistedEntities {
    /// Matcher over `paths`.
    pub fn new(denylist: Arc<Denylist>, paths: Vec<String>) -> Self {
        Self { denylist, paths }
    }
}

#[async_trait]
impl Probe for DenylistedEntities {
    fn descriptor(&self) -> &ProbeDescriptor {
        &DENYLISTED_ENTITIES
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let mut pass = MatchPass::new();
        let mut enumerated = 0;
        let mut failures = Vec::new();

        for (index, base) in self.paths.iter().enumerate() {
            ctx.report(
                DENYLISTED_ENTITIES.name,
                format!("enumerating {base} ({}/{})", index + 1, self.paths.len()),
            );
            match ctx.sources().entities.enumerate(base).await {
                Evidence::Known(names) => {
                    debug!(path = %base, entries = names.len(), "enumerated");
                    enumerated += 1;
                    pass.observe(names);
                }
                Evidence::Unknown(reason) => failures.push(format!("{base}: {reason}")),
            }
        }

        if enumerated == 0 {
            let reason = if failures.is_empty() {
                String::from("no enumeration path configured")
            } else {
                failures.join("; ")
            };
            return Ok(Finding::unresolved(DENYLISTED_ENTITIES.policy, &reason));
        }

        let checked = format!("{} entities in {enumerated} path(s)", pass.observed());
        Ok(match_finding(pass.finish(self.denylist.entries()), &checked)
            .with_detail("denylist", self.denylist.version().to_string()))
    }
}

static DENYLISTED_PACKAGES: ProbeDescriptor =
    ProbeDescriptor::critical("denylisted_packages", 0.30)
        .veto()
        .remediation("Uninstall the denylisted applications.");

/// No denylisted package is installed.
pub struct DenylistedPackages {
    denylist: Arc<Denylist>,
}

impl DenylistedPackages {
    /// Matcher over the `package` class of `denylist`.
    pub fn new(denylist: Arc<Denylist>) -> Self {
        Self { denylist }
    }
}

#[async_trait]
impl Probe for DenylistedPackages {
    fn descriptor(&self) -> &ProbeDescriptor {
        &DENYLISTED_PACKAGES
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let candidates: Vec<_> = self.denylist.in_category(PACKAGE_CLASS).cloned().collect();
        if candidates.is_empty() {
            return Ok(Finding::pass("denylist has no package signatures"));
        }

        let mut pass = MatchPass::new();
        let mut answered = 0;
        let mut last_reason = String::new();
        for entry in &candidates {
            match ctx.sources().packages.installed(&entry.identifier).await {
                Evidence::Known(installed) => {
                    answered += 1;
                    if installed {
                        pass.observe([entry.identifier.clone()]);
                    }
                }
                Evidence::Unknown(reason) => last_reason = reason,
            }
        }

        if answered == 0 {
            return Ok(Finding::unresolved(DENYLISTED_PACKAGES.policy, &last_reason));
        }
        let checked = format!("{answered} package signature(s)");
        Ok(match_finding(pass.finish(&candidates), &checked))
    }
}

static HOOKING_ARTIFACTS: ProbeDescriptor = ProbeDescriptor::supplementary("hooking_artifacts", 0.20)
    .remediation("Terminate the instrumentation framework injected into this process.");

/// No hooking framework is mapped into the assessing process.
pub struct HookingArtifacts;

#[async_trait]
impl Probe for HookingArtifacts {
    fn descriptor(&self) -> &ProbeDescriptor {
        &HOOKING_ARTIFACTS
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let maps = match ctx.read("/proc/self/maps").await {
            Evidence::Known(maps) => maps.to_lowercase(),
            Evidence::Unknown(reason) => {
                return Ok(Finding::unresolved(HOOKING_ARTIFACTS.policy, &reason))
            }
        };
        let found: Vec<&str> = HOOKING_MARKERS
            .iter()
            .copied()
            .filter(|marker| maps.contains(marker))
            .collect();
        Ok(if found.is_empty() {
            Finding::pass("no hooking framework mapped")
        } else {
            Finding::fail(format!("hooking framework mapped: {}", found.join(", ")))
        })
    }
}
