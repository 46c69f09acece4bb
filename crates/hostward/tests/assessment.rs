//! End-to-end category runs against in-memory evidence.

use async_trait::async_trait;
use futures_util::StreamExt;
use hostward::{
    AssessmentConfig, AssessmentState, Category, Classification, Denylist, EvidenceError,
    Finding, Orchestrator, Phase, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet,
    SignatureEntry, BUDGET_EXHAUSTED, CANCELLED,
};
use hostward_core::testing::{MemoryKeyStore, StaticSources};
use std::sync::Arc;
use std::time::Duration;

/// Probe with a fixed verdict.
struct Fixed {
    descriptor: ProbeDescriptor,
    passed: bool,
}

#[async_trait]
impl Probe for Fixed {
    fn descriptor(&self) -> &ProbeDescriptor {
        &self.descriptor
    }

    async fn evaluate(&self, _ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        Ok(Finding::verdict(self.passed, "fixed"))
    }
}

/// Probe that never finishes on its own.
struct Hangs(ProbeDescriptor);

#[async_trait]
impl Probe for Hangs {
    fn descriptor(&self) -> &ProbeDescriptor {
        &self.0
    }

    async fn evaluate(&self, _ctx: &ProbeContext) -> Result<Finding, ProbeError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Finding::pass("woke up"))
    }
}

fn fixed(descriptor: ProbeDescriptor, passed: bool) -> Fixed {
    Fixed { descriptor, passed }
}

fn bootloader_set() -> ProbeSet {
    ProbeSet::builder(Category::Bootloader)
        .probe(fixed(ProbeDescriptor::critical("verified_boot", 0.30), true))
        .probe(fixed(ProbeDescriptor::critical("bootloader_locked", 0.25), true))
        .probe(fixed(ProbeDescriptor::critical("release_build", 0.15), true))
        .probe(fixed(ProbeDescriptor::critical("debugging_disabled", 0.10), true))
        .probe(fixed(ProbeDescriptor::supplementary("oem_unlock_disabled", 0.10), false))
        .probe(fixed(ProbeDescriptor::supplementary("boot_arguments", 0.10), false))
        .build()
        .unwrap()
}

fn denylist() -> Arc<Denylist> {
    Arc::new(
        Denylist::new(
            "test-1",
            vec![SignatureEntry::new("com.example.bad", "package")],
        )
        .unwrap(),
    )
}

fn config() -> AssessmentConfig {
    AssessmentConfig {
        enumeration_paths: vec!["/data/app".into()],
        ..AssessmentConfig::default()
    }
}

fn orchestrator(sources: StaticSources) -> Orchestrator {
    Orchestrator::builder()
        .sources(sources.build())
        .denylist(denylist())
        .config(config())
        .build()
        .unwrap()
}

#[tokio::test]
async fn supplementary_misses_leave_a_warning() {
    let orch = Orchestrator::builder()
        .sources(StaticSources::new().build())
        .probe_set(bootloader_set())
        .build()
        .unwrap();
    let result = orch.assess_to_completion(Category::Bootloader).await.unwrap();

    assert_eq!(result.score_percent, 80);
    assert_eq!(result.classification, Classification::Warning);
    assert!(result
        .passed_outcomes
        .iter()
        .all(|o| o.tier == hostward::Tier::Critical));
    assert_eq!(result.failed_outcomes.len(), 2);
}

#[tokio::test]
async fn provider_exception_is_recorded_without_leaking_keys() {
    let store = MemoryKeyStore::failing(EvidenceError::Provider("ProviderException".into()));
    let orch = orchestrator(StaticSources::new().keys(Arc::clone(&store)));
    let result = orch.assess_to_completion(Category::Tee).await.unwrap();

    let keystore = result.outcome("hardware_keystore").unwrap();
    assert!(!keystore.passed);
    assert!(keystore
        .error
        .as_deref()
        .is_some_and(|e| e.contains("ProviderException")));
    assert!(store.live_aliases().is_empty());
    assert_ne!(result.classification, Classification::Passed);
}

#[tokio::test]
async fn one_denylisted_entity_forces_failure() {
    let orch = orchestrator(
        StaticSources::new()
            .entities("/data/app", &["com.example.bad", "com.example.ok"])
            .content("/proc/self/maps", "7f00-7f10 r-xp 00000000 fd:00 1 /usr/lib/libc.so.6\n"),
    );
    let result = orch.assess_to_completion(Category::Tooling).await.unwrap();

    let entities = result.outcome("denylisted_entities").unwrap();
    assert!(!entities.passed);
    assert!(entities.veto);
    assert!(entities.details.iter().any(|d| d.value == "com.example.bad"));
    assert!(!entities.details.iter().any(|d| d.value == "com.example.ok"));
    assert_eq!(result.classification, Classification::Failed);
}

#[tokio::test]
async fn denied_property_still_yields_a_deterministic_outcome() {
    let sources = || {
        StaticSources::new()
            .unreadable("/sys/fs/selinux/enforce", "permission denied")
            .denied_property("ro.boot.selinux", "permission denied")
            .command("getenforce", "Enforcing\n")
    };
    let first = orchestrator(sources())
        .assess_to_completion(Category::Selinux)
        .await
        .unwrap();
    let second = orchestrator(sources())
        .assess_to_completion(Category::Selinux)
        .await
        .unwrap();

    let mac = first.outcome("mac_enforcing").unwrap();
    assert!(mac.passed);
    assert!(mac.error.is_none());
    assert!(mac.evidence.contains("getenforce"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn cancelling_mid_key_generation_leaves_no_alias() {
    let store = MemoryKeyStore::stalling(Duration::from_secs(30));
    let orch = Orchestrator::builder()
        .sources(StaticSources::new().keys(Arc::clone(&store)).build())
        .config(AssessmentConfig {
            probe_timeout_ms: 20_000,
            category_budget_ms: 30_000,
            ..AssessmentConfig::default()
        })
        .build()
        .unwrap();

    let mut stream = orch.assess(Category::Tee).unwrap();
    let first = stream.next().await.unwrap();
    assert_eq!(first.phase, Phase::Running);

    for _ in 0..200 {
        if !store.live_aliases().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(store.live_aliases().len(), 1);

    stream.cancel().await;
    assert!(store.live_aliases().is_empty());

    let rest: Vec<AssessmentState> = stream.collect().await;
    let terminal = rest.last().unwrap();
    assert!(terminal.is_terminal());
    let result = terminal.clone().into_result().unwrap();
    let keystore = result.outcome("hardware_keystore").unwrap();
    assert!(!keystore.passed);
    assert_eq!(keystore.error.as_deref(), Some(CANCELLED));
    assert_ne!(result.classification, Classification::Passed);
}

#[tokio::test]
async fn nothing_runs_until_polled() {
    let store = MemoryKeyStore::shared();
    let orch = orchestrator(StaticSources::new().keys(Arc::clone(&store)));

    let mut stream = orch.assess(Category::Tee).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stream.is_started());
    assert_eq!(store.created(), 0);

    stream.cancel().await;
    assert!(stream.next().await.is_none());
    assert_eq!(store.created(), 0);
}

#[tokio::test]
async fn exactly_one_terminal_and_nothing_after() {
    let orch = orchestrator(StaticSources::new());
    let mut stream = orch.assess(Category::Integrity).unwrap();

    let mut states = Vec::new();
    while let Some(state) = stream.next().await {
        states.push(state);
    }
    assert!(stream.next().await.is_none());

    let terminals = states.iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(states.last().unwrap().is_terminal());
    assert!(states.iter().any(|s| s.stage.is_some()));
    assert!(states[..states.len() - 1]
        .iter()
        .all(|s| s.phase == Phase::Running));
}

#[tokio::test]
async fn lane_scheduling_does_not_change_results() {
    let sources = || {
        StaticSources::new()
            .keys(MemoryKeyStore::with_hardware(true, true))
            .content("/dev/tpmrm0", "")
            .entities("/data/app", &["com.example.ok"])
    };
    let concurrent = orchestrator(sources()).assess_all().await.unwrap();
    let sequential = Orchestrator::builder()
        .sources(sources().build())
        .denylist(denylist())
        .config(AssessmentConfig {
            concurrent: false,
            ..config()
        })
        .build()
        .unwrap()
        .assess_all()
        .await
        .unwrap();

    assert_eq!(concurrent, sequential);
    let categories: Vec<Category> = concurrent.iter().map(|r| r.category).collect();
    assert_eq!(categories, Category::ALL.to_vec());
}

#[tokio::test]
async fn exhausted_budget_interrupts_remaining_probes() {
    let set = ProbeSet::builder(Category::Bootloader)
        .probe(Hangs(ProbeDescriptor::critical("first", 0.4).fail_open()))
        .probe(Hangs(ProbeDescriptor::critical("second", 0.3).fail_open()))
        .probe(fixed(ProbeDescriptor::supplementary("third", 0.3), true))
        .build()
        .unwrap();
    let orch = Orchestrator::builder()
        .sources(StaticSources::new().build())
        .probe_set(set)
        .config(AssessmentConfig {
            probe_timeout_ms: 300,
            category_budget_ms: 450,
            concurrent: false,
            ..AssessmentConfig::default()
        })
        .build()
        .unwrap();

    let result = orch.assess_to_completion(Category::Bootloader).await.unwrap();
    let first = result.outcome("first").unwrap();
    assert!(!first.passed);
    assert_eq!(first.error.as_deref(), Some("timed out after 300ms"));
    for name in ["second", "third"] {
        let outcome = result.outcome(name).unwrap();
        assert!(!outcome.passed, "{name} passed");
        assert_eq!(outcome.error.as_deref(), Some(BUDGET_EXHAUSTED));
    }
    assert_eq!(result.classification, Classification::Failed);
}

#[tokio::test]
async fn pacing_never_outlasts_the_budget() {
    let set = ProbeSet::builder(Category::Network)
        .probe(fixed(ProbeDescriptor::critical("first", 0.5), true))
        .probe(Hangs(ProbeDescriptor::supplementary("second", 0.5)))
        .build()
        .unwrap();
    let orch = Orchestrator::builder()
        .sources(StaticSources::new().build())
        .probe_set(set)
        .config(AssessmentConfig {
            probe_timeout_ms: 300,
            category_budget_ms: 300,
            pacing_ms: 30_000,
            concurrent: false,
            ..AssessmentConfig::default()
        })
        .build()
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orch.assess_to_completion(Category::Network),
    )
    .await
    .expect("pacing held the run past its budget")
    .unwrap();

    assert!(result.outcome("first").unwrap().passed);
    let second = result.outcome("second").unwrap();
    assert!(!second.passed);
    assert!(second.error.is_some());
}
