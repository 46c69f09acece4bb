//! The probe boundary.
//!
//! Nothing a probe does escapes [`run_probe`]: errors and panics become
//! outcomes resolved by the probe's failure policy, overruns become
//! non-passing outcomes, and stateful probes have their keys swept on
//! every exit path.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::context::ProbeContext;
use crate::error::ProbeError;
use crate::probe::{Probe, ProbeOutcome};

/// Run one probe to a well-formed outcome within `timeout`.
pub async fn run_probe(probe: &dyn Probe, ctx: &ProbeContext, timeout: Duration) -> ProbeOutcome {
    let descriptor = probe.descriptor();
    let evaluation = AssertUnwindSafe(probe.evaluate(ctx)).catch_unwind();

    let outcome = match tokio::time::timeout(timeout, evaluation).await {
        Ok(Ok(Ok(finding))) => {
            debug!(probe = descriptor.name, passed = finding.passed, "probe finished");
            ProbeOutcome::from_finding(descriptor, finding)
        }
        Ok(Ok(Err(error))) => {
            warn!(probe = descriptor.name, %error, policy = descriptor.policy.label(), "probe fault");
            ProbeOutcome::faulted(descriptor, &error)
        }
        Ok(Err(payload)) => {
            let error = ProbeError::Panicked(panic_message(payload.as_ref()));
            warn!(probe = descriptor.name, %error, policy = descriptor.policy.label(), "probe panicked");
            ProbeOutcome::faulted(descriptor, &error)
        }
        Err(_) => {
            warn!(probe = descriptor.name, timeout_ms = timeout.as_millis(), "probe timed out");
            ProbeOutcome::interrupted(
                descriptor,
                &format!("timed out after {}ms", timeout.as_millis()),
            )
        }
    };

    if descriptor.is_stateful() {
        let swept = ctx.keys().sweep_probe(descriptor.name).await;
        if swept > 0 {
            debug!(probe = descriptor.name, swept, "cleaned up after probe");
        }
    }

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvidenceError;
    use crate::evidence::KeySpec;
    use crate::probe::{Finding, ProbeDescriptor};
    use crate::testing::{MemoryKeyStore, StaticSources};
    use crate::Category;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Panics(ProbeDescriptor);

    #[async_trait]
    impl Probe for Panics {
        fn descriptor(&self) -> &ProbeDescriptor {
            &self.0
        }

        async fn evaluate(&self, _ctx: &ProbeContext) -> Result<Finding, ProbeError> {
            panic!("index out of bounds");
        }
    }

    struct Sleeps(ProbeDescriptor);

    #[async_trait]
    impl Probe for Sleeps {
        fn descriptor(&self) -> &ProbeDescriptor {
            &self.0
        }

        async fn evaluate(&self, _ctx: &ProbeContext) -> Result<Finding, ProbeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Finding::pass("never"))
        }
    }

    struct LeaksKey(ProbeDescriptor);

    #[async_trait]
    impl Probe for LeaksKey {
        fn descriptor(&self) -> &ProbeDescriptor {
            &self.0
        }

        async fn evaluate(&self, ctx: &ProbeContext) -> Result<Finding, ProbeError> {
            let _key = ctx.keys().create(self.0.name, &KeySpec::ec_p256()).await?;
            Err(ProbeError::Malformed("attestation chain unreadable".into()))
        }
    }

    fn ctx(store: Arc<MemoryKeyStore>) -> ProbeContext {
        StaticSources::new().keys(store).context(Category::Tee)
    }

    #[tokio::test]
    async fn panics_become_policy_outcomes() {
        let probe = Panics(ProbeDescriptor::critical("panics", 1.0).fail_open());
        let outcome = run_probe(&probe, &ctx(MemoryKeyStore::shared()), Duration::from_secs(1)).await;
        assert!(outcome.passed);
        assert_eq!(
            outcome.error.as_deref(),
            Some("probe panicked: index out of bounds")
        );
    }

    #[tokio::test]
    async fn timeouts_never_pass() {
        let probe = Sleeps(ProbeDescriptor::supplementary("slow", 1.0).fail_open());
        let outcome =
            run_probe(&probe, &ctx(MemoryKeyStore::shared()), Duration::from_millis(250)).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.error.as_deref(), Some("timed out after 250ms"));
    }

    #[tokio::test]
    async fn keys_are_swept_after_faults() {
        let store = MemoryKeyStore::shared();
        let probe = LeaksKey(ProbeDescriptor::critical("leaky", 1.0).resource("keystore"));
        let outcome = run_probe(&probe, &ctx(Arc::clone(&store)), Duration::from_secs(1)).await;

        assert!(!outcome.passed);
        assert!(outcome.error.is_some());
        assert_eq!(store.created(), 1);
        assert!(store.live_aliases().is_empty());
    }

    #[tokio::test]
    async fn provider_failures_surface_as_errors() {
        let store = MemoryKeyStore::failing(EvidenceError::Provider("ProviderException".into()));
        let probe = LeaksKey(ProbeDescriptor::critical("broken", 1.0).resource("keystore"));
        let outcome = run_probe(&probe, &ctx(Arc::clone(&store)), Duration::from_secs(1)).await;

        assert!(!outcome.passed);
        assert_eq!(
            outcome.error.as_deref(),
            Some("key store error: provider error: ProviderException")
        );
        assert!(store.live_aliases().is_empty());
    }
}
