//! Trusted execution environment and hardware-backed key storage.
//!
//! The key probes are stateful: they create a real key and share the
//! `keystore` resource, so they always run one after the other.

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, FallbackChain, KeySpec};
use hostward_core::{
    Category, EvidenceError, Finding, Probe, ProbeContext, ProbeDescriptor, ProbeError, ProbeSet,
    Result,
};
use tracing::warn;

use crate::support::{conclude, file_number, present_paths};

/// Device nodes exposed by TEE drivers and TPMs.
pub const TEE_NODES: &[&str] = &[
    "/dev/tee0",
    "/dev/teepriv0",
    "/dev/trusty-ipc-dev0",
    "/dev/qseecom",
    "/dev/tpmrm0",
    "/dev/tpm0",
];

const KEYSTORE: &str = "keystore";

/// First API level that mandates hardware key attestation.
const ATTESTATION_API_LEVEL: u64 = 26;

/// Probe set for [`Category::Tee`].
pub fn probe_set() -> Result<ProbeSet> {
    ProbeSet::builder(Category::Tee)
        .probe(HardwareKeystore)
        .probe(TeeDevice)
        .probe(Strongbox)
        .probe(AttestationSupport)
        .build()
}

static HARDWARE_KEYSTORE: ProbeDescriptor = ProbeDescriptor::critical("hardware_keystore", 0.40)
    .resource(KEYSTORE)
    .remediation("Use a device whose key store keeps key material inside secure hardware.");

/// Keys are generated inside secure hardware.
pub struct HardwareKeystore;

#[async_trait]
impl Probe for HardwareKeystore {
    fn descriptor(&self) -> &ProbeDescriptor {
        &HARDWARE_KEYSTORE
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let key = match ctx.keys().create(HARDWARE_KEYSTORE.name, &KeySpec::ec_p256()).await {
            Ok(key) => key,
            Err(e @ EvidenceError::Provider(_)) => return Err(e.into()),
            Err(e) => return Ok(Finding::unresolved(HARDWARE_KEYSTORE.policy, &e.to_string())),
        };

        let attestation = key.attestation;
        let alias = key.alias.clone();
        if let Err(e) = key.release().await {
            warn!(%alias, error = %e, "could not delete keystore probe key");
        }

        Ok(Finding::verdict(
            attestation.inside_secure_hardware,
            if attestation.inside_secure_hardware {
                "test key generated inside secure hardware"
            } else {
                "test key generated in software"
            },
        )
        .with_detail("secure_hardware", attestation.inside_secure_hardware.to_string()))
    }
}

static TEE_DEVICE: ProbeDescriptor = ProbeDescriptor::critical("tee_device", 0.25)
    .fail_open()
    .remediation("Enable the TEE or TPM driver so secure-world services are reachable.");

/// A TEE or TPM is exposed to the system.
pub struct TeeDevice;

#[async_trait]
impl Probe for TeeDevice {
    fn descriptor(&self) -> &ProbeDescriptor {
        &TEE_DEVICE
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("tee device")
            .direct("device nodes", async {
                // Nodes may be hidden by sandboxing, so absence is not proof.
                match present_paths(ctx, TEE_NODES).await {
                    Evidence::Known(found) if !found.is_empty() => Evidence::Known(true),
                    Evidence::Known(_) => Evidence::unknown("no TEE device node visible"),
                    Evidence::Unknown(reason) => Evidence::Unknown(reason),
                }
            })
            .inferred("ro.hardware.keystore", async {
                ctx.property("ro.hardware.keystore").await.and_then(|hal| {
                    if hal.trim().is_empty() {
                        Evidence::unknown("empty keystore HAL name")
                    } else {
                        Evidence::Known(true)
                    }
                })
            })
            .resolve()
            .await;

        Ok(conclude(
            &TEE_DEVICE,
            resolution,
            "secure environment present",
            "no secure environment",
        ))
    }
}

static STRONGBOX: ProbeDescriptor = ProbeDescriptor::supplementary("strongbox", 0.20)
    .resource(KEYSTORE)
    .remediation("Prefer hardware with a dedicated secure element (StrongBox).");

/// A dedicated secure element backs keys on request.
pub struct Strongbox;

#[async_trait]
impl Probe for Strongbox {
    fn descriptor(&self) -> &ProbeDescriptor {
        &STRONGBOX
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let key = match ctx
            .keys()
            .create(STRONGBOX.name, &KeySpec::strongbox_ec_p256())
            .await
        {
            Ok(key) => key,
            Err(EvidenceError::Unavailable(reason)) => {
                return Ok(Finding::fail(format!("no secure element: {reason}")));
            }
            Err(e) => return Err(e.into()),
        };

        let backed = key.attestation.strongbox_backed;
        let alias = key.alias.clone();
        if let Err(e) = key.release().await {
            warn!(%alias, error = %e, "could not delete strongbox probe key");
        }

        Ok(Finding::verdict(
            backed,
            if backed {
                "test key stored in secure element"
            } else {
                "secure element request fell back to TEE"
            },
        )
        .with_detail("strongbox_backed", backed.to_string()))
    }
}

static ATTESTATION_SUPPORT: ProbeDescriptor =
    ProbeDescriptor::supplementary("attestation_support", 0.15)
        .fail_open()
        .remediation("Use hardware that supports remote key attestation (TPM 2.0 or API level 26+).");

/// Platform can attest its keys to a remote party.
pub struct AttestationSupport;

#[async_trait]
impl Probe for AttestationSupport {
    fn descriptor(&self) -> &ProbeDescriptor {
        &ATTESTATION_SUPPORT
    }

    async fn evaluate(&self, ctx: &ProbeContext) -> std::result::Result<Finding, ProbeError> {
        let resolution = FallbackChain::new("attestation support")
            .direct("tpm_version_major", async {
                file_number(ctx, "/sys/class/tpm/tpm0/tpm_version_major")
                    .await
                    .map(|major| major >= 2)
            })
            .inferred("ro.product.first_api_level", async {
                ctx.property("ro.product.first_api_level")
                    .await
                    .and_then(|level| {
                        level.trim().parse::<u64>().map_or_else(
                            |_| Evidence::unknown(format!("unparseable API level `{level}`")),
                            |level| Evidence::Known(level >= ATTESTATION_API_LEVEL),
                        )
                    })
            })
            .resolve()
            .await;

        Ok(conclude(
            &ATTESTATION_SUPPORT,
            resolution,
            "key attestation supported",
            "key attestation unsupported",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::testing::{MemoryKeyStore, StaticSources};
    use hostward_core::run_probe;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn key_probes_share_a_lane() {
        let set = probe_set().unwrap();
        assert_eq!(set.lanes(true), vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[tokio::test]
    async fn secure_hardware_key_passes_and_is_deleted() {
        let store = MemoryKeyStore::with_hardware(true, false);
        let ctx = StaticSources::new().keys(store.clone()).context(Category::Tee);
        let outcome = run_probe(&HardwareKeystore, &ctx, TIMEOUT).await;
        assert!(outcome.passed);
        assert_eq!(store.created(), 1);
        assert!(store.live_aliases().is_empty());
    }

    #[tokio::test]
    async fn software_key_fails() {
        let store = MemoryKeyStore::with_hardware(false, false);
        let ctx = StaticSources::new().keys(store.clone()).context(Category::Tee);
        assert!(!run_probe(&HardwareKeystore, &ctx, TIMEOUT).await.passed);
        assert!(store.live_aliases().is_empty());
    }

    #[tokio::test]
    async fn provider_exception_is_a_recorded_fault() {
        let store = MemoryKeyStore::failing(EvidenceError::Provider("ProviderException".into()));
        let ctx = StaticSources::new().keys(store.clone()).context(Category::Tee);
        let outcome = run_probe(&HardwareKeystore, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|e| e.contains("ProviderException")));
        assert!(store.live_aliases().is_empty());
    }

    #[tokio::test]
    async fn missing_strongbox_fails_without_fault() {
        let store = MemoryKeyStore::with_hardware(true, false);
        let ctx = StaticSources::new().keys(store.clone()).context(Category::Tee);
        let outcome = run_probe(&Strongbox, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(outcome.error.is_none());
        assert!(!outcome.assumed);
    }

    #[tokio::test]
    async fn strongbox_key_passes() {
        let store = MemoryKeyStore::with_hardware(true, true);
        let ctx = StaticSources::new().keys(store.clone()).context(Category::Tee);
        assert!(run_probe(&Strongbox, &ctx, TIMEOUT).await.passed);
        assert!(store.live_aliases().is_empty());
    }

    #[tokio::test]
    async fn tpm_device_node_counts() {
        let ctx = StaticSources::new()
            .content("/dev/tpmrm0", "")
            .context(Category::Tee);
        assert!(run_probe(&TeeDevice, &ctx, TIMEOUT).await.passed);
    }

    #[tokio::test]
    async fn old_api_level_lacks_attestation() {
        let ctx = StaticSources::new()
            .property("ro.product.first_api_level", "23")
            .context(Category::Tee);
        let outcome = run_probe(&AttestationSupport, &ctx, TIMEOUT).await;
        assert!(!outcome.passed);
        assert!(!outcome.assumed);
    }
}
