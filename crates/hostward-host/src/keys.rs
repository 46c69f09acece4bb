//! Key store for hosts without a reachable hardware-backed provider.

use async_trait::async_trait;
use hostward_core::evidence::{HardwareKeyEvidence, KeyAttestation, KeySpec};
use hostward_core::EvidenceError;

/// Key store that reports the provider as unavailable.
///
/// Platform key stores (Android Keystore, a TPM resource manager) plug in
/// through [`HardwareKeyEvidence`]; this is the fallback when none is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableKeyStore;

#[async_trait]
impl HardwareKeyEvidence for UnavailableKeyStore {
    async fn create(&self, _alias: &str, spec: &KeySpec) -> Result<KeyAttestation, EvidenceError> {
        Err(EvidenceError::Unavailable(format!(
            "no hardware-backed key store for {} {}-bit keys",
            spec.algorithm, spec.size_bits
        )))
    }

    async fn delete(&self, _alias: &str) -> Result<(), EvidenceError> {
        Ok(())
    }
}
