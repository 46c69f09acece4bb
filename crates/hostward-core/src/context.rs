//! Per-invocation context handed to probes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::category::Category;
use crate::error::EvidenceError;
use crate::evidence::{Evidence, EvidenceSources, HardwareKeyEvidence, KeyAttestation, KeySpec};

/// Default timeout handed to command evidence.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(800);

static INVOCATIONS: AtomicU64 = AtomicU64::new(1);

/// Tracks every hardware key alias created during one category run.
///
/// Aliases are registered before the provider is asked to create them, so
/// a run interrupted mid-creation still knows what to delete. The probe
/// boundary sweeps a stateful probe's alias once it finishes, whatever the
/// exit path; the orchestrator sweeps everything left on interruption.
#[derive(Clone)]
pub struct KeyLedger {
    store: Arc<dyn HardwareKeyEvidence>,
    namespace: String,
    outstanding: Arc<Mutex<BTreeSet<String>>>,
}

impl std::fmt::Debug for KeyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLedger")
            .field("namespace", &self.namespace)
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl KeyLedger {
    /// Ledger with a fresh, process-unique namespace for `category`.
    pub fn new(store: Arc<dyn HardwareKeyEvidence>, category: Category) -> Self {
        let invocation = INVOCATIONS.fetch_add(1, Ordering::Relaxed);
        Self {
            store,
            namespace: format!("hostward.{category}.{invocation}"),
            outstanding: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Namespaced alias for a key owned by `probe`.
    #[must_use]
    pub fn alias(&self, probe: &str) -> String {
        format!("{}.{probe}", self.namespace)
    }

    /// Create a key for `probe`.
    ///
    /// On error the alias stays registered and is removed by the next sweep.
    pub async fn create(&self, probe: &str, spec: &KeySpec) -> Result<ScopedKey, EvidenceError> {
        let alias = self.alias(probe);
        self.lock().insert(alias.clone());
        debug!(%alias, strongbox = spec.require_strongbox, "creating probe key");

        let attestation = self.store.create(&alias, spec).await?;
        Ok(ScopedKey {
            alias,
            attestation,
            ledger: self.clone(),
        })
    }

    /// Delete one alias and stop tracking it.
    pub async fn release(&self, alias: &str) -> Result<(), EvidenceError> {
        self.store.delete(alias).await?;
        self.lock().remove(alias);
        Ok(())
    }

    /// Delete every outstanding alias. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let pending: Vec<String> = self.outstanding();
        let mut removed = 0;
        for alias in pending {
            match self.release(&alias).await {
                Ok(()) => {
                    debug!(%alias, "swept probe key");
                    removed += 1;
                }
                Err(e) => warn!(%alias, error = %e, "failed to delete probe key"),
            }
        }
        removed
    }

    /// Delete the key owned by `probe`, if it is still outstanding.
    pub async fn sweep_probe(&self, probe: &str) -> usize {
        let alias = self.alias(probe);
        if !self.lock().contains(&alias) {
            return 0;
        }
        match self.release(&alias).await {
            Ok(()) => {
                debug!(%alias, "swept probe key");
                1
            }
            Err(e) => {
                warn!(%alias, error = %e, "failed to delete probe key");
                0
            }
        }
    }

    /// Aliases created but not yet deleted.
    #[must_use]
    pub fn outstanding(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A key created through a [`KeyLedger`].
#[derive(Debug)]
pub struct ScopedKey {
    /// Alias the key was created under
    pub alias: String,
    /// What the store reported
    pub attestation: KeyAttestation,
    ledger: KeyLedger,
}

impl ScopedKey {
    /// Delete the key now.
    pub async fn release(self) -> Result<(), EvidenceError> {
        self.ledger.release(&self.alias).await
    }
}

/// Progress message from a multi-stage probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Probe reporting
    pub probe: String,
    /// Stage description
    pub message: String,
}

/// Everything a probe may use while evaluating.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    sources: EvidenceSources,
    category: Category,
    keys: KeyLedger,
    progress: Option<mpsc::UnboundedSender<Progress>>,
    command_timeout: Duration,
}

impl ProbeContext {
    /// Context for one run of `category`.
    pub fn new(sources: EvidenceSources, category: Category) -> Self {
        let keys = KeyLedger::new(Arc::clone(&sources.keys), category);
        Self {
            sources,
            category,
            keys,
            progress: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Route progress messages to `tx`.
    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<Progress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Timeout for command evidence.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Evidence sources.
    pub const fn sources(&self) -> &EvidenceSources {
        &self.sources
    }

    /// Category being assessed.
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Key ledger for stateful probes.
    pub const fn keys(&self) -> &KeyLedger {
        &self.keys
    }

    /// Command timeout.
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Report a stage of a multi-stage probe.
    pub fn report(&self, probe: &str, message: impl Into<String>) {
        if let Some(tx) = &self.progress {
            // Receiver gone means nobody is watching; not an error.
            let _ = tx.send(Progress {
                probe: probe.to_string(),
                message: message.into(),
            });
        }
    }

    /// Property lookup.
    pub async fn property(&self, key: &str) -> Evidence<String> {
        self.sources.properties.property(key).await
    }

    /// Bounded text read of a file.
    pub async fn read(&self, path: &str) -> Evidence<String> {
        self.sources.files.read(path, 64 * 1024).await
    }

    /// Run a command with the configured timeout.
    pub async fn command(&self, argv: &[&str]) -> Evidence<String> {
        self.sources.commands.run(argv, self.command_timeout).await
    }
}
