//! Deterministic in-memory evidence sources.
//!
//! Enabled for this crate's tests and, through the `test-support`
//! feature, for downstream crates.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::category::Category;
use crate::context::ProbeContext;
use crate::error::EvidenceError;
use crate::evidence::{
    CommandEvidence, EntityEnumerationEvidence, Evidence, EvidenceSources, FileEvidence,
    FileFacts, HardwareKeyEvidence, KeyAttestation, KeySpec, NetworkEvidence, NetworkFacts,
    PackageEvidence, PropertyEvidence,
};

/// In-memory key store that records which aliases are alive.
#[derive(Debug)]
pub struct MemoryKeyStore {
    live: Mutex<BTreeSet<String>>,
    created: AtomicUsize,
    secure_hardware: bool,
    strongbox: bool,
    failure: Option<EvidenceError>,
    stall: Option<Duration>,
}

impl MemoryKeyStore {
    fn with(secure_hardware: bool, strongbox: bool) -> Self {
        Self {
            live: Mutex::new(BTreeSet::new()),
            created: AtomicUsize::new(0),
            secure_hardware,
            strongbox,
            failure: None,
            stall: None,
        }
    }

    /// TEE-backed store without StrongBox.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::with(true, false))
    }

    /// Store with explicit hardware capabilities.
    #[must_use]
    pub fn with_hardware(secure_hardware: bool, strongbox: bool) -> Arc<Self> {
        Arc::new(Self::with(secure_hardware, strongbox))
    }

    /// Store whose `create` always fails with `error`.
    #[must_use]
    pub fn failing(error: EvidenceError) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(error),
            ..Self::with(true, false)
        })
    }

    /// Store whose `create` registers the key, then stalls for `delay`
    /// before returning.
    #[must_use]
    pub fn stalling(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stall: Some(delay),
            ..Self::with(true, false)
        })
    }

    /// Aliases currently holding key material.
    #[must_use]
    pub fn live_aliases(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    /// Number of keys ever created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HardwareKeyEvidence for MemoryKeyStore {
    async fn create(&self, alias: &str, spec: &KeySpec) -> Result<KeyAttestation, EvidenceError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if spec.require_strongbox && !self.strongbox {
            return Err(EvidenceError::Unavailable("StrongBox not present".into()));
        }

        self.lock().insert(alias.to_string());
        self.created.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }

        Ok(KeyAttestation {
            created: true,
            inside_secure_hardware: self.secure_hardware,
            strongbox_backed: spec.require_strongbox && self.strongbox,
        })
    }

    async fn delete(&self, alias: &str) -> Result<(), EvidenceError> {
        self.lock().remove(alias);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Fixture {
    files: BTreeMap<String, FileFacts>,
    contents: BTreeMap<String, Evidence<String>>,
    properties: BTreeMap<String, Evidence<String>>,
    commands: BTreeMap<String, Evidence<String>>,
    packages: BTreeSet<String>,
    network: Option<Evidence<NetworkFacts>>,
    entities: BTreeMap<String, BTreeSet<String>>,
}

/// Builder for fully in-memory [`EvidenceSources`].
///
/// Unset files are absent, unset properties and commands are `Unknown`,
/// unset packages are not installed.
#[derive(Debug, Default)]
pub struct StaticSources {
    fixture: Fixture,
    keys: Option<Arc<MemoryKeyStore>>,
}

impl StaticSources {
    /// Empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path metadata.
    #[must_use]
    pub fn file(mut self, path: &str, facts: FileFacts) -> Self {
        self.fixture.files.insert(path.to_string(), facts);
        self
    }

    /// Existing, readable, non-writable file with `text` as content.
    #[must_use]
    pub fn content(mut self, path: &str, text: &str) -> Self {
        self.fixture.files.insert(
            path.to_string(),
            FileFacts {
                exists: true,
                readable: true,
                writable: false,
                size_bytes: text.len() as u64,
            },
        );
        self.fixture
            .contents
            .insert(path.to_string(), Evidence::Known(text.to_string()));
        self
    }

    /// Existing file whose read is refused.
    #[must_use]
    pub fn unreadable(mut self, path: &str, reason: &str) -> Self {
        self.fixture.files.insert(
            path.to_string(),
            FileFacts {
                exists: true,
                ..FileFacts::absent()
            },
        );
        self.fixture
            .contents
            .insert(path.to_string(), Evidence::unknown(reason));
        self
    }

    /// Property value.
    #[must_use]
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.fixture
            .properties
            .insert(key.to_string(), Evidence::Known(value.to_string()));
        self
    }

    /// Property lookup that fails with `reason`.
    #[must_use]
    pub fn denied_property(mut self, key: &str, reason: &str) -> Self {
        self.fixture
            .properties
            .insert(key.to_string(), Evidence::unknown(reason));
        self
    }

    /// Output for a command line (argv joined with spaces).
    #[must_use]
    pub fn command(mut self, argv: &str, output: &str) -> Self {
        self.fixture
            .commands
            .insert(argv.to_string(), Evidence::Known(output.to_string()));
        self
    }

    /// Installed package.
    #[must_use]
    pub fn package(mut self, identifier: &str) -> Self {
        self.fixture.packages.insert(identifier.to_string());
        self
    }

    /// Network snapshot.
    #[must_use]
    pub fn network(mut self, facts: NetworkFacts) -> Self {
        self.fixture.network = Some(Evidence::Known(facts));
        self
    }

    /// Entities found under `base`.
    #[must_use]
    pub fn entities(mut self, base: &str, names: &[&str]) -> Self {
        self.fixture.entities.insert(
            base.to_string(),
            names.iter().map(|s| (*s).to_string()).collect(),
        );
        self
    }

    /// Key store to expose.
    #[must_use]
    pub fn keys(mut self, store: Arc<MemoryKeyStore>) -> Self {
        self.keys = Some(store);
        self
    }

    /// Finish into shareable sources.
    #[must_use]
    pub fn build(self) -> EvidenceSources {
        let fixture = Arc::new(self.fixture);
        let keys: Arc<dyn HardwareKeyEvidence> = match self.keys {
            Some(store) => store,
            None => MemoryKeyStore::shared(),
        };
        EvidenceSources {
            files: fixture.clone(),
            properties: fixture.clone(),
            commands: fixture.clone(),
            packages: fixture.clone(),
            keys,
            network: fixture.clone(),
            entities: fixture,
        }
    }

    /// Finish into a probe context for `category`.
    #[must_use]
    pub fn context(self, category: Category) -> ProbeContext {
        ProbeContext::new(self.build(), category)
    }
}

#[async_trait]
impl FileEvidence for Fixture {
    async fn inspect(&self, path: &str) -> Evidence<FileFacts> {
        Evidence::Known(self.files.get(path).copied().unwrap_or_else(FileFacts::absent))
    }

    async fn read(&self, path: &str, max_bytes: usize) -> Evidence<String> {
        match self.contents.get(path) {
            Some(Evidence::Known(text)) => {
                Evidence::Known(text.chars().take(max_bytes).collect())
            }
            Some(Evidence::Unknown(reason)) => Evidence::unknown(reason.clone()),
            None => Evidence::unknown("no such file"),
        }
    }
}

#[async_trait]
impl PropertyEvidence for Fixture {
    async fn property(&self, key: &str) -> Evidence<String> {
        self.properties
            .get(key)
            .cloned()
            .unwrap_or_else(|| Evidence::unknown("property not set"))
    }
}

#[async_trait]
impl CommandEvidence for Fixture {
    async fn run(&self, argv: &[&str], _timeout: Duration) -> Evidence<String> {
        self.commands
            .get(&argv.join(" "))
            .cloned()
            .unwrap_or_else(|| Evidence::unknown("command not found"))
    }
}

#[async_trait]
impl PackageEvidence for Fixture {
    async fn installed(&self, identifier: &str) -> Evidence<bool> {
        Evidence::Known(self.packages.contains(identifier))
    }
}

#[async_trait]
impl NetworkEvidence for Fixture {
    async fn snapshot(&self) -> Evidence<NetworkFacts> {
        self.network
            .clone()
            .unwrap_or_else(|| Evidence::unknown("no network information"))
    }
}

#[async_trait]
impl EntityEnumerationEvidence for Fixture {
    async fn enumerate(&self, base_path: &str) -> Evidence<BTreeSet<String>> {
        self.entities
            .get(base_path)
            .cloned()
            .map_or_else(|| Evidence::unknown("no such directory"), Evidence::Known)
    }
}
