//! Signature matching against a static denylist.
//!
//! Matching is pure set intersection with zero tolerance: one denylisted
//! entity present on the host is enough. Probes built on the matcher are
//! declared critical and vetoing, so a hit is never averaged away by
//! unrelated passing probes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::{ConfigError, Result};
use crate::hash::sha256_bytes;

/// One known-bad entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Exact identifier as enumerated on the host (package id, file name)
    pub identifier: String,
    /// Entity class, e.g. `package`, `binary`, `hooking`
    pub category: String,
}

impl SignatureEntry {
    /// Build an entry.
    pub fn new(identifier: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            category: category.into(),
        }
    }
}

#[derive(Deserialize)]
struct DenylistFile {
    version: String,
    entries: Vec<SignatureEntry>,
}

/// Immutable, versioned denylist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denylist {
    version: String,
    digest: String,
    entries: Vec<SignatureEntry>,
}

impl Denylist {
    /// Build from entries already in memory.
    pub fn new(version: impl Into<String>, entries: Vec<SignatureEntry>) -> Result<Self> {
        let version = version.into();
        let canonical = serde_json::to_vec(&entries).map_err(|e| ConfigError::Denylist(e.to_string()))?;
        Self::validated(version, entries, &canonical)
    }

    /// Parse `{ "version": ..., "entries": [{ "identifier", "category" }] }`.
    ///
    /// The digest covers the raw document bytes.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: DenylistFile =
            serde_json::from_str(json).map_err(|e| ConfigError::Denylist(e.to_string()))?;
        Self::validated(file.version, file.entries, json.as_bytes())
    }

    fn validated(version: String, entries: Vec<SignatureEntry>, material: &[u8]) -> Result<Self> {
        if version.trim().is_empty() {
            return Err(ConfigError::Denylist("missing version".into()));
        }
        if entries.is_empty() {
            return Err(ConfigError::Denylist("no entries".into()));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.identifier.trim().is_empty() {
                return Err(ConfigError::Denylist("empty identifier".into()));
            }
            if !seen.insert(entry.identifier.as_str()) {
                return Err(ConfigError::Denylist(format!(
                    "duplicate identifier `{}`",
                    entry.identifier
                )));
            }
        }
        Ok(Self {
            version,
            digest: sha256_bytes(material),
            entries,
        })
    }

    /// List version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// SHA-256 of the list source.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// All entries, in list order.
    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    /// Entries of one class.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a SignatureEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a validated list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// At least one denylisted entity is present
    pub any_match: bool,
    /// Matched entries, in denylist order
    pub matched: Vec<SignatureEntry>,
}

/// Intersect `entries` with the identifiers `present` on the host.
#[must_use]
pub fn match_signatures(entries: &[SignatureEntry], present: &BTreeSet<String>) -> MatchReport {
    let matched: Vec<SignatureEntry> = entries
        .iter()
        .filter(|e| present.contains(&e.identifier))
        .cloned()
        .collect();
    MatchReport {
        any_match: !matched.is_empty(),
        matched,
    }
}

/// Accumulates observations from several enumerations into one report.
///
/// Lives for a single pass; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct MatchPass {
    present: BTreeSet<String>,
}

impl MatchPass {
    /// Empty pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record identifiers seen by one enumeration.
    pub fn observe(&mut self, identifiers: impl IntoIterator<Item = String>) {
        self.present.extend(identifiers);
    }

    /// Number of distinct identifiers seen so far.
    #[must_use]
    pub fn observed(&self) -> usize {
        self.present.len()
    }

    /// Match everything observed against `entries`.
    #[must_use]
    pub fn finish(self, entries: &[SignatureEntry]) -> MatchReport {
        match_signatures(entries, &self.present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn single_hit_matches() {
        let entries = vec![SignatureEntry::new("com.example.bad", "package")];
        let report = match_signatures(&entries, &present(&["com.example.bad", "com.example.ok"]));
        assert!(report.any_match);
        assert_eq!(report.matched, entries);
    }

    #[test]
    fn no_partial_identifier_matches() {
        let entries = vec![SignatureEntry::new("frida", "binary")];
        let report = match_signatures(&entries, &present(&["frida-server", "fridax"]));
        assert!(!report.any_match);
        assert!(report.matched.is_empty());
    }

    #[test]
    fn pass_accumulates_across_enumerations() {
        let entries = vec![
            SignatureEntry::new("frida-server", "binary"),
            SignatureEntry::new("com.topjohnwu.magisk", "package"),
        ];
        let mut pass = MatchPass::new();
        pass.observe(present(&["ls", "cat"]));
        pass.observe(present(&["com.topjohnwu.magisk"]));
        assert_eq!(pass.observed(), 3);

        let report = pass.finish(&entries);
        assert_eq!(report.matched, vec![entries[1].clone()]);
    }

    #[test]
    fn denylist_validation() {
        assert!(Denylist::from_json(r#"{"version":"","entries":[{"identifier":"a","category":"x"}]}"#).is_err());
        assert!(Denylist::from_json(r#"{"version":"1","entries":[]}"#).is_err());
        assert!(Denylist::from_json(
            r#"{"version":"1","entries":[{"identifier":"a","category":"x"},{"identifier":"a","category":"y"}]}"#
        )
        .is_err());

        let list = Denylist::from_json(
            r#"{"version":"2026.1","entries":[{"identifier":"a","category":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(list.version(), "2026.1");
        assert_eq!(list.digest().len(), 64);
        assert_eq!(list.in_category("x").count(), 1);
    }
}
