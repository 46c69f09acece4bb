//! Directory-listing based entity enumeration.

use async_trait::async_trait;
use hostward_core::evidence::{EntityEnumerationEvidence, Evidence};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::files::io_reason;

/// [`EntityEnumerationEvidence`] that lists the entries directly under a
/// base path without following symlinks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEntities;

fn list(base: &str) -> Evidence<BTreeSet<String>> {
    let path = Path::new(base);
    if let Err(e) = std::fs::read_dir(path) {
        return Evidence::unknown(io_reason(&e));
    }

    let names: BTreeSet<String> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    debug!(path = base, entries = names.len(), "enumerated entities");
    Evidence::Known(names)
}

#[async_trait]
impl EntityEnumerationEvidence for HostEntities {
    async fn enumerate(&self, base_path: &str) -> Evidence<BTreeSet<String>> {
        let base = base_path.to_string();
        tokio::task::spawn_blocking(move || list(&base))
            .await
            .unwrap_or_else(|e| Evidence::unknown(format!("enumeration task failed: {e}")))
    }
}
