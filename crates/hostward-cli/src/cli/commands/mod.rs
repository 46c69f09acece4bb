//! Command implementations.

pub mod assess;
pub mod categories;
pub mod config;
pub mod signatures;

use anyhow::{Context as _, Result};
use hostward::Denylist;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output format
    pub output_format: OutputFormat,

    /// Loaded configuration
    pub config: Config,

    /// Where the configuration lives
    pub config_path: PathBuf,

    /// Disable colors
    pub no_color: bool,
}

impl Context {
    /// Denylist from `path`, the configured file, or the embedded list.
    pub fn denylist(&self, path: Option<&Path>) -> Result<Arc<Denylist>> {
        let list = match path.or(self.config.denylist.as_deref()) {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading denylist {}", path.display()))?;
                Denylist::from_json(&json)
                    .with_context(|| format!("loading denylist {}", path.display()))?
            }
            None => hostward::probes::denylist::embedded()?,
        };
        Ok(Arc::new(list))
    }
}
