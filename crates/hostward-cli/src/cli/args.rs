//! Command-line argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use hostward::Category;
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Assess how far this host can be trusted.
///
/// Runs probe sets for boot integrity, hardware-backed keys, mandatory
/// access control, root artefacts, network posture and known tooling, and
/// scores each category as passed, warning or failed.
#[derive(Parser, Debug)]
#[command(name = "hostward")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Configuration file (default: platform config directory)
    #[arg(short, long, global = true, env = "HOSTWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assess one or more categories
    Assess(AssessArgs),

    /// List categories, thresholds and probes
    Categories,

    /// Show the signature denylist
    Signatures(SignaturesArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),
}

// ============================================================================
// Assess command
// ============================================================================

#[derive(Args, Debug)]
pub struct AssessArgs {
    /// Categories to assess (default: all)
    pub categories: Vec<Category>,

    /// Assess every category
    #[arg(long, conflicts_with = "categories")]
    pub all: bool,

    /// Operator-supplied denylist (JSON) instead of the embedded one
    #[arg(long)]
    pub denylist: Option<PathBuf>,

    /// Run the probes of a category one at a time
    #[arg(long)]
    pub sequential: bool,
}

impl AssessArgs {
    /// Categories to run, in the order given.
    pub fn selected(&self) -> Vec<Category> {
        if self.all || self.categories.is_empty() {
            Category::ALL.to_vec()
        } else {
            let mut selected = Vec::with_capacity(self.categories.len());
            for category in &self.categories {
                if !selected.contains(category) {
                    selected.push(*category);
                }
            }
            selected
        }
    }
}

// ============================================================================
// Signatures command
// ============================================================================

#[derive(Args, Debug)]
pub struct SignaturesArgs {
    /// Only entries of this class (package, binary, hooking)
    #[arg(long)]
    pub category: Option<String>,

    /// Operator-supplied denylist (JSON) instead of the embedded one
    #[arg(long)]
    pub denylist: Option<PathBuf>,
}

// ============================================================================
// Config command
// ============================================================================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn empty_selection_means_everything() {
        let cli = Cli::try_parse_from(["hostward", "assess"]).unwrap();
        let Commands::Assess(args) = cli.command else {
            panic!("expected assess");
        };
        assert_eq!(args.selected(), Category::ALL.to_vec());
    }

    #[test]
    fn categories_parse_with_aliases() {
        let cli = Cli::try_parse_from(["hostward", "-vv", "assess", "boot", "mac", "boot"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Assess(args) = cli.command else {
            panic!("expected assess");
        };
        assert_eq!(args.selected(), vec![Category::Bootloader, Category::Selinux]);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["hostward", "assess", "firmware"]).is_err());
    }
}
