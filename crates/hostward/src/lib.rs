//! # hostward
//!
//! Host trustworthiness assessment.
//!
//! An [`Orchestrator`] runs one probe set per [`Category`] against a set of
//! evidence sources and streams [`AssessmentState`]s: `Running` with
//! cumulative partial scores, then exactly one `Terminal` verdict.
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use hostward::{Category, Orchestrator};
//!
//! # async fn run() -> hostward::Result<()> {
//! let orchestrator = Orchestrator::for_host()?;
//! let mut states = orchestrator.assess(Category::Bootloader)?;
//! while let Some(state) = states.next().await {
//!     println!("{:?} {}/{}", state.phase, state.completed, state.total);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;
pub mod stream;

pub use config::AssessmentConfig;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, BUDGET_EXHAUSTED, CANCELLED};
pub use stream::AssessmentStream;

// Re-export the core model and catalogue
pub use hostward_core::*;
pub use hostward_host as host;
pub use hostward_probes as probes;
