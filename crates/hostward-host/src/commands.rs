//! Subprocess execution with a hard timeout.

use async_trait::async_trait;
use hostward_core::evidence::{CommandEvidence, Evidence};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// How a subprocess ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    /// Process exited
    Completed {
        /// Exit status was zero
        success: bool,
        /// Captured standard output
        stdout: String,
    },
    /// Executable not found
    Missing,
    /// Not allowed to execute
    Denied,
    /// Killed after the timeout
    TimedOut,
    /// Spawn or wait failed otherwise
    Failed(String),
}

/// Run `argv` with stdin closed, killing it after `timeout`.
pub async fn execute(argv: &[&str], timeout: Duration) -> Execution {
    let Some((program, args)) = argv.split_first() else {
        return Execution::Failed(String::from("empty command line"));
    };

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Execution::Completed {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        },
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Execution::Missing,
        Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => Execution::Denied,
        Ok(Err(e)) => Execution::Failed(e.to_string()),
        Err(_) => {
            debug!(program, timeout_ms = timeout.as_millis(), "command timed out");
            Execution::TimedOut
        }
    }
}

impl Execution {
    /// Successful stdout, everything else `Unknown`.
    pub fn into_evidence(self) -> Evidence<String> {
        match self {
            Self::Completed {
                success: true,
                stdout,
            } => Evidence::Known(stdout),
            Self::Completed { success: false, .. } => Evidence::unknown("non-zero exit status"),
            Self::Missing => Evidence::unknown("command not found"),
            Self::Denied => Evidence::unknown("permission denied"),
            Self::TimedOut => Evidence::unknown("timed out"),
            Self::Failed(reason) => Evidence::Unknown(reason),
        }
    }
}

/// [`CommandEvidence`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCommands;

#[async_trait]
impl CommandEvidence for HostCommands {
    async fn run(&self, argv: &[&str], timeout: Duration) -> Evidence<String> {
        execute(argv, timeout).await.into_evidence()
    }
}
