//! Filesystem metadata and bounded reads.

use async_trait::async_trait;
use hostward_core::evidence::{Evidence, FileEvidence, FileFacts};
use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Effective credentials of the assessing process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    /// Effective user id
    pub uid: u32,
    /// Effective group id
    pub gid: u32,
}

impl Credentials {
    /// Credentials of this process, from `/proc/self/status`.
    pub fn current() -> Option<Self> {
        let status = procfs::process::Process::myself()
            .and_then(|p| p.status())
            .map_err(|e| debug!(error = %e, "could not read own credentials"))
            .ok()?;
        Some(Self {
            uid: status.euid,
            gid: status.egid,
        })
    }

    const fn is_root(self) -> bool {
        self.uid == 0
    }

    /// Whether the permission class (`0o4` read, `0o2` write) applies.
    fn permits(self, mode: u32, owner: u32, group: u32, class: u32) -> bool {
        if self.is_root() {
            return mode & (class * 0o111) != 0;
        }
        let shift = if owner == self.uid {
            6
        } else if group == self.gid {
            3
        } else {
            0
        };
        mode & (class << shift) != 0
    }
}

/// [`FileEvidence`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct HostFiles {
    credentials: Option<Credentials>,
}

impl HostFiles {
    /// Files inspected with this process's credentials.
    pub fn new() -> Self {
        Self {
            credentials: Credentials::current(),
        }
    }

    /// Files inspected as if by `credentials`.
    pub const fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }
}

impl Default for HostFiles {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn io_reason(error: &std::io::Error) -> String {
    match error.kind() {
        ErrorKind::NotFound => String::from("no such file"),
        ErrorKind::PermissionDenied => String::from("permission denied"),
        _ => error.to_string(),
    }
}

#[async_trait]
impl FileEvidence for HostFiles {
    async fn inspect(&self, path: &str) -> Evidence<FileFacts> {
        let link = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Evidence::Known(FileFacts::absent()),
            Err(e) => return Evidence::unknown(format!("{path}: {}", io_reason(&e))),
        };
        // A link's own mode is always 0o777; permissions are the target's.
        let meta = if link.file_type().is_symlink() {
            match tokio::fs::metadata(path).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path, "dangling symlink");
                    return Evidence::Known(FileFacts {
                        exists: true,
                        readable: false,
                        writable: false,
                        size_bytes: 0,
                    });
                }
                Err(e) => return Evidence::unknown(format!("{path}: {}", io_reason(&e))),
            }
        } else {
            link
        };
        let Some(credentials) = self.credentials else {
            return Evidence::unknown("process credentials unavailable");
        };

        let mode = meta.mode();
        Evidence::Known(FileFacts {
            exists: true,
            readable: credentials.permits(mode, meta.uid(), meta.gid(), 0o4),
            writable: credentials.permits(mode, meta.uid(), meta.gid(), 0o2),
            size_bytes: meta.len(),
        })
    }

    async fn read(&self, path: &str, max_bytes: usize) -> Evidence<String> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => return Evidence::unknown(io_reason(&e)),
        };
        let mut buf = Vec::new();
        let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
        match file.take(limit).read_to_end(&mut buf).await {
            Ok(_) => Evidence::Known(String::from_utf8_lossy(&buf).into_owned()),
            Err(e) => Evidence::unknown(io_reason(&e)),
        }
    }
}
