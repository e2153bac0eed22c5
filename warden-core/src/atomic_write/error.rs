use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Stage of a write session at which an I/O error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Open,
    Write,
    Sync,
    Rename,
}

impl WritePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Write => "write",
            Self::Sync => "sync",
            Self::Rename => "rename",
        }
    }
}

impl fmt::Display for WritePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of an atomic write. In atomic mode the destination is untouched
/// whenever one of these is returned.
#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("atomic write of {} failed during {phase}", .path.display())]
    Io {
        path: PathBuf,
        phase: WritePhase,
        #[source]
        source: io::Error,
    },

    #[error("atomic write of {} was aborted: {reason}", .path.display())]
    Aborted { path: PathBuf, reason: String },

    #[error("write session for {} ended unexpectedly", .path.display())]
    SessionClosed { path: PathBuf },
}

impl WriteFailure {
    pub(crate) fn io(path: &Path, phase: WritePhase, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            phase,
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Aborted { path, .. } | Self::SessionClosed { path } => {
                path
            }
        }
    }

    pub fn phase(&self) -> Option<WritePhase> {
        match self {
            Self::Io { phase, .. } => Some(*phase),
            Self::Aborted { .. } | Self::SessionClosed { .. } => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}
