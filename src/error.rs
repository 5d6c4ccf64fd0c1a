//! Error types shared by the naming, scanning, writing and reading code.

use std::error::Error as _;
use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::scan::ArchiveStats;

/// Errors produced while resolving, scanning, writing or reading an archive.
#[derive(Error, Debug)]
pub enum ZipperError {
    /// Probing a candidate output path failed for a reason other than "not found".
    #[error("failed to probe {}", path.display())]
    PathResolution { path: PathBuf, source: io::Error },

    /// Every candidate name up to the configured bound already exists.
    #[error("no free archive name for '{base}' in {} after {limit} attempts", dir.display())]
    ProbeLimitExceeded {
        dir: PathBuf,
        base: String,
        limit: u32,
    },

    #[error("failed to scan {}", path.display())]
    Scan { path: PathBuf, source: io::Error },

    #[error("failed to create {}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to read {}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write entry {}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to finalize {}", path.display())]
    Close { path: PathBuf, source: io::Error },

    #[error("invalid zip archive: {0}")]
    InvalidArchive(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ZipperError {
    /// Converts a walkdir error into an `io::Error`, keeping the path in the message
    /// when the error did not come from the OS.
    pub(crate) fn walk_source(err: walkdir::Error) -> io::Error {
        let fallback = err.to_string();
        err.into_io_error()
            .unwrap_or_else(|| io::Error::other(fallback))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ZipperError>;

/// An archive operation that failed after (or while) scanning the source tree.
///
/// The stats from the scan pass travel with the error so callers can still
/// report how much data was involved. They are zero when the scan itself failed.
///
/// Displays as the underlying [`ZipperError`] and shares its source chain.
#[derive(Debug)]
pub struct ArchiveFailure {
    pub stats: ArchiveStats,
    pub error: ZipperError,
}

impl fmt::Display for ArchiveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for ArchiveFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}
