//! ``src/error.rs``
//! ============================================================================
//! # `AppError`: Unified Error Type for the Archive Browser Core
//!
//! One error enum for every operation in the crate. Tree/path errors
//! (`OutOfRange`, `NotFound`) are recoverable and are converted to an
//! [`Outcome`] at the navigator boundary; nothing here is expected to
//! terminate a session.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Unified error type for container, tree, and engine operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Path does not descend from the root of the tree it was used with.
    #[error("path {path:?} is outside of tree root {root:?}")]
    OutOfRange { path: PathBuf, root: PathBuf },

    /// Requested file or directory does not exist (or vanished after listing).
    #[error("file or directory not found: {0:?}")]
    NotFound(PathBuf),

    /// Content sniff matched no supported archive format.
    #[error("unsupported archive format: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// Archive stream opened but could not be read as its sniffed format.
    #[error("cannot open container {path:?}: {reason}")]
    CannotOpen { path: PathBuf, reason: String },

    /// Entry stream became unreadable mid-pass; the whole operation aborts.
    #[error("archive {path:?} is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// Archives are created from filesystem paths, never from other archives.
    #[error("archive creation requires a filesystem source")]
    NonFilesystemSource,

    /// A background archive job is still running.
    #[error("an archive task is already running")]
    TaskBusy,

    /// Operation was cancelled between entries.
    #[error("operation was cancelled")]
    Cancelled,

    /// TOML config parsing error.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

impl AppError {
    /// Build an `OutOfRange` error for `path` against `root`.
    pub fn out_of_range<P: Into<PathBuf>, R: Into<PathBuf>>(path: P, root: R) -> Self {
        Self::OutOfRange {
            path: path.into(),
            root: root.into(),
        }
    }

    /// Build a `CannotOpen` error with a display-friendly reason.
    pub fn cannot_open<P: Into<PathBuf>, S: ToString>(path: P, reason: S) -> Self {
        Self::CannotOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `Corrupted` error with a display-friendly reason.
    pub fn corrupted<P: Into<PathBuf>, S: ToString>(path: P, reason: S) -> Self {
        Self::Corrupted {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result of one core operation, as reported to the UI layer.
///
/// The UI maps these to flash/notify behaviour; the core never touches the
/// terminal itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NotFound,
    OutOfRange,
    UnsupportedFormat,
    IoError,
}

impl Outcome {
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<&AppError> for Outcome {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::OutOfRange { .. } => Self::OutOfRange,
            AppError::NotFound(_) => Self::NotFound,
            AppError::UnsupportedFormat(_)
            | AppError::CannotOpen { .. }
            | AppError::NonFilesystemSource => Self::UnsupportedFormat,
            _ => Self::IoError,
        }
    }
}

impl<T> From<Result<T, AppError>> for Outcome {
    fn from(r: Result<T, AppError>) -> Self {
        match r {
            Ok(_) => Self::Ok,
            Err(e) => Self::from(&e),
        }
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Io(io::Error::other(e.to_string()))
    }
}
