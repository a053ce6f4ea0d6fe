//! Error types.
//!
//! Rule application never fails (bad patterns are skipped inside the
//! transform), so the only errors here are about files and configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An action-level failure. Nothing was renamed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenameError {
    #[error("no files loaded")]
    NoFiles,

    #[error("no enabled rules to apply")]
    NoRules,
}

/// A failure affecting a single file. Recorded next to that file; never
/// aborts the rest of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum FsError {
    /// The entry was loaded without a resolvable path.
    #[error("file path could not be resolved")]
    UnresolvedPath,

    #[error("unresolvable path for {name}: {reason}")]
    UnresolvablePath { name: String, reason: String },

    #[error("failed to list {path}: {reason}")]
    ListDirectory { path: String, reason: String },

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    #[error("a file named {0:?} already exists")]
    AlreadyExists(String),

    #[error("no result returned for {0:?}")]
    MissingResult(String),

    /// Filesystem error text, kept verbatim for display.
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Failure loading a [`crate::RenamerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
