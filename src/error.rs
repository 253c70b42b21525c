//! Error taxonomy.
//!
//! Only `ConfigError` ever reaches the process exit code. Everything else is
//! caught at the job boundary and turned into a summary entry.

use std::path::PathBuf;
use thiserror::Error;

use crate::script::ScriptFamily;

/// Invalid run configuration, detected before any job runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Directory not found: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("--scan-unsynced and --process-existing cannot be combined")]
    ConflictingModes,

    #[error("--workers must be at least 1")]
    NoWorkers,

    #[error("no audio extensions configured")]
    NoExtensions,
}

/// Remote lookup failure.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned HTTP {status}")]
    Service { status: u16 },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Tag reader / embedder failure.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("unreadable tags in {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("missing {field} tag in {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("could not embed lyrics into {}: {reason}", path.display())]
    Embed { path: PathBuf, reason: String },
}

/// A backend could not convert a segment. Never fatal: the segment is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransliterationError {
    #[error("unsupported character {0:?}")]
    Unsupported(char),

    #[error("backend does not handle {0:?} text")]
    WrongFamily(ScriptFamily),
}

/// Why a single job failed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("no match")]
    NoMatch,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Tag(#[from] TagError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to write {}: {reason}", path.display())]
    UnsafeTarget { path: PathBuf, reason: String },

    /// A job panicked; the worker survives and moves on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io {
            path: path.into(),
            source,
        }
    }
}
