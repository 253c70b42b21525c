//! Safety checks run before anything is written.
//!
//! A sidecar write must never land on the audio file itself or outside the
//! directory that holds it, whatever the file name looks like.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, JobError};

/// Resolve the library root, failing before any job runs if it is not a
/// directory.
pub fn validate_library_root(root: &Path) -> Result<PathBuf, ConfigError> {
    if !root.is_dir() {
        return Err(ConfigError::NotADirectory(root.to_path_buf()));
    }
    Ok(root.canonicalize().unwrap_or_else(|_| root.to_path_buf()))
}

/// Validates that a sidecar path is safe to create or overwrite.
///
/// Checks:
/// - the target has the `.lrc` extension
/// - the target is not the audio file it belongs to
/// - the target sits in the same directory as the audio file
/// - an existing target is a regular file, not a directory or symlink
pub fn validate_sidecar_target(sidecar: &Path, audio: &Path) -> Result<(), JobError> {
    let unsafe_target = |reason: &str| JobError::UnsafeTarget {
        path: sidecar.to_path_buf(),
        reason: reason.to_string(),
    };

    let is_lrc = sidecar
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("lrc"));
    if !is_lrc {
        return Err(unsafe_target("not an .lrc file"));
    }

    if sidecar == audio {
        return Err(unsafe_target("target is the audio file itself"));
    }

    if sidecar.parent() != audio.parent() {
        return Err(unsafe_target("target is outside the audio file's directory"));
    }

    if let Ok(meta) = sidecar.symlink_metadata() {
        if !meta.file_type().is_file() {
            return Err(unsafe_target("existing target is not a regular file"));
        }
    }

    Ok(())
}
