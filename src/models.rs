//! Core data models for lyric fetching.
//!
//! This module contains the structs and enums shared by the planner, the
//! ranker and the orchestrator.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// ============================================================================
// Operating Mode
// ============================================================================

/// What a run does with each audio file it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Download lyrics for files that have no sidecar yet.
    FetchMissing,
    /// Replace unsynced sidecars with synced lyrics when the catalog has them.
    ScanUnsynced,
    /// Local only: romanize and/or embed sidecars that already exist.
    ProcessExisting,
}

impl Mode {
    /// Resolve the mode from the two mutually exclusive CLI switches.
    pub fn from_flags(scan_unsynced: bool, process_existing: bool) -> Result<Self, ConfigError> {
        match (scan_unsynced, process_existing) {
            (true, true) => Err(ConfigError::ConflictingModes),
            (true, false) => Ok(Mode::ScanUnsynced),
            (false, true) => Ok(Mode::ProcessExisting),
            (false, false) => Ok(Mode::FetchMissing),
        }
    }

    /// Whether jobs in this mode query the remote catalog.
    pub fn needs_lookup(self) -> bool {
        !matches!(self, Mode::ProcessExisting)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::FetchMissing => "Scanning for MISSING LYRICS",
            Mode::ScanUnsynced => "Scanning for UNSYNCED UPGRADES",
            Mode::ProcessExisting => "Processing EXISTING LRC FILES",
        }
    }
}

// ============================================================================
// Tracks and Candidates
// ============================================================================

/// Tag snapshot of a local audio file, read once by the job that owns it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Whole seconds; 0 means unknown.
    pub duration_secs: u32,
}

impl Track {
    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0
    }
}

/// One remote search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LyricCandidate {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: u32,
    pub is_synced: bool,
    /// Raw lyric content, LRC when synced, plain text otherwise.
    pub body: String,
}

// ============================================================================
// Jobs
// ============================================================================

/// A unit of work for exactly one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub audio_path: PathBuf,
    pub sidecar_path: PathBuf,
    pub mode: Mode,
    pub romanize: bool,
    pub embed: bool,
}

impl Job {
    pub fn new(audio_path: PathBuf, mode: Mode, romanize: bool, embed: bool) -> Self {
        let sidecar_path = sidecar_path_for(&audio_path);
        Self {
            audio_path,
            sidecar_path,
            mode,
            romanize,
            embed,
        }
    }

    /// Romanization always runs for existing sidecars; that is the point of the mode.
    pub fn wants_romanize(&self) -> bool {
        self.romanize || self.mode == Mode::ProcessExisting
    }
}

/// Sidecar naming convention: same directory and stem, `.lrc` extension.
pub fn sidecar_path_for(audio_path: &Path) -> PathBuf {
    audio_path.with_extension("lrc")
}

/// How a finished job is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Downloaded,
    Upgraded,
    /// Existing sidecar was romanized and/or embedded.
    Processed,
    Skipped,
}

/// Result of a job that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub disposition: Disposition,
    pub romanized: bool,
    pub embedded: bool,
    /// Embedding was requested and failed. The sidecar is still written and
    /// counted, so this is reported next to the disposition, not instead of it.
    pub embed_error: Option<String>,
}

// ============================================================================
// Run Summary
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters for one run.
///
/// Each worker fills its own summary; the orchestrator merges them once the
/// pool has drained, so no counter is ever shared between threads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub upgraded: usize,
    pub processed: usize,
    pub romanized: usize,
    pub embedded: usize,
    pub failed: usize,
    pub failures: Vec<Failure>,
    /// Files whose lyrics were written but could not be embedded.
    pub embed_failures: Vec<Failure>,
    /// Set when a stop signal ended the run before the queue drained.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn record_report(&mut self, path: &Path, report: JobReport) {
        match report.disposition {
            Disposition::Downloaded => self.downloaded += 1,
            Disposition::Upgraded => self.upgraded += 1,
            Disposition::Processed => self.processed += 1,
            Disposition::Skipped => self.skipped += 1,
        }
        if report.romanized {
            self.romanized += 1;
        }
        if report.embedded {
            self.embedded += 1;
        }
        if let Some(reason) = report.embed_error {
            self.embed_failures.push(Failure {
                path: path.to_path_buf(),
                reason,
            });
        }
    }

    pub fn record_failure(&mut self, path: &Path, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(Failure {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.upgraded += other.upgraded;
        self.processed += other.processed;
        self.romanized += other.romanized;
        self.embedded += other.embedded;
        self.failed += other.failed;
        self.failures.extend(other.failures);
        self.embed_failures.extend(other.embed_failures);
        self.interrupted |= other.interrupted;
    }

    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Number of files with a final disposition. `romanized` and `embedded`
    /// are side effects of those files and are not included.
    pub fn files_accounted(&self) -> usize {
        self.downloaded + self.upgraded + self.processed + self.skipped + self.failed
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}
