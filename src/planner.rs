//! Library walk and job planning.
//!
//! `JobPlanner` is a lazy iterator over the jobs a run needs: it walks the
//! library as it is pulled, so the first jobs start before the walk is done.
//! It cannot be rewound; plan again to walk again.

use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::lrc::{is_synced_body, read_sidecar};
use crate::models::{sidecar_path_for, Job, Mode};

pub const DEFAULT_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "ogg", "opus"];

/// Counts kept while walking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Audio files seen, planned or not.
    pub audio_files: usize,
    /// Files already in the state the mode wants.
    pub skipped: usize,
    pub planned: usize,
}

pub struct JobPlanner {
    walker: walkdir::IntoIter,
    mode: Mode,
    romanize: bool,
    embed: bool,
    extensions: Vec<String>,
    stats: PlanStats,
}

impl JobPlanner {
    pub fn new(
        root: &Path,
        mode: Mode,
        romanize: bool,
        embed: bool,
        extensions: &[impl AsRef<str>],
    ) -> Self {
        Self {
            walker: WalkDir::new(root).follow_links(true).into_iter(),
            mode,
            romanize,
            embed,
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            stats: PlanStats::default(),
        }
    }

    pub fn stats(&self) -> PlanStats {
        self.stats
    }

    fn is_audio(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
    }

    /// Whether a file needs a job in the current mode. `None` means the file
    /// is not counted at all (not applicable to the mode); `Some(false)` means
    /// it is already done.
    fn needs_work(&self, audio: &Path) -> Option<bool> {
        let sidecar = sidecar_path_for(audio);
        let has_sidecar = sidecar.is_file();
        match self.mode {
            Mode::FetchMissing => Some(!has_sidecar),
            Mode::ProcessExisting => has_sidecar.then_some(true),
            Mode::ScanUnsynced => {
                if !has_sidecar {
                    return None;
                }
                match read_sidecar(&sidecar) {
                    Ok(body) => Some(!is_synced_body(&body)),
                    Err(e) => {
                        warn!(path = %sidecar.display(), "cannot read sidecar: {}", e);
                        None
                    }
                }
            }
        }
    }
}

impl Iterator for JobPlanner {
    type Item = Job;

    fn next(&mut self) -> Option<Job> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.is_audio(entry.path()) {
                continue;
            }
            self.stats.audio_files += 1;

            match self.needs_work(entry.path()) {
                Some(true) => {
                    self.stats.planned += 1;
                    return Some(Job::new(
                        entry.into_path(),
                        self.mode,
                        self.romanize,
                        self.embed,
                    ));
                }
                Some(false) => {
                    debug!(path = %entry.path().display(), "already done");
                    self.stats.skipped += 1;
                }
                None => {}
            }
        }
    }
}
