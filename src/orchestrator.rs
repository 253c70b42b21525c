//! Fetch orchestration.
//!
//! A fixed pool of worker threads drains one bounded job queue fed by the
//! calling thread. Each worker keeps its own `RunSummary`; the summaries are
//! merged after the pool has joined. A job's failure is recorded and never
//! reaches sibling jobs.

use crossbeam_channel::{bounded, Receiver};
use indicatif::ProgressBar;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::JobError;
use crate::lrc::{parse_body, read_sidecar, serialize_body, write_lrc_atomic};
use crate::lrclib::{fuzzy_query, LyricsLookup};
use crate::models::{Disposition, Job, JobReport, LyricCandidate, Mode, RunSummary, Track};
use crate::planner::JobPlanner;
use crate::progress::{log_progress, LOG_INTERVAL};
use crate::romanize::{Romanizer, Transliterate};
use crate::safety::validate_sidecar_target;
use crate::scoring::select_best;
use crate::tags::AudioTags;

pub const DEFAULT_WORKERS: usize = 10;

/// Shared stop signal. Once set, no new job is started.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Orchestrator<'a, J, K> {
    lookup: &'a dyn LyricsLookup,
    tags: &'a dyn AudioTags,
    romanizer: &'a Romanizer<J, K>,
    stop: StopFlag,
    progress: ProgressBar,
    completed: AtomicU64,
}

impl<'a, J: Transliterate, K: Transliterate> Orchestrator<'a, J, K> {
    pub fn new(
        lookup: &'a dyn LyricsLookup,
        tags: &'a dyn AudioTags,
        romanizer: &'a Romanizer<J, K>,
    ) -> Self {
        Self {
            lookup,
            tags,
            romanizer,
            stop: StopFlag::new(),
            progress: ProgressBar::hidden(),
            completed: AtomicU64::new(0),
        }
    }

    pub fn with_stop(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Jobs finished so far, across every run of this orchestrator.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Pool
    // ------------------------------------------------------------------------

    /// Run every job on `concurrency` workers and return the merged summary.
    pub fn run<I: IntoIterator<Item = Job>>(&self, jobs: I, concurrency: usize) -> RunSummary {
        let workers = concurrency.max(1);
        let (job_tx, job_rx) = bounded::<Job>(workers * 2);

        let mut summary = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|wid| {
                    let rx = job_rx.clone();
                    s.spawn(move || self.worker_loop(wid, rx))
                })
                .collect();
            // Workers that stop early drop their receivers; once all are gone
            // `send` fails and the producer stops too.
            drop(job_rx);

            for job in jobs {
                if self.stop.is_set() || job_tx.send(job).is_err() {
                    break;
                }
            }
            drop(job_tx);

            let mut total = RunSummary::default();
            for h in handles {
                match h.join() {
                    Ok(part) => total.merge(part),
                    Err(_) => error!("worker thread panicked"),
                }
            }
            total
        });

        summary.interrupted |= self.stop.is_set();
        summary
    }

    /// Run the jobs a planner yields. Files the planner found already done
    /// are counted as skipped.
    pub fn run_planned(&self, planner: &mut JobPlanner, concurrency: usize) -> RunSummary {
        let mut summary = self.run(planner.by_ref(), concurrency);
        summary.skipped += planner.stats().skipped;
        summary
    }

    fn worker_loop(&self, worker_id: usize, rx: Receiver<Job>) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Ok(job) = rx.recv() {
            if self.stop.is_set() {
                summary.interrupted = true;
                break;
            }
            let name = file_name(&job.audio_path);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process_job(&job)))
                .unwrap_or_else(|payload| Err(JobError::Internal(panic_message(payload.as_ref()))));
            match outcome {
                Ok(report) => {
                    log_report(worker_id, &name, job.mode, &report);
                    summary.record_report(&job.audio_path, report);
                }
                Err(e) => {
                    warn!(worker = worker_id, "{}: {}", name, e);
                    summary.record_failure(&job.audio_path, e.to_string());
                }
            }
            let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress.inc(1);
            log_progress("lyrics", done, LOG_INTERVAL);
        }
        summary
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    pub fn process_job(&self, job: &Job) -> Result<JobReport, JobError> {
        if job.mode.needs_lookup() {
            self.fetch(job)
        } else {
            self.process_existing(job)
        }
    }

    fn fetch(&self, job: &Job) -> Result<JobReport, JobError> {
        // Another run (or a duplicate job) got there first.
        if job.mode == Mode::FetchMissing && job.sidecar_path.exists() {
            return Ok(JobReport {
                disposition: Disposition::Skipped,
                romanized: false,
                embedded: false,
                embed_error: None,
            });
        }

        let track = self.tags.read_tags(&job.audio_path)?;
        let candidate = self.find_lyrics(&track, job.mode)?.ok_or(JobError::NoMatch)?;
        debug!(
            title = %candidate.title,
            artist = %candidate.artist,
            synced = candidate.is_synced,
            "selected candidate"
        );

        let (body, romanized) = if job.wants_romanize() {
            self.romanize(&candidate.body)
        } else {
            (candidate.body, false)
        };

        validate_sidecar_target(&job.sidecar_path, &job.audio_path)?;
        write_lrc_atomic(&job.sidecar_path, &body)
            .map_err(|e| JobError::io(&job.sidecar_path, e))?;
        let (embedded, embed_error) = self.embed(job, &body);

        let disposition = match job.mode {
            Mode::ScanUnsynced => Disposition::Upgraded,
            _ => Disposition::Downloaded,
        };
        Ok(JobReport {
            disposition,
            romanized,
            embedded,
            embed_error,
        })
    }

    fn process_existing(&self, job: &Job) -> Result<JobReport, JobError> {
        let original =
            read_sidecar(&job.sidecar_path).map_err(|e| JobError::io(&job.sidecar_path, e))?;

        let (body, romanized) = self.romanize(&original);
        if romanized {
            validate_sidecar_target(&job.sidecar_path, &job.audio_path)?;
            write_lrc_atomic(&job.sidecar_path, &body)
                .map_err(|e| JobError::io(&job.sidecar_path, e))?;
        }
        let (embedded, embed_error) = self.embed(job, &body);

        let disposition = if romanized || embedded {
            Disposition::Processed
        } else {
            Disposition::Skipped
        };
        Ok(JobReport {
            disposition,
            romanized,
            embedded,
            embed_error,
        })
    }

    /// Exact lookup first; when it yields nothing acceptable, rank the exact
    /// result together with a fuzzy search.
    pub fn find_lyrics(&self, track: &Track, mode: Mode) -> Result<Option<LyricCandidate>, JobError> {
        let mut candidates = Vec::new();
        match self.lookup.lookup_exact(
            &track.title,
            &track.artist,
            track.album.as_deref(),
            track.duration_secs,
        ) {
            Ok(Some(c)) => candidates.push(c),
            Ok(None) => {}
            Err(e) => warn!("exact lookup failed for {} - {}: {}", track.artist, track.title, e),
        }
        if let Some(best) = select_best(track, &candidates, mode) {
            return Ok(Some(best.clone()));
        }

        debug!(title = %track.title, "exact match failed, trying fuzzy search");
        candidates.extend(self.lookup.lookup_fuzzy(&fuzzy_query(track))?);
        Ok(select_best(track, &candidates, mode).cloned())
    }

    /// Romanize a body; the flag says whether anything changed.
    fn romanize(&self, body: &str) -> (String, bool) {
        let result = self.romanizer.romanize_body(&parse_body(body));
        if result.changed {
            (serialize_body(&result.lines), true)
        } else {
            (body.to_string(), false)
        }
    }

    /// Embed the final body. A failure here does not undo the sidecar
    /// already written; it is returned as a reason next to the report.
    fn embed(&self, job: &Job, body: &str) -> (bool, Option<String>) {
        if !job.embed {
            return (false, None);
        }
        match self.tags.embed_lyrics(&job.audio_path, body) {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job panicked".to_string()
    }
}

fn log_report(worker_id: usize, name: &str, mode: Mode, report: &JobReport) {
    let what = match (report.disposition, mode) {
        (Disposition::Downloaded, _) => "downloaded",
        (Disposition::Upgraded, _) => "upgraded to synced",
        (Disposition::Processed, _) => "processed",
        (Disposition::Skipped, Mode::ProcessExisting) => "unchanged",
        (Disposition::Skipped, _) => "already has lyrics",
    };
    info!(
        worker = worker_id,
        romanized = report.romanized,
        embedded = report.embedded,
        "{}: {}",
        name,
        what
    );
    if let Some(reason) = &report.embed_error {
        warn!(worker = worker_id, "{}: lyrics written but not embedded: {}", name, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LookupError, TagError, TransliterationError};
    use crate::script::ScriptFamily;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;

    // --- Fakes ---

    /// Every track is "<stem>" by "Artist", 200 s long. Stems starting with
    /// "corrupt" are unreadable and stems starting with "boom" panic.
    #[derive(Default)]
    struct FakeTags {
        embedded: Mutex<Vec<PathBuf>>,
        embed_fails: bool,
    }

    impl AudioTags for FakeTags {
        fn read_tags(&self, path: &Path) -> Result<Track, TagError> {
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if title.starts_with("boom") {
                panic!("tag parser blew up on {}", title);
            }
            if title.starts_with("corrupt") {
                return Err(TagError::Unreadable {
                    path: path.to_path_buf(),
                    reason: "bad header".into(),
                });
            }
            Ok(Track {
                path: path.to_path_buf(),
                title,
                artist: "Artist".into(),
                album: None,
                duration_secs: 200,
            })
        }

        fn embed_lyrics(&self, path: &Path, _body: &str) -> Result<(), TagError> {
            if self.embed_fails {
                return Err(TagError::Embed {
                    path: path.to_path_buf(),
                    reason: "read-only file".into(),
                });
            }
            self.embedded.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLookup {
        exact: Option<LyricCandidate>,
        exact_fails: bool,
        fuzzy: Vec<LyricCandidate>,
        fuzzy_fails: bool,
        fuzzy_calls: Mutex<usize>,
    }

    impl LyricsLookup for FakeLookup {
        fn lookup_exact(
            &self,
            title: &str,
            artist: &str,
            _album: Option<&str>,
            duration_secs: u32,
        ) -> Result<Option<LyricCandidate>, LookupError> {
            if self.exact_fails {
                return Err(LookupError::Network("connection reset".into()));
            }
            Ok(self.exact.clone().map(|mut c| {
                // Echo the requested identity so every track matches.
                if c.title.is_empty() {
                    c.title = title.to_string();
                    c.artist = artist.to_string();
                    c.duration_secs = duration_secs;
                }
                c
            }))
        }

        fn lookup_fuzzy(&self, _query: &str) -> Result<Vec<LyricCandidate>, LookupError> {
            *self.fuzzy_calls.lock().unwrap() += 1;
            if self.fuzzy_fails {
                return Err(LookupError::Service { status: 503 });
            }
            Ok(self.fuzzy.clone())
        }
    }

    struct Upper;

    impl Transliterate for Upper {
        fn can_handle(&self, _: ScriptFamily) -> bool {
            true
        }

        fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
            Ok(text.chars().map(|_| 'X').collect())
        }
    }

    fn synced(body: &str) -> LyricCandidate {
        LyricCandidate {
            title: String::new(),
            artist: String::new(),
            album: None,
            duration_secs: 0,
            is_synced: true,
            body: body.into(),
        }
    }

    fn romanizer() -> Romanizer<Upper, Upper> {
        Romanizer::new(Upper, Upper)
    }

    // --- Tests ---

    #[test]
    fn test_concurrent_run_accounts_every_job() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[00:01.00] la")),
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let jobs: Vec<Job> = (0..100)
            .map(|i| {
                let name = if i % 10 == 0 {
                    format!("corrupt{:03}.flac", i)
                } else {
                    format!("{:03}.flac", i)
                };
                Job::new(dir.path().join(name), Mode::FetchMissing, false, false)
            })
            .collect();

        let summary = orch.run(jobs, 8);
        assert_eq!(summary.files_accounted(), 100);
        assert_eq!(summary.downloaded, 90);
        assert_eq!(summary.failed, 10);
        assert_eq!(summary.failures.len(), 10);
        assert!(!summary.interrupted);
        assert!(dir.path().join("001.lrc").exists());
        assert_eq!(orch.completed(), 100);
    }

    #[test]
    fn test_stop_flag_prevents_new_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[00:01.00] la")),
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let stop = StopFlag::new();
        stop.set();
        let orch = Orchestrator::new(&lookup, &tags, &r).with_stop(stop);

        let jobs = (0..20).map(|i| {
            Job::new(
                dir.path().join(format!("{}.flac", i)),
                Mode::FetchMissing,
                false,
                false,
            )
        });
        let summary = orch.run(jobs, 4);
        assert!(summary.interrupted);
        assert_eq!(summary.files_accounted(), 0);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_exact_error_falls_back_to_fuzzy() {
        let dir = tempfile::tempdir().unwrap();
        let mut found = synced("[00:01.00] fuzzy");
        found.title = "Song".into();
        found.artist = "Artist".into();
        found.duration_secs = 201;
        let lookup = FakeLookup {
            exact_fails: true,
            fuzzy: vec![found],
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, false, false);
        let report = orch.process_job(&job).unwrap();
        assert_eq!(report.disposition, Disposition::Downloaded);
        assert_eq!(
            fs::read_to_string(&job.sidecar_path).unwrap(),
            "[00:01.00] fuzzy"
        );
    }

    #[test]
    fn test_fuzzy_error_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            fuzzy_fails: true,
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, false, false);
        let err = orch.process_job(&job).unwrap_err();
        assert_eq!(err.to_string(), "service returned HTTP 503");
        assert!(!job.sidecar_path.exists());
    }

    #[test]
    fn test_exact_hit_skips_fuzzy() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[00:01.00] la")),
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, false, false);
        orch.process_job(&job).unwrap();
        assert_eq!(*lookup.fuzzy_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_romanize_and_embed_on_download() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[ar:歌手]\n[00:01.00] 愛 love")),
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, true, true);
        let report = orch.process_job(&job).unwrap();
        assert!(report.romanized);
        assert!(report.embedded);
        assert_eq!(
            fs::read_to_string(&job.sidecar_path).unwrap(),
            "[ar:歌手]\n[00:01.00] X love"
        );
        assert_eq!(tags.embedded.lock().unwrap().as_slice(), &[job.audio_path.clone()]);
    }

    #[test]
    fn test_fetch_missing_skips_sidecar_that_appeared() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup::default();
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, false, false);
        fs::write(&job.sidecar_path, "mine").unwrap();
        let report = orch.process_job(&job).unwrap();
        assert_eq!(report.disposition, Disposition::Skipped);
        assert_eq!(fs::read_to_string(&job.sidecar_path).unwrap(), "mine");
    }

    #[test]
    fn test_process_existing() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup::default();
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let cjk = Job::new(dir.path().join("a.flac"), Mode::ProcessExisting, false, false);
        fs::write(&cjk.sidecar_path, "[00:01.00] 사랑\n").unwrap();
        let report = orch.process_job(&cjk).unwrap();
        assert_eq!(report.disposition, Disposition::Processed);
        assert!(report.romanized);
        assert_eq!(
            fs::read_to_string(&cjk.sidecar_path).unwrap(),
            "[00:01.00] XX\n"
        );

        let latin = Job::new(dir.path().join("b.flac"), Mode::ProcessExisting, false, false);
        fs::write(&latin.sidecar_path, "[00:01.00] love\n").unwrap();
        let report = orch.process_job(&latin).unwrap();
        assert_eq!(report.disposition, Disposition::Skipped);

        let embed = Job::new(dir.path().join("b.flac"), Mode::ProcessExisting, false, true);
        let report = orch.process_job(&embed).unwrap();
        assert_eq!(report.disposition, Disposition::Processed);
        assert!(report.embedded);
        assert_eq!(*lookup.fuzzy_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_panicking_job_is_recorded_and_siblings_kept() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[00:01.00] la")),
            ..Default::default()
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        // One worker, so the panic lands on the thread that did the other jobs.
        let jobs: Vec<Job> = (0..20)
            .map(|i| {
                let name = if i == 19 {
                    "boom.flac".to_string()
                } else {
                    format!("{:02}.flac", i)
                };
                Job::new(dir.path().join(name), Mode::FetchMissing, false, false)
            })
            .collect();

        let summary = orch.run(jobs, 1);
        assert_eq!(summary.files_accounted(), 20);
        assert_eq!(summary.downloaded, 19);
        assert_eq!(summary.failed, 1);
        assert!(summary.failures[0].reason.starts_with("internal error: tag parser blew up"));
        assert_eq!(orch.completed(), 20);
    }

    #[test]
    fn test_embed_failure_keeps_download() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = FakeLookup {
            exact: Some(synced("[00:01.00] la")),
            ..Default::default()
        };
        let tags = FakeTags {
            embed_fails: true,
            ..Default::default()
        };
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r);

        let job = Job::new(dir.path().join("Song.flac"), Mode::FetchMissing, false, true);
        let summary = orch.run(vec![job.clone()], 2);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.embedded, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.embed_failures.len(), 1);
        assert_eq!(summary.embed_failures[0].path, job.audio_path);
        assert!(summary.embed_failures[0].reason.contains("read-only file"));
        assert!(job.sidecar_path.exists());
    }

    /// Sets the stop flag from inside the lookup of the `trigger`-th job.
    struct StoppingLookup {
        stop: StopFlag,
        calls: Mutex<usize>,
        trigger: usize,
    }

    impl LyricsLookup for StoppingLookup {
        fn lookup_exact(
            &self,
            title: &str,
            artist: &str,
            _album: Option<&str>,
            duration_secs: u32,
        ) -> Result<Option<LyricCandidate>, LookupError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.trigger {
                self.stop.set();
            }
            let mut c = synced("[00:01.00] la");
            c.title = title.to_string();
            c.artist = artist.to_string();
            c.duration_secs = duration_secs;
            Ok(Some(c))
        }

        fn lookup_fuzzy(&self, _query: &str) -> Result<Vec<LyricCandidate>, LookupError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_stop_mid_run_finishes_in_flight_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopFlag::new();
        let lookup = StoppingLookup {
            stop: stop.clone(),
            calls: Mutex::new(0),
            trigger: 3,
        };
        let tags = FakeTags::default();
        let r = romanizer();
        let orch = Orchestrator::new(&lookup, &tags, &r).with_stop(stop);

        let jobs = (0..50).map(|i| {
            Job::new(
                dir.path().join(format!("{:02}.flac", i)),
                Mode::FetchMissing,
                false,
                false,
            )
        });
        let summary = orch.run(jobs, 2);

        assert!(summary.interrupted);
        assert!(summary.downloaded >= 3);
        assert!(summary.files_accounted() < 50);
        assert_eq!(summary.failed, 0);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{:?}", names);
        // Every job that started also finished its sidecar.
        assert_eq!(names.len(), summary.downloaded);
        assert_eq!(*lookup.calls.lock().unwrap(), summary.downloaded);
    }
}
