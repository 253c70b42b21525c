//! Progress display.
//!
//! The library walk is lazy, so the total number of jobs is unknown while
//! they run: progress is a spinner with a running count. In log-only mode the
//! spinner is hidden and a periodic log line takes its place.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

/// How often, in finished jobs, log-only mode reports progress.
pub const LOG_INTERVAL: u64 = 100;

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Spinner counting finished files. Hidden in log-only mode.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        let style = ProgressStyle::default_spinner()
            .template("{msg} {spinner} {pos} files [{elapsed_precise}] ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log a progress line every `interval` finished jobs, in log-only mode only.
pub fn log_progress(phase: &str, current: u64, interval: u64) {
    if is_log_only() && interval > 0 && current % interval == 0 {
        info!("[{}] {} files done", phase, current);
    }
}
