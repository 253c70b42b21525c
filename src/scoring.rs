//! Candidate ranking.
//!
//! Picks the catalog entry that best matches a local track. Duration is the
//! primary discriminator because catalog titles and artists are noisy; text
//! similarity only orders candidates that already agree on duration.

use rustc_hash::FxHashSet;
use strsim::normalized_levenshtein;

use crate::models::{LyricCandidate, Mode, Track};
use crate::normalize::{normalize_artist, normalize_title, primary_artist};

// ============================================================================
// Thresholds
// ============================================================================

/// Candidates further than this from the target duration are never accepted.
pub const DURATION_TOLERANCE_SECS: u32 = 2;

/// Upper bound of the text component of a score.
pub const TEXT_SCORE_MAX: i32 = 30;

/// Without a target duration nothing anchors a fuzzy match, so text has to.
pub const MIN_SIMILARITY_WITHOUT_DURATION: f64 = 0.8;

const TITLE_WEIGHT: f64 = 0.6;
const ARTIST_WEIGHT: f64 = 0.4;

// ============================================================================
// Duration Scoring
// ============================================================================

pub fn duration_diff(target_secs: u32, candidate_secs: u32) -> u32 {
    target_secs.abs_diff(candidate_secs)
}

/// Score by absolute duration difference; `None` outside the tolerance.
pub fn duration_score(target_secs: u32, candidate_secs: u32) -> Option<i32> {
    match duration_diff(target_secs, candidate_secs) {
        0 => Some(100),
        1 => Some(60),
        2 => Some(20),
        _ => None,
    }
}

// ============================================================================
// Text Similarity
// ============================================================================

/// Jaccard similarity over word tokens of two normalized artist names.
pub fn compute_artist_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let tokens_a: FxHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: FxHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f64 / union as f64
}

fn artist_similarity(target: &str, candidate: &str) -> f64 {
    let a = normalize_artist(target);
    let b = normalize_artist(candidate);
    let mut best = compute_artist_similarity(&a, &b).max(normalized_levenshtein(&a, &b));
    // "Simon & Garfunkel" tagged locally, "Simon" in the catalog, or the reverse.
    for (x, y) in [(primary_artist(&a), Some(b.as_str())), (Some(a.as_str()), primary_artist(&b))] {
        if let (Some(x), Some(y)) = (x, y) {
            if x == y {
                best = best.max(0.9);
            }
        }
    }
    best
}

/// Weighted title/artist similarity in `0.0..=1.0`.
pub fn text_similarity(target: &Track, candidate: &LyricCandidate) -> f64 {
    let title = normalized_levenshtein(
        &normalize_title(&target.title),
        &normalize_title(&candidate.title),
    );
    let artist = artist_similarity(&target.artist, &candidate.artist);
    TITLE_WEIGHT * title + ARTIST_WEIGHT * artist
}

fn text_score(similarity: f64) -> i32 {
    (similarity * TEXT_SCORE_MAX as f64).round() as i32
}

// ============================================================================
// Selection
// ============================================================================

fn is_exact(target: &Track, candidate: &LyricCandidate) -> bool {
    target.title.trim().to_lowercase() == candidate.title.trim().to_lowercase()
        && target.artist.trim().to_lowercase() == candidate.artist.trim().to_lowercase()
}

fn within_tolerance(target: &Track, candidate: &LyricCandidate) -> bool {
    !target.has_duration()
        || duration_diff(target.duration_secs, candidate.duration_secs) <= DURATION_TOLERANCE_SECS
}

fn eligible(mode: Mode, candidate: &LyricCandidate) -> bool {
    mode != Mode::ScanUnsynced || candidate.is_synced
}

/// Fuzzy score of one candidate, `None` when it must not be accepted.
pub fn score_candidate(target: &Track, candidate: &LyricCandidate) -> Option<i32> {
    let similarity = text_similarity(target, candidate);
    if !target.has_duration() {
        return (similarity >= MIN_SIMILARITY_WITHOUT_DURATION).then(|| text_score(similarity));
    }
    let duration = duration_score(target.duration_secs, candidate.duration_secs)?;
    Some(duration + text_score(similarity))
}

/// Pick the best candidate for `target`, or `None` when nothing is close
/// enough to attach without risking the wrong song's lyrics.
pub fn select_best<'a>(
    target: &Track,
    candidates: &'a [LyricCandidate],
    mode: Mode,
) -> Option<&'a LyricCandidate> {
    let exact: Vec<&LyricCandidate> = candidates
        .iter()
        .filter(|c| eligible(mode, c) && is_exact(target, c) && within_tolerance(target, c))
        .collect();
    if let Some(&found) = exact.iter().find(|c| c.is_synced).or(exact.first()) {
        return Some(found);
    }

    let mut best: Option<(i32, &LyricCandidate)> = None;
    for candidate in candidates.iter().filter(|c| eligible(mode, c)) {
        let Some(score) = score_candidate(target, candidate) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((s, b)) => score > s || (score == s && candidate.is_synced && !b.is_synced),
        };
        if better {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, c)| c)
}
