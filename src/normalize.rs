//! Text normalization for comparing local tags with catalog entries.
//!
//! Local tags are messy: track number prefixes, remaster suffixes, featured
//! artists and accents all get in the way of a plain string comparison. The
//! functions here reduce titles and artists to a lowercase ASCII key.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Regex Patterns
// ============================================================================

/// Title suffixes that describe a release rather than the song.
pub static TITLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "- Remastered 2011", "(2009 Remaster)"
        Regex::new(r"(?i)\s*[-–—/]\s*(?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?(?:digital\s+)?remaster(?:ed)?)\s*$").unwrap(),
        Regex::new(r"(?i)\s*[\(\[](?:remaster(?:ed)?(?:\s+\d{4})?|(?:\d{4}\s+)?remaster(?:ed)?(?:\s+version)?)[\)\]]").unwrap(),
        // "(Live at Budokan)", "- Acoustic Version"
        Regex::new(r"(?i)\s*[\(\[](?:live(?:\s+(?:at|from|in)\s+[^)\]]+)?|acoustic(?:\s+version)?|unplugged)[\)\]]").unwrap(),
        Regex::new(r"(?i)\s*[-–—]\s*(?:live(?:\s+(?:at|from|in)\s+.+)?|acoustic(?:\s+version)?)\s*$").unwrap(),
        // "(Deluxe Edition)", "[Bonus Track]"
        Regex::new(r"(?i)\s*[\(\[](?:deluxe|expanded|anniversary|special|bonus(?:\s+track)?)(?:\s+edition)?[\)\]]").unwrap(),
        // "(Radio Edit)", "[Album Version]", "(Mono)"
        Regex::new(r"(?i)\s*[\(\[](?:radio\s+edit|single\s+version|album\s+version|original\s+mix|mono|stereo)[\)\]]").unwrap(),
        Regex::new(r#"(?i)\s*[-–—]\s*(?:radio\s+edit|(?:single|album|lp)\s+version|mono|stereo)\s*$"#).unwrap(),
        // "(Explicit)", "[Clean]"
        Regex::new(r"(?i)\s*[\(\[](?:explicit|clean|censored)[\)\]]").unwrap(),
        // "(feat. Someone)" and bare "feat. Someone"
        Regex::new(r"(?i)\s*[\(\[](?:feat\.?|ft\.?|featuring)\s+[^)\]]+[\)\]]").unwrap(),
        Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+.+$").unwrap(),
        // "(Disc 1)", "[CD 2]"
        Regex::new(r"(?i)\s*[\(\[](?:disc|cd)\s*\d+[\)\]]").unwrap(),
    ]
});

/// "03 - Song", "Track 5. Song", "01_Song"
pub static TRACK_NUMBER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:track\s*)?\d{1,3}\s*[-–—._]\s*").unwrap());

/// "[01] Song"
pub static TRACK_NUMBER_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d{1,2}\]\s*").unwrap());

/// Titles copied from a file name keep their extension.
pub static FILE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:flac|mp3|m4a|ogg|opus|wav)$").unwrap());

/// "(1999)" at the end of a title
pub static YEAR_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d{4}\)\s*$").unwrap());

/// Everything after a featured-artist marker.
pub static ARTIST_FEATURING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring)\s+.*$").unwrap());

/// Separators in multi-artist credits: "A & B", "A, B", "A x B", "A vs. B".
pub static ARTIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:[&/,;+×]|\s(?:x|vs\.?|and|with)\s)\s*").unwrap()
});

pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// Helpers
// ============================================================================

pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Strip accents, then transliterate whatever is left into lowercase ASCII.
/// "Beyoncé" → "beyonce", "Sigur Rós" → "sigur ros"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Straighten curly quotes, spell out ampersands and collapse runs of spaces.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}', '\u{00B4}', '\u{0060}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2010}', '\u{2011}', '\u{2012}'], "-")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

fn strip_article(s: &str) -> &str {
    s.strip_prefix("the ").filter(|rest| rest.len() > 2).unwrap_or(s)
}

// ============================================================================
// Normalization
// ============================================================================

/// Reduce a title to its comparison key.
pub fn normalize_title(title: &str) -> String {
    let mut result = normalize_punctuation(title);
    result = FILE_EXTENSION.replace(&result, "").to_string();
    result = TRACK_NUMBER_PREFIX.replace(&result, "").to_string();
    result = TRACK_NUMBER_BRACKET.replace(&result, "").to_string();
    result = YEAR_SUFFIX.replace(&result, "").to_string();
    for pattern in TITLE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "").to_string();
    }

    let normalized = fold_to_ascii(&result);
    strip_article(normalized.trim()).to_string()
}

/// Reduce an artist credit to its comparison key. Featured artists are
/// dropped; "The Beatles" and "Beatles, The" both become "beatles".
pub fn normalize_artist(artist: &str) -> String {
    let result = normalize_punctuation(artist);
    let result = ARTIST_FEATURING.replace(&result, "");
    let normalized = fold_to_ascii(&result);
    let trimmed = normalized.trim();
    let trimmed = trimmed
        .strip_suffix(", the")
        .or_else(|| trimmed.strip_suffix(" (the)"))
        .unwrap_or(trimmed);
    strip_article(trimmed).to_string()
}

/// First credited artist of a normalized multi-artist string, if there is
/// more than one. "simon and garfunkel" → Some("simon")
pub fn primary_artist(artist_norm: &str) -> Option<&str> {
    let m = ARTIST_SEPARATOR.find(artist_norm)?;
    let primary = artist_norm[..m.start()].trim();
    (primary.len() >= 2).then_some(primary)
}
