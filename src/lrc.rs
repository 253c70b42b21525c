//! LRC line parsing and sidecar I/O.
//!
//! Parsing never normalizes anything: the timestamp token and the text after
//! it are kept verbatim so that serializing a parsed line gives back the
//! original bytes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Leading time tag: `[mm:ss.xx]`, also `[mm:ss.xxx]` and `[mm:ss]`.
static TIME_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(\d{2,}):(\d{2})(?:\.(\d{2,3}))?\]").unwrap());

/// Header tags such as `[ar:Artist]` or `[length: 03:20]`.
static HEADER_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[A-Za-z]+:").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub millis: u64,
    /// The tag exactly as it appeared, brackets included.
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimedLine {
    Synced { stamp: Timestamp, text: String },
    Plain { text: String },
    /// Header tag line, kept as-is.
    Tag { raw: String },
}

impl TimedLine {
    pub fn timestamp(&self) -> Option<&Timestamp> {
        match self {
            TimedLine::Synced { stamp, .. } => Some(stamp),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            TimedLine::Plain { text } => text.trim().is_empty(),
            _ => false,
        }
    }
}

fn parse_time_tag(raw: &str) -> Option<Timestamp> {
    let caps = TIME_TAG.captures(raw)?;
    let minutes: u64 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(2)?.as_str().parse().ok()?;
    let fraction = match caps.get(3) {
        Some(m) if m.as_str().len() == 2 => m.as_str().parse::<u64>().ok()? * 10,
        Some(m) => m.as_str().parse::<u64>().ok()?,
        None => 0,
    };
    // A stamp too large for u64 milliseconds is not a timestamp.
    let millis = minutes
        .checked_mul(60_000)?
        .checked_add(seconds * 1_000 + fraction)?;
    Some(Timestamp {
        millis,
        token: caps.get(0)?.as_str().to_string(),
    })
}

pub fn parse_line(raw: &str) -> TimedLine {
    if let Some(stamp) = parse_time_tag(raw) {
        let text = raw[stamp.token.len()..].to_string();
        return TimedLine::Synced { stamp, text };
    }
    if HEADER_TAG.is_match(raw) {
        return TimedLine::Tag {
            raw: raw.to_string(),
        };
    }
    TimedLine::Plain {
        text: raw.to_string(),
    }
}

pub fn serialize(line: &TimedLine) -> String {
    match line {
        TimedLine::Synced { stamp, text } => format!("{}{}", stamp.token, text),
        TimedLine::Plain { text } => text.clone(),
        TimedLine::Tag { raw } => raw.clone(),
    }
}

/// Split on `'\n'` only, so `\r` and a trailing newline survive the round trip.
pub fn parse_body(body: &str) -> Vec<TimedLine> {
    body.split('\n').map(parse_line).collect()
}

pub fn serialize_body(lines: &[TimedLine]) -> String {
    lines.iter().map(serialize).collect::<Vec<_>>().join("\n")
}

/// A body is synced when every line with lyric content carries a timestamp.
/// Blank lines and header tags don't count either way; a body without any
/// timestamp is unsynced.
pub fn is_synced(lines: &[TimedLine]) -> bool {
    let mut saw_stamp = false;
    for line in lines {
        match line {
            TimedLine::Synced { .. } => saw_stamp = true,
            TimedLine::Tag { .. } => {}
            TimedLine::Plain { .. } if line.is_blank() => {}
            TimedLine::Plain { .. } => return false,
        }
    }
    saw_stamp
}

pub fn is_synced_body(body: &str) -> bool {
    is_synced(&parse_body(body))
}

// --- IO helpers ---

pub fn read_sidecar(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Write through a temporary sibling and rename it into place, so readers
/// and interrupted runs never see a half-written sidecar.
pub fn write_lrc_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("lrc.tmp");
    let result = (|| -> std::io::Result<()> {
        let f = fs::File::create(&tmp)?;
        let mut w = BufWriter::new(f);
        w.write_all(contents.as_bytes())?;
        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
