//! Script classification.
//!
//! Splits text into runs of CJK and non-CJK characters by Unicode block.
//! Concatenating the runs in order always reproduces the input exactly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    LatinOrOther,
    Cjk,
}

/// Backend family for a CJK character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFamily {
    /// Hiragana, katakana and Han ideographs.
    Japanese,
    /// Hangul syllables and jamo.
    Korean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRun<'a> {
    pub kind: ScriptKind,
    pub text: &'a str,
}

pub fn is_kana(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x309F      // Hiragana
        | 0x30A0..=0x30FF    // Katakana
        | 0x31F0..=0x31FF)   // Katakana Phonetic Extensions
}

pub fn is_han(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // Extension A
        | 0x20000..=0x2EBEF  // Extensions B-F
        | 0x30000..=0x323AF) // Extensions G-H
}

pub fn is_hangul(c: char) -> bool {
    matches!(c as u32,
        0xAC00..=0xD7AF      // Hangul Syllables
        | 0x1100..=0x11FF    // Hangul Jamo
        | 0x3130..=0x318F    // Hangul Compatibility Jamo
        | 0xA960..=0xA97F    // Jamo Extended-A
        | 0xD7B0..=0xD7FF)   // Jamo Extended-B
}

/// Punctuation that lives inside the kana blocks.
fn is_block_punctuation(c: char) -> bool {
    matches!(c, '\u{30A0}' | '\u{30FB}')
}

pub fn script_family(c: char) -> Option<ScriptFamily> {
    if c.is_whitespace() || is_block_punctuation(c) {
        None
    } else if is_hangul(c) {
        Some(ScriptFamily::Korean)
    } else if is_kana(c) || is_han(c) {
        Some(ScriptFamily::Japanese)
    } else {
        None
    }
}

pub fn kind_of(c: char) -> ScriptKind {
    if script_family(c).is_some() {
        ScriptKind::Cjk
    } else {
        ScriptKind::LatinOrOther
    }
}

/// Segment `text` into maximal runs of equal kind.
pub fn classify(text: &str) -> Vec<ScriptRun<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<ScriptKind> = None;

    for (idx, c) in text.char_indices() {
        let kind = kind_of(c);
        match current {
            Some(k) if k == kind => {}
            Some(k) => {
                runs.push(ScriptRun {
                    kind: k,
                    text: &text[start..idx],
                });
                start = idx;
                current = Some(kind);
            }
            None => current = Some(kind),
        }
    }

    if let Some(kind) = current {
        runs.push(ScriptRun {
            kind,
            text: &text[start..],
        });
    }
    runs
}

/// Split a CJK run where it switches between Japanese and Korean characters.
/// Characters without a family stay attached to the segment they follow.
pub fn split_by_family(run: &str) -> Vec<(ScriptFamily, &str)> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut current: Option<ScriptFamily> = None;

    for (idx, c) in run.char_indices() {
        let Some(family) = script_family(c) else {
            continue;
        };
        match current {
            Some(f) if f == family => {}
            Some(f) => {
                segments.push((f, &run[start..idx]));
                start = idx;
                current = Some(family);
            }
            None => current = Some(family),
        }
    }

    if let Some(family) = current {
        segments.push((family, &run[start..]));
    }
    segments
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| kind_of(c) == ScriptKind::Cjk)
}
