//! Transliteration engine.
//!
//! Rewrites the CJK runs of a lyric line into Latin script and leaves every
//! other byte alone: timestamps, header tags, spacing and punctuation come
//! out exactly as they went in. A run that its backend cannot convert is kept
//! verbatim and reported as a warning.

pub mod japanese;
pub mod korean;
pub mod shared;

use tracing::warn;

use crate::error::TransliterationError;
use crate::lrc::TimedLine;
use crate::script::{classify, contains_cjk, split_by_family, ScriptFamily, ScriptKind};

pub use japanese::JapaneseBackend;
pub use korean::KoreanBackend;
pub use shared::{BackendSlot, Shared, JAPANESE, KOREAN};

/// A language-specific converter from CJK text to Latin script.
pub trait Transliterate: Send + Sync {
    fn can_handle(&self, family: ScriptFamily) -> bool;
    fn transliterate(&self, text: &str) -> Result<String, TransliterationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransliterationWarning {
    pub family: ScriptFamily,
    /// The segment that was kept unchanged.
    pub text: String,
    pub reason: TransliterationError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomanizedBody {
    pub lines: Vec<TimedLine>,
    pub warnings: Vec<TransliterationWarning>,
    /// Whether any line differs from its input.
    pub changed: bool,
}

/// Routes each CJK segment to the Japanese or Korean backend.
pub struct Romanizer<J, K> {
    japanese: J,
    korean: K,
}

/// The romanizer used by the CLI, backed by the process-wide instances.
pub type DefaultRomanizer = Romanizer<Shared<JapaneseBackend>, Shared<KoreanBackend>>;

impl DefaultRomanizer {
    pub fn shared() -> Self {
        Romanizer::new(Shared(&JAPANESE), Shared(&KOREAN))
    }
}

impl<J: Transliterate, K: Transliterate> Romanizer<J, K> {
    pub fn new(japanese: J, korean: K) -> Self {
        Self { japanese, korean }
    }

    fn convert(&self, family: ScriptFamily, segment: &str) -> Result<String, TransliterationError> {
        let backend: &dyn Transliterate = match family {
            ScriptFamily::Japanese => &self.japanese,
            ScriptFamily::Korean => &self.korean,
        };
        if !backend.can_handle(family) {
            return Err(TransliterationError::WrongFamily(family));
        }
        backend.transliterate(segment)
    }

    /// Romanize free text. Non-CJK runs are copied through untouched.
    pub fn romanize_text(&self, text: &str, warnings: &mut Vec<TransliterationWarning>) -> String {
        if !contains_cjk(text) {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        for run in classify(text) {
            if run.kind == ScriptKind::LatinOrOther {
                out.push_str(run.text);
                continue;
            }
            for (family, segment) in split_by_family(run.text) {
                match self.convert(family, segment) {
                    Ok(latin) => out.push_str(&latin),
                    Err(reason) => {
                        out.push_str(segment);
                        warnings.push(TransliterationWarning {
                            family,
                            text: segment.to_string(),
                            reason,
                        });
                    }
                }
            }
        }
        out
    }

    /// Romanize one line. Header tags and timestamps are never rewritten.
    pub fn romanize_line(
        &self,
        line: &TimedLine,
        warnings: &mut Vec<TransliterationWarning>,
    ) -> TimedLine {
        match line {
            TimedLine::Synced { stamp, text } => TimedLine::Synced {
                stamp: stamp.clone(),
                text: self.romanize_text(text, warnings),
            },
            TimedLine::Plain { text } => TimedLine::Plain {
                text: self.romanize_text(text, warnings),
            },
            TimedLine::Tag { .. } => line.clone(),
        }
    }

    pub fn romanize_body(&self, lines: &[TimedLine]) -> RomanizedBody {
        let mut warnings = Vec::new();
        let out: Vec<TimedLine> = lines
            .iter()
            .map(|line| self.romanize_line(line, &mut warnings))
            .collect();
        let changed = out != lines;
        for w in &warnings {
            warn!(family = ?w.family, segment = %w.text, "kept untransliterated: {}", w.reason);
        }
        RomanizedBody {
            lines: out,
            warnings,
            changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lrc::{parse_body, parse_line, serialize, serialize_body};
    use crate::script::script_family;
    use proptest::prelude::*;

    /// Replaces every character with `j` or `k` so routing is visible.
    struct Marker {
        family: ScriptFamily,
        ch: char,
    }

    impl Transliterate for Marker {
        fn can_handle(&self, family: ScriptFamily) -> bool {
            family == self.family
        }

        fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
            Ok(text.chars().map(|_| self.ch).collect())
        }
    }

    struct Failing;

    impl Transliterate for Failing {
        fn can_handle(&self, _: ScriptFamily) -> bool {
            true
        }

        fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
            Err(TransliterationError::Unsupported(
                text.chars().next().unwrap_or(' '),
            ))
        }
    }

    fn markers() -> Romanizer<Marker, Marker> {
        Romanizer::new(
            Marker {
                family: ScriptFamily::Japanese,
                ch: 'j',
            },
            Marker {
                family: ScriptFamily::Korean,
                ch: 'k',
            },
        )
    }

    #[test]
    fn test_routes_segments_by_family() {
        let mut warnings = Vec::new();
        let out = markers().romanize_text("A 愛사랑, b", &mut warnings);
        assert_eq!(out, "A jkk, b");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_timestamp_and_tags_untouched() {
        let r = markers();
        let mut warnings = Vec::new();
        let line = r.romanize_line(&parse_line("[00:12.34] 君と"), &mut warnings);
        assert_eq!(serialize(&line), "[00:12.34] jj");

        let tag = parse_line("[ar:宇多田]");
        assert_eq!(r.romanize_line(&tag, &mut warnings), tag);
    }

    #[test]
    fn test_failed_segment_is_kept_with_warning() {
        let r = Romanizer::new(
            Failing,
            Marker {
                family: ScriptFamily::Korean,
                ch: 'k',
            },
        );
        let mut warnings = Vec::new();
        let out = r.romanize_text("x 愛 사랑", &mut warnings);
        assert_eq!(out, "x 愛 kk");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].family, ScriptFamily::Japanese);
        assert_eq!(warnings[0].text, "愛");
    }

    #[test]
    fn test_backend_refusing_family_passes_through() {
        // Korean backend wired into the Japanese slot.
        let r = Romanizer::new(
            Marker {
                family: ScriptFamily::Korean,
                ch: 'k',
            },
            Marker {
                family: ScriptFamily::Korean,
                ch: 'k',
            },
        );
        let mut warnings = Vec::new();
        assert_eq!(r.romanize_text("あい", &mut warnings), "あい");
        assert_eq!(
            warnings[0].reason,
            TransliterationError::WrongFamily(ScriptFamily::Japanese)
        );
    }

    #[test]
    fn test_romanize_body_reports_change() {
        let r = markers();
        let body = parse_body("[ti:x]\n[00:01.00] hello\n[00:02.00] 愛");
        let result = r.romanize_body(&body);
        assert!(result.changed);
        assert_eq!(
            serialize_body(&result.lines),
            "[ti:x]\n[00:01.00] hello\n[00:02.00] j"
        );

        let latin = parse_body("[00:01.00] hello\n[00:02.00] world");
        assert!(!r.romanize_body(&latin).changed);
    }

    #[test]
    fn test_shared_romanizer_end_to_end() {
        let r = DefaultRomanizer::shared();
        let body = parse_body("[00:01.00] さくら 사랑");
        let out = r.romanize_body(&body);
        assert_eq!(serialize_body(&out.lines), "[00:01.00] sakura sarang");
        assert!(out.warnings.is_empty());
    }

    /// Markers outside the generated alphabet, so backend output is visible.
    fn symbol_markers() -> Romanizer<Marker, Marker> {
        Romanizer::new(
            Marker {
                family: ScriptFamily::Japanese,
                ch: '#',
            },
            Marker {
                family: ScriptFamily::Korean,
                ch: '@',
            },
        )
    }

    /// Maximal runs of `s` that contain no marker character.
    fn unmarked_runs(s: &str) -> Vec<String> {
        let mut runs = Vec::new();
        let mut current = String::new();
        for c in s.chars() {
            if c == '#' || c == '@' {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }

    proptest! {
        #[test]
        fn test_non_cjk_runs_keep_count_and_order(text in "[a-z ,.あ-ん가-힣一-龯]*") {
            let mut warnings = Vec::new();
            let out = symbol_markers().romanize_text(&text, &mut warnings);

            let latin: Vec<String> = classify(&text)
                .into_iter()
                .filter(|run| run.kind == ScriptKind::LatinOrOther)
                .map(|run| run.text.to_string())
                .collect();
            prop_assert_eq!(unmarked_runs(&out), latin);

            let cjk_chars = text.chars().filter(|c| script_family(*c).is_some()).count();
            let marker_chars = out.chars().filter(|c| *c == '#' || *c == '@').count();
            prop_assert_eq!(marker_chars, cjk_chars);
            prop_assert!(warnings.is_empty());
        }

        #[test]
        fn test_cjk_free_lines_are_unchanged(raw in "[^\n\u{3040}-\u{30FF}\u{3400}-\u{9FFF}\u{AC00}-\u{D7AF}\u{1100}-\u{11FF}\u{3130}-\u{318F}]*") {
            let r = markers();
            let line = parse_line(&raw);
            let mut warnings = Vec::new();
            let out = r.romanize_line(&line, &mut warnings);
            prop_assert_eq!(serialize(&out), raw);
        }

        #[test]
        fn test_timestamp_survives(mm in 0u32..100, ss in 0u32..60, text in "[あ-ん가-힣a-z ]*") {
            let raw = format!("[{:02}:{:02}.00]{}", mm, ss, text);
            let line = parse_line(&raw);
            let mut warnings = Vec::new();
            let out = markers().romanize_line(&line, &mut warnings);
            prop_assert_eq!(out.timestamp(), line.timestamp());
        }
    }
}
