//! Korean backend: Revised Romanization, syllable by syllable.

use any_ascii::any_ascii_char;

use super::Transliterate;
use crate::error::TransliterationError;
use crate::script::{is_hangul, ScriptFamily};

pub struct KoreanBackend;

impl KoreanBackend {
    pub fn load() -> Self {
        KoreanBackend
    }
}

impl Transliterate for KoreanBackend {
    fn can_handle(&self, family: ScriptFamily) -> bool {
        family == ScriptFamily::Korean
    }

    fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
        let mut out = String::with_capacity(text.len() * 2);
        for c in text.chars() {
            if !is_hangul(c) {
                return Err(TransliterationError::Unsupported(c));
            }
            let romanized = any_ascii_char(c);
            if romanized.is_empty() {
                return Err(TransliterationError::Unsupported(c));
            }
            out.push_str(&romanized.to_lowercase());
        }
        Ok(out)
    }
}
