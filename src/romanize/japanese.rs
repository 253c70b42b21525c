//! Japanese backend: modified Hepburn over kana. Segments containing Han
//! ideographs are first rewritten to hiragana with kakasi's dictionary
//! readings, so kanji come out with their Japanese reading.

use rustc_hash::FxHashMap;
use std::borrow::Cow;
use unicode_normalization::UnicodeNormalization;

use super::Transliterate;
use crate::error::TransliterationError;
use crate::script::{is_han, ScriptFamily};

// ============================================================================
// Kana Table
// ============================================================================

/// Hiragana syllables. Katakana is folded onto hiragana before lookup.
const MONOGRAPHS: &[(&str, &str)] = &[
    ("あ", "a"), ("い", "i"), ("う", "u"), ("え", "e"), ("お", "o"),
    ("か", "ka"), ("き", "ki"), ("く", "ku"), ("け", "ke"), ("こ", "ko"),
    ("が", "ga"), ("ぎ", "gi"), ("ぐ", "gu"), ("げ", "ge"), ("ご", "go"),
    ("さ", "sa"), ("し", "shi"), ("す", "su"), ("せ", "se"), ("そ", "so"),
    ("ざ", "za"), ("じ", "ji"), ("ず", "zu"), ("ぜ", "ze"), ("ぞ", "zo"),
    ("た", "ta"), ("ち", "chi"), ("つ", "tsu"), ("て", "te"), ("と", "to"),
    ("だ", "da"), ("ぢ", "ji"), ("づ", "zu"), ("で", "de"), ("ど", "do"),
    ("な", "na"), ("に", "ni"), ("ぬ", "nu"), ("ね", "ne"), ("の", "no"),
    ("は", "ha"), ("ひ", "hi"), ("ふ", "fu"), ("へ", "he"), ("ほ", "ho"),
    ("ば", "ba"), ("び", "bi"), ("ぶ", "bu"), ("べ", "be"), ("ぼ", "bo"),
    ("ぱ", "pa"), ("ぴ", "pi"), ("ぷ", "pu"), ("ぺ", "pe"), ("ぽ", "po"),
    ("ま", "ma"), ("み", "mi"), ("む", "mu"), ("め", "me"), ("も", "mo"),
    ("や", "ya"), ("ゆ", "yu"), ("よ", "yo"),
    ("ら", "ra"), ("り", "ri"), ("る", "ru"), ("れ", "re"), ("ろ", "ro"),
    ("わ", "wa"), ("ゐ", "i"), ("ゑ", "e"), ("を", "o"), ("ん", "n"),
    ("ゔ", "vu"),
    // Small kana standing on their own
    ("ぁ", "a"), ("ぃ", "i"), ("ぅ", "u"), ("ぇ", "e"), ("ぉ", "o"),
    ("ゃ", "ya"), ("ゅ", "yu"), ("ょ", "yo"), ("ゎ", "wa"), ("ゕ", "ka"), ("ゖ", "ke"),
    ("ゟ", "yori"),
    // Katakana without a hiragana counterpart
    ("ヷ", "va"), ("ヸ", "vi"), ("ヹ", "ve"), ("ヺ", "vo"), ("ヿ", "koto"),
    ("ㇰ", "ku"), ("ㇱ", "shi"), ("ㇲ", "su"), ("ㇳ", "to"), ("ㇴ", "nu"),
    ("ㇵ", "ha"), ("ㇶ", "hi"), ("ㇷ", "fu"), ("ㇸ", "he"), ("ㇹ", "ho"),
    ("ㇺ", "mu"), ("ㇻ", "ra"), ("ㇼ", "ri"), ("ㇽ", "ru"), ("ㇾ", "re"), ("ㇿ", "ro"),
];

/// Two-kana combinations that read as one syllable.
const DIGRAPHS: &[(&str, &str)] = &[
    ("きゃ", "kya"), ("きゅ", "kyu"), ("きょ", "kyo"),
    ("ぎゃ", "gya"), ("ぎゅ", "gyu"), ("ぎょ", "gyo"),
    ("しゃ", "sha"), ("しゅ", "shu"), ("しょ", "sho"), ("しぇ", "she"),
    ("じゃ", "ja"), ("じゅ", "ju"), ("じょ", "jo"), ("じぇ", "je"),
    ("ちゃ", "cha"), ("ちゅ", "chu"), ("ちょ", "cho"), ("ちぇ", "che"),
    ("ぢゃ", "ja"), ("ぢゅ", "ju"), ("ぢょ", "jo"),
    ("にゃ", "nya"), ("にゅ", "nyu"), ("にょ", "nyo"),
    ("ひゃ", "hya"), ("ひゅ", "hyu"), ("ひょ", "hyo"),
    ("びゃ", "bya"), ("びゅ", "byu"), ("びょ", "byo"),
    ("ぴゃ", "pya"), ("ぴゅ", "pyu"), ("ぴょ", "pyo"),
    ("みゃ", "mya"), ("みゅ", "myu"), ("みょ", "myo"),
    ("りゃ", "rya"), ("りゅ", "ryu"), ("りょ", "ryo"),
    // Loanword spellings
    ("ふぁ", "fa"), ("ふぃ", "fi"), ("ふぇ", "fe"), ("ふぉ", "fo"),
    ("てぃ", "ti"), ("でぃ", "di"), ("とぅ", "tu"), ("どぅ", "du"),
    ("うぃ", "wi"), ("うぇ", "we"), ("うぉ", "wo"), ("いぇ", "ye"),
    ("ゔぁ", "va"), ("ゔぃ", "vi"), ("ゔぇ", "ve"), ("ゔぉ", "vo"),
    ("つぁ", "tsa"), ("つぃ", "tsi"), ("つぇ", "tse"), ("つぉ", "tso"),
    ("くぁ", "kwa"), ("ぐぁ", "gwa"),
];

const SOKUON: char = 'っ';
const CHOON: char = 'ー';
const ITERATION: [char; 2] = ['ゝ', 'ゞ'];

/// Fold katakana onto hiragana; the two blocks are laid out in parallel.
fn to_hiragana(c: char) -> char {
    match c {
        '\u{30A1}'..='\u{30F6}' | '\u{30FD}'..='\u{30FE}' => {
            char::from_u32(c as u32 - 0x60).unwrap_or(c)
        }
        _ => c,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'u' | 'e' | 'o')
}

// ============================================================================
// Backend
// ============================================================================

pub struct JapaneseBackend {
    table: FxHashMap<&'static str, &'static str>,
}

impl JapaneseBackend {
    /// Build the kana table. Shared instances call this once per process.
    pub fn load() -> Self {
        let table = MONOGRAPHS
            .iter()
            .chain(DIGRAPHS.iter())
            .copied()
            .collect();
        Self { table }
    }

    fn lookup(&self, key: &str) -> Option<&'static str> {
        self.table.get(key).copied()
    }
}

/// Accumulates romaji while tracking the state that depends on neighbours.
struct Writer {
    out: String,
    pending_sokuon: bool,
    last_syllable: Option<String>,
}

impl Writer {
    fn syllable(&mut self, romaji: &str) {
        if self.pending_sokuon {
            if romaji.starts_with("ch") {
                self.out.push('t');
            } else if let Some(first) = romaji.chars().next().filter(|c| !is_vowel(*c)) {
                self.out.push(first);
            }
            self.pending_sokuon = false;
        }
        // Syllabic n before a vowel or y: "kan'i", not "kani".
        if self.last_syllable.as_deref() == Some("n")
            && romaji.starts_with(|c: char| is_vowel(c) || c == 'y')
        {
            self.out.push('\'');
        }
        self.out.push_str(romaji);
        self.last_syllable = Some(romaji.to_string());
    }

    fn extend_vowel(&mut self) {
        if let Some(v) = self.out.chars().last().filter(|c| is_vowel(*c)) {
            self.out.push(v);
        }
    }

    fn repeat(&mut self) {
        if let Some(prev) = self.last_syllable.clone() {
            self.syllable(&prev);
        }
    }
}

impl Transliterate for JapaneseBackend {
    fn can_handle(&self, family: ScriptFamily) -> bool {
        family == ScriptFamily::Japanese
    }

    fn transliterate(&self, text: &str) -> Result<String, TransliterationError> {
        // Compose stray combining (han)dakuten onto their base kana first.
        let composed: String = text.nfc().collect();
        let kana: Cow<'_, str> = if composed.chars().any(is_han) {
            Cow::Owned(kakasi::convert(&composed).hiragana)
        } else {
            Cow::Borrowed(composed.as_str())
        };
        let chars: Vec<char> = kana.chars().map(to_hiragana).collect();
        let mut w = Writer {
            out: String::with_capacity(text.len()),
            pending_sokuon: false,
            last_syllable: None,
        };

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == SOKUON {
                w.pending_sokuon = true;
                i += 1;
                continue;
            }
            if c == CHOON {
                w.extend_vowel();
                i += 1;
                continue;
            }
            if ITERATION.contains(&c) {
                w.repeat();
                i += 1;
                continue;
            }
            if let Some(&next) = chars.get(i + 1) {
                let pair: String = [c, next].iter().collect();
                if let Some(romaji) = self.lookup(&pair) {
                    w.syllable(romaji);
                    i += 2;
                    continue;
                }
            }
            let mut buf = [0u8; 4];
            // Han left over here has no dictionary reading.
            let romaji = self
                .lookup(c.encode_utf8(&mut buf))
                .ok_or(TransliterationError::Unsupported(c))?;
            w.syllable(romaji);
            i += 1;
        }
        Ok(w.out)
    }
}
