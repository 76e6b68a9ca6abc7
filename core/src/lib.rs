//! libkana-core
//!
//! Composition buffer for kana input methods: the text a user is typing but
//! has not committed yet, kept as an ordered list of chunks and rendered under
//! several views at once (typed keys, kana, katakana, full/half width).
//!
//! Public API:
//! - `Composition` - chunked buffer with insertion, deletion and cursor mapping
//! - `CharChunk` - one segment of raw and converted text
//! - `Table` - keystroke-to-kana rules with longest-prefix lookup
//! - `Transliterator` / `TransliteratorSelector` - rendering policies
//! - `Config` - configuration loaded from TOML
//!
//! ```
//! use std::sync::Arc;
//! use libkana_core::{Composition, Table, Transliterator, TransliteratorSelector};
//!
//! let mut composition = Composition::new(Arc::new(Table::romaji_hiragana()));
//! let cursor = composition.insert_at(0, "kyouha");
//! assert_eq!(cursor, 4);
//! assert_eq!(composition.get_string(), "きょうは");
//!
//! // cursor after "きょ" maps to after "kyo" in the raw view
//! let raw_cursor = composition.convert_position(
//!     2,
//!     TransliteratorSelector::UseChunkDefault,
//!     Transliterator::RawString.into(),
//! );
//! assert_eq!(raw_cursor, 3);
//! ```
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod table;
pub use table::{Entry, PrefixMatch, Table};

mod romaji;

pub mod transliterator;
pub use transliterator::{SplitParts, Transliterator, TransliteratorSelector};

pub mod char_chunk;
pub use char_chunk::CharChunk;

pub mod composition;
pub use composition::{Composition, TrimMode};

/// Configuration for a composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Transliterator given to chunks created by new input.
    /// `None` leaves new chunks on their default (conversion string).
    pub input_transliterator: Option<Transliterator>,

    /// TSV rule table to load instead of the built-in romaji table.
    pub table_path: Option<PathBuf>,

    /// Match rule inputs case-sensitively.
    pub case_sensitive: bool,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Selector applied to newly created chunks.
    pub fn input_selector(&self) -> TransliteratorSelector {
        self.input_transliterator
            .map_or(TransliteratorSelector::UseChunkDefault, TransliteratorSelector::from)
    }
}

/// Utility helpers.
pub mod utils {
    use unicode_normalization::UnicodeNormalization;

    /// Full-width katakana and kana punctuation paired with half-width forms.
    const KANA_HALF_WIDTH: &[(char, &str)] = &[
        ('ア', "ｱ"), ('イ', "ｲ"), ('ウ', "ｳ"), ('エ', "ｴ"), ('オ', "ｵ"),
        ('ァ', "ｧ"), ('ィ', "ｨ"), ('ゥ', "ｩ"), ('ェ', "ｪ"), ('ォ', "ｫ"),
        ('カ', "ｶ"), ('キ', "ｷ"), ('ク', "ｸ"), ('ケ', "ｹ"), ('コ', "ｺ"),
        ('ガ', "ｶﾞ"), ('ギ', "ｷﾞ"), ('グ', "ｸﾞ"), ('ゲ', "ｹﾞ"), ('ゴ', "ｺﾞ"),
        ('サ', "ｻ"), ('シ', "ｼ"), ('ス', "ｽ"), ('セ', "ｾ"), ('ソ', "ｿ"),
        ('ザ', "ｻﾞ"), ('ジ', "ｼﾞ"), ('ズ', "ｽﾞ"), ('ゼ', "ｾﾞ"), ('ゾ', "ｿﾞ"),
        ('タ', "ﾀ"), ('チ', "ﾁ"), ('ツ', "ﾂ"), ('テ', "ﾃ"), ('ト', "ﾄ"),
        ('ダ', "ﾀﾞ"), ('ヂ', "ﾁﾞ"), ('ヅ', "ﾂﾞ"), ('デ', "ﾃﾞ"), ('ド', "ﾄﾞ"),
        ('ッ', "ｯ"),
        ('ナ', "ﾅ"), ('ニ', "ﾆ"), ('ヌ', "ﾇ"), ('ネ', "ﾈ"), ('ノ', "ﾉ"),
        ('ハ', "ﾊ"), ('ヒ', "ﾋ"), ('フ', "ﾌ"), ('ヘ', "ﾍ"), ('ホ', "ﾎ"),
        ('バ', "ﾊﾞ"), ('ビ', "ﾋﾞ"), ('ブ', "ﾌﾞ"), ('ベ', "ﾍﾞ"), ('ボ', "ﾎﾞ"),
        ('パ', "ﾊﾟ"), ('ピ', "ﾋﾟ"), ('プ', "ﾌﾟ"), ('ペ', "ﾍﾟ"), ('ポ', "ﾎﾟ"),
        ('マ', "ﾏ"), ('ミ', "ﾐ"), ('ム', "ﾑ"), ('メ', "ﾒ"), ('モ', "ﾓ"),
        ('ヤ', "ﾔ"), ('ユ', "ﾕ"), ('ヨ', "ﾖ"), ('ャ', "ｬ"), ('ュ', "ｭ"), ('ョ', "ｮ"),
        ('ラ', "ﾗ"), ('リ', "ﾘ"), ('ル', "ﾙ"), ('レ', "ﾚ"), ('ロ', "ﾛ"),
        ('ワ', "ﾜ"), ('ヲ', "ｦ"), ('ン', "ﾝ"), ('ヴ', "ｳﾞ"),
        ('ー', "ｰ"), ('。', "｡"), ('、', "､"), ('「', "｢"), ('」', "｣"), ('・', "･"),
        ('゛', "ﾞ"), ('゜', "ﾟ"),
    ];

    /// NFC-normalize a string.
    pub fn normalize(s: &str) -> String {
        s.nfc().collect::<String>()
    }

    /// Split `s` after `n` chars. Clamps to the end of the string.
    pub fn split_at_char(s: &str, n: usize) -> (&str, &str) {
        let index = s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
        s.split_at(index)
    }

    /// Substring by char offsets, clamped to the string.
    pub fn sub_string(s: &str, start: usize, len: usize) -> &str {
        let (_, rest) = split_at_char(s, start);
        split_at_char(rest, len).0
    }

    /// Convert ASCII characters to full-width equivalents.
    ///
    /// This converts:
    /// - ASCII letters, digits and punctuation → Full-width forms (U+FF01-U+FF5E)
    /// - ASCII space → Ideographic space (　)
    ///
    /// Non-ASCII characters are passed through unchanged.
    pub fn to_fullwidth(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                ' ' => '\u{3000}',
                '!'..='~' => char::from_u32(ch as u32 - 0x21 + 0xFF01).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    /// Convert full-width ASCII back to half-width.
    pub fn to_halfwidth(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                '\u{3000}' => ' ',
                '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFF01 + 0x21).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    /// ぁ-ゖ → ァ-ヶ
    pub fn hiragana_to_katakana(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                '\u{3041}'..='\u{3096}' => char::from_u32(ch as u32 + 0x60).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    /// ァ-ヶ → ぁ-ゖ
    pub fn katakana_to_hiragana(s: &str) -> String {
        s.chars()
            .map(|ch| match ch {
                '\u{30A1}'..='\u{30F6}' => char::from_u32(ch as u32 - 0x60).unwrap_or(ch),
                _ => ch,
            })
            .collect()
    }

    /// Full-width katakana to half-width. Voiced kana expand to two chars.
    pub fn katakana_to_halfwidth(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for ch in s.chars() {
            match KANA_HALF_WIDTH.iter().find(|(full, _)| *full == ch) {
                Some((_, half)) => out.push_str(half),
                None => out.push(ch),
            }
        }
        out
    }

    /// Half-width katakana to full-width, one char at a time, so a detached
    /// voiced mark stays a separate "゛".
    pub fn halfwidth_kana_to_full(s: &str) -> String {
        s.chars()
            .map(|ch| {
                KANA_HALF_WIDTH
                    .iter()
                    .find(|(_, half)| {
                        let mut chars = half.chars();
                        chars.next() == Some(ch) && chars.next().is_none()
                    })
                    .map_or(ch, |(full, _)| *full)
            })
            .collect()
    }

}
