//! Rendering policies for chunks.
//!
//! A transliterator turns a chunk's `(raw, converted)` pair into the string
//! shown for one view of the composition: typed keys, kana, katakana, or the
//! full/half-width forms of either. Lengths are counted in `char`s.
//!
//! The views do not always agree on unit counts ("ka" is two raw units but one
//! kana unit; "ガ" is one katakana unit but two half-width units), which is why
//! splitting is defined per transliterator: the transliterator being asked
//! splits its own string exactly and the other string only when both strings
//! have the same length.

use serde::{Deserialize, Serialize};

use crate::utils;

/// Concrete rendering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transliterator {
    /// Converted text followed by pending raw text, as buffered.
    #[default]
    ConversionString,
    /// Keys as typed.
    RawString,
    /// Converted text as hiragana; stray ASCII becomes full-width.
    Hiragana,
    /// Converted text as full-width katakana.
    FullKatakana,
    /// Converted text as half-width katakana. Voiced kana take two units.
    HalfKatakana,
    /// Typed keys as full-width ASCII.
    FullAscii,
    /// Typed keys as half-width ASCII.
    HalfAscii,
}

/// Which transliterator to use for an operation.
///
/// `UseChunkDefault` asks each chunk for its own override, falling back to
/// [`Transliterator::ConversionString`] for chunks without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransliteratorSelector {
    #[default]
    UseChunkDefault,
    Explicit(Transliterator),
}

impl TransliteratorSelector {
    /// The explicit transliterator, or `fallback` for `UseChunkDefault`.
    pub fn resolve(self, fallback: Transliterator) -> Transliterator {
        match self {
            Self::UseChunkDefault => fallback,
            Self::Explicit(t12r) => t12r,
        }
    }

    pub fn is_chunk_default(self) -> bool {
        self == Self::UseChunkDefault
    }
}

impl From<Transliterator> for TransliteratorSelector {
    fn from(t12r: Transliterator) -> Self {
        Self::Explicit(t12r)
    }
}

/// Result of [`Transliterator::split`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SplitParts {
    pub raw_lhs: String,
    pub raw_rhs: String,
    pub converted_lhs: String,
    pub converted_rhs: String,
    /// False when the secondary string could not be split at the same index
    /// and was replaced by the primary halves.
    pub exact: bool,
}

impl Transliterator {
    pub const ALL: [Transliterator; 7] = [
        Transliterator::ConversionString,
        Transliterator::RawString,
        Transliterator::Hiragana,
        Transliterator::FullKatakana,
        Transliterator::HalfKatakana,
        Transliterator::FullAscii,
        Transliterator::HalfAscii,
    ];

    /// Whether this view renders the typed keys rather than converted text.
    pub fn is_raw_based(self) -> bool {
        matches!(self, Self::RawString | Self::FullAscii | Self::HalfAscii)
    }

    /// Render `(raw, converted)` under this policy.
    pub fn transliterate(self, raw: &str, converted: &str) -> String {
        match self {
            Self::ConversionString => converted.to_string(),
            Self::RawString => raw.to_string(),
            Self::Hiragana => utils::katakana_to_hiragana(&utils::halfwidth_kana_to_full(
                &utils::to_fullwidth(converted),
            )),
            Self::FullKatakana => utils::hiragana_to_katakana(&utils::halfwidth_kana_to_full(
                &utils::to_fullwidth(converted),
            )),
            Self::HalfKatakana => utils::katakana_to_halfwidth(&utils::hiragana_to_katakana(
                &utils::to_halfwidth(converted),
            )),
            Self::FullAscii => utils::to_fullwidth(raw),
            Self::HalfAscii => utils::to_halfwidth(raw),
        }
    }

    /// Number of units `(raw, converted)` occupies under this policy.
    pub fn length(self, raw: &str, converted: &str) -> usize {
        self.transliterate(raw, converted).chars().count()
    }

    /// Split `(raw, converted)` so that the left side covers `position` units
    /// of this policy's rendering.
    pub fn split(self, position: usize, raw: &str, converted: &str) -> SplitParts {
        if self.is_raw_based() {
            let (raw_lhs, raw_rhs, converted_lhs, converted_rhs, exact) =
                split_primary_string(position, raw, converted);
            return SplitParts {
                raw_lhs,
                raw_rhs,
                converted_lhs,
                converted_rhs,
                exact,
            };
        }

        let position = match self {
            Self::HalfKatakana => half_katakana_to_converted_position(position, converted),
            _ => position,
        };
        let (converted_lhs, converted_rhs, raw_lhs, raw_rhs, exact) =
            split_primary_string(position, converted, raw);
        SplitParts {
            raw_lhs,
            raw_rhs,
            converted_lhs,
            converted_rhs,
            exact,
        }
    }
}

/// Split `primary` at `position` chars. `secondary` is split at the same index
/// when both have the same length; otherwise it takes the primary halves.
fn split_primary_string(
    position: usize,
    primary: &str,
    secondary: &str,
) -> (String, String, String, String, bool) {
    let (primary_lhs, primary_rhs) = utils::split_at_char(primary, position);
    if primary.chars().count() == secondary.chars().count() {
        let (secondary_lhs, secondary_rhs) = utils::split_at_char(secondary, position);
        return (
            primary_lhs.to_string(),
            primary_rhs.to_string(),
            secondary_lhs.to_string(),
            secondary_rhs.to_string(),
            true,
        );
    }
    (
        primary_lhs.to_string(),
        primary_rhs.to_string(),
        primary_lhs.to_string(),
        primary_rhs.to_string(),
        false,
    )
}

/// Map a position in half-width katakana units to a char index in
/// `converted`. A position inside an expanded kana ("ｶ|ﾞ") rounds up to the
/// end of that kana.
fn half_katakana_to_converted_position(position: usize, converted: &str) -> usize {
    let mut units = 0;
    let mut converted_pos = 0;
    let mut buf = [0u8; 4];
    for ch in converted.chars() {
        if units >= position {
            break;
        }
        units += Transliterator::HalfKatakana.length("", ch.encode_utf8(&mut buf));
        converted_pos += 1;
    }
    converted_pos
}
