//! One segment of the composition.
//!
//! A chunk holds the keys typed for one conversion unit (`raw`), the text the
//! rule table produced for them (`conversion`), and keys that have been
//! accepted but not resolved yet (`pending`). Typing "kyo" gives a single
//! chunk `raw = "kyo", conversion = "きょ", pending = ""`; typing "ky" leaves
//! `pending = "ky"` until the next key decides the rule.

use crate::table::Table;
use crate::transliterator::{Transliterator, TransliteratorSelector};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharChunk {
    raw: String,
    conversion: String,
    pending: String,
    transliterator: TransliteratorSelector,
}

impl CharChunk {
    /// Create an empty chunk without a transliterator override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chunk rendered with `transliterator` by default.
    pub fn with_transliterator(transliterator: TransliteratorSelector) -> Self {
        Self {
            transliterator,
            ..Self::default()
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn conversion(&self) -> &str {
        &self.conversion
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// True when the chunk holds no text at all.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.conversion.is_empty() && self.pending.is_empty()
    }

    /// True when nothing is waiting for more input.
    pub fn is_fixed(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn set_transliterator(&mut self, transliterator: TransliteratorSelector) {
        self.transliterator = transliterator;
    }

    /// The override stored on this chunk.
    pub fn transliterator(&self) -> TransliteratorSelector {
        self.transliterator
    }

    /// Resolve `selector` against this chunk: an explicit selector wins,
    /// otherwise the chunk's own override, otherwise the conversion string.
    pub fn get_transliterator(&self, selector: TransliteratorSelector) -> Transliterator {
        match selector {
            TransliteratorSelector::Explicit(t12r) => t12r,
            TransliteratorSelector::UseChunkDefault => {
                self.transliterator.resolve(Transliterator::default())
            }
        }
    }

    /// Whether new input rendered with `selector` may extend this chunk.
    pub fn is_appendable(&self, selector: TransliteratorSelector) -> bool {
        !self.pending.is_empty()
            && (selector.is_chunk_default() || selector == self.transliterator)
    }

    /// Units this chunk occupies under `selector`.
    pub fn length(&self, selector: TransliteratorSelector) -> usize {
        self.get_transliterator(selector)
            .length(&self.raw, &self.converted_with_pending())
    }

    /// Render the chunk as buffered, pending keys included.
    pub fn append_result(&self, selector: TransliteratorSelector, result: &mut String) {
        let converted = self.converted_with_pending();
        result.push_str(
            &self
                .get_transliterator(selector)
                .transliterate(&self.raw, &converted),
        );
    }

    /// Render only the settled part; pending keys are dropped.
    pub fn append_trimmed_result(&self, selector: TransliteratorSelector, result: &mut String) {
        result.push_str(
            &self
                .get_transliterator(selector)
                .transliterate(&self.raw, &self.conversion),
        );
    }

    /// Render with pending keys forced through the table as if no more input
    /// will come ("n" → "ん"). Pending keys without a rule stay verbatim.
    pub fn append_fixed_result(
        &self,
        table: &Table,
        selector: TransliteratorSelector,
        result: &mut String,
    ) {
        let mut converted = self.conversion.clone();
        if !self.pending.is_empty() {
            match table.look_up(&self.pending) {
                Some(entry) => {
                    converted.push_str(&entry.result);
                    converted.push_str(&entry.pending);
                }
                None => converted.push_str(&self.pending),
            }
        }
        result.push_str(
            &self
                .get_transliterator(selector)
                .transliterate(&self.raw, &converted),
        );
    }

    /// Feed keys through the table, consuming a prefix of `input`.
    ///
    /// Whatever this chunk cannot take is left in `input` for a new chunk.
    /// An empty chunk always takes at least one character.
    pub fn add_input(&mut self, table: &Table, input: &mut String) {
        while self.add_input_internal(table, input) {}
    }

    /// One lookup step. Returns true when another step may make progress.
    fn add_input_internal(&mut self, table: &Table, input: &mut String) -> bool {
        if input.is_empty() {
            return false;
        }
        let key = format!("{}{}", self.pending, input);
        let found = table.look_up_prefix(&key);

        let entry = match found.entry {
            Some(entry) => entry,
            None => {
                if found.key_length == 0 {
                    // No rule starts with this key. An empty chunk takes
                    // the first char verbatim.
                    if self.pending.is_empty() {
                        let first_len = input.chars().next().map_or(0, char::len_utf8);
                        let first: String = input.drain(..first_len).collect();
                        self.raw.push_str(&first);
                        self.conversion.push_str(&first);
                    }
                    return false;
                }
                if found.key_length < self.pending.len() {
                    return false;
                }
                // A prefix of some rule, nothing to convert yet.
                let used = found.key_length - self.pending.len();
                let keys: String = input.drain(..used).collect();
                self.raw.push_str(&keys);
                self.pending.push_str(&keys);
                return false;
            }
        };

        if found.key_length == key.len() {
            self.raw.push_str(input);
            input.clear();
            if found.fixed {
                self.conversion.push_str(&entry.result);
                self.pending = entry.pending.clone();
            } else {
                // A longer rule may still match ("n" before "na").
                self.pending = key;
            }
            return false;
        }

        if found.key_length < self.pending.len() {
            return false;
        }
        let used = found.key_length - self.pending.len();
        let keys: String = input.drain(..used).collect();
        self.raw.push_str(&keys);
        self.conversion.push_str(&entry.result);
        self.pending = entry.pending.clone();
        used > 0 && !self.pending.is_empty()
    }

    /// Merge an already converted pair (e.g. a kana key with its kana).
    ///
    /// Both `key` and `converted` are emptied when the chunk takes them;
    /// otherwise both are left untouched and the caller needs a new chunk.
    pub fn add_input_and_converted_char(
        &mut self,
        table: &Table,
        key: &mut String,
        converted: &mut String,
    ) {
        if self.is_empty() {
            self.raw = std::mem::take(key);
            self.pending = std::mem::take(converted);
            return;
        }

        let input = format!("{}{}", self.pending, converted);
        let found = table.look_up_prefix(&input);
        let Some(entry) = found.entry else {
            return;
        };
        if found.key_length != input.len() {
            return;
        }

        self.raw.push_str(key);
        if found.fixed {
            self.conversion.push_str(&entry.result);
            self.pending = entry.pending.clone();
        } else {
            self.pending = input;
        }
        key.clear();
        converted.clear();
    }

    /// Split off the first `position` units under `selector`.
    ///
    /// Returns the left part; `self` keeps the remainder. Both keep this
    /// chunk's override. Returns `None` when `position` is not strictly inside
    /// the chunk. When the views disagree on unit counts the selector's own
    /// string decides the split and the other string is approximated.
    pub fn split_chunk(
        &mut self,
        selector: TransliteratorSelector,
        position: usize,
    ) -> Option<CharChunk> {
        let length = self.length(selector);
        if position == 0 || position >= length {
            tracing::warn!(position, length, "invalid chunk split position");
            return None;
        }

        let converted = self.converted_with_pending();
        let parts = self
            .get_transliterator(selector)
            .split(position, &self.raw, &converted);
        if !parts.exact {
            tracing::debug!(position, raw = %self.raw, "approximate chunk split");
        }

        let mut left = CharChunk::with_transliterator(self.transliterator);
        left.raw = parts.raw_lhs;
        self.raw = parts.raw_rhs;

        let pending_lhs = parts
            .converted_lhs
            .strip_prefix(self.conversion.as_str())
            .filter(|rest| !rest.is_empty())
            .map(str::to_string);
        match pending_lhs {
            // [ conversion | pending ] => [ conversion | pending#1 ] [ pending#2 ]
            Some(pending_lhs) => {
                left.conversion = std::mem::take(&mut self.conversion);
                left.pending = pending_lhs;
                self.pending = parts.converted_rhs;
            }
            // [ conversion | pending ] => [ conversion#1 ] [ conversion#2 | pending ]
            None => {
                left.conversion = parts.converted_lhs;
                let conversion_rhs = parts
                    .converted_rhs
                    .strip_suffix(self.pending.as_str())
                    .map(str::to_string);
                match conversion_rhs {
                    Some(conversion_rhs) => self.conversion = conversion_rhs,
                    None => {
                        self.conversion = parts.converted_rhs;
                        self.pending.clear();
                    }
                }
            }
        }
        Some(left)
    }

    fn converted_with_pending(&self) -> String {
        format!("{}{}", self.conversion, self.pending)
    }
}
