//! Composition buffer made of chunks.
//!
//! The composition is the text being typed but not committed yet. It is kept
//! as an ordered list of [`CharChunk`]s so that the same text can be shown
//! under several views at once (typed keys, kana, katakana, ...) while cursor
//! positions are translated between those views chunk by chunk.
//!
//! Positions are counted in units of a view (see
//! [`crate::transliterator`]). Unless a selector is given, operations work on
//! the default view where every chunk uses its own transliterator.

use std::sync::Arc;

use crate::char_chunk::CharChunk;
use crate::table::Table;
use crate::transliterator::{Transliterator, TransliteratorSelector};
use crate::utils;
use crate::Config;

const DEFAULT: TransliteratorSelector = TransliteratorSelector::UseChunkDefault;

/// How the last chunk is rendered by [`Composition::get_string_with_modes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrimMode {
    /// Drop pending keys that have not been converted.
    Trim,
    /// Render pending keys as typed.
    AsIs,
    /// Resolve pending keys through the table as if input ended.
    Fix,
}

/// Chunked composition buffer.
#[derive(Debug, Clone)]
pub struct Composition {
    chunks: Vec<CharChunk>,
    table: Arc<Table>,
    /// Transliterator given to chunks created by new input.
    input_t12r: TransliteratorSelector,
}

impl Composition {
    /// Create an empty composition using `table` for conversion.
    pub fn new(table: Arc<Table>) -> Self {
        Self {
            chunks: Vec::new(),
            table,
            input_t12r: TransliteratorSelector::UseChunkDefault,
        }
    }

    /// Create an empty composition with the table and input mode of `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let table = Table::from_config(config)?;
        let mut composition = Self::new(Arc::new(table));
        composition.set_input_mode(config.input_selector());
        Ok(composition)
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Replace the rule table. Chunks already built are left as they are.
    pub fn set_table(&mut self, table: Arc<Table>) {
        self.table = table;
    }

    /// Transliterator given to chunks created from now on.
    pub fn set_input_mode(&mut self, t12r: TransliteratorSelector) {
        self.input_t12r = t12r;
    }

    pub fn input_mode(&self) -> TransliteratorSelector {
        self.input_t12r
    }

    /// The chunks in text order.
    pub fn chunks(&self) -> &[CharChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Remove every chunk.
    pub fn erase(&mut self) {
        self.chunks.clear();
    }

    /// Length under the default view.
    pub fn length(&self) -> usize {
        self.length_with(DEFAULT)
    }

    /// Length under `t12r`: the sum of the chunk lengths.
    pub fn length_with(&self, t12r: TransliteratorSelector) -> usize {
        self.get_position(t12r, self.chunks.len())
    }

    /// Insert typed keys at `position` and return the cursor after them.
    ///
    /// Keys are fed through the rule table, extending the chunk left of
    /// `position` when it still has pending keys and creating new chunks for
    /// whatever it cannot take.
    pub fn insert_at(&mut self, position: usize, input: &str) -> usize {
        if input.is_empty() {
            return position;
        }
        let mut index = self.maybe_split_chunk_at(position);
        let mut chunk = self.get_insertion_chunk(&mut index);

        let mut input = input.to_string();
        loop {
            self.chunks[chunk].add_input(&self.table, &mut input);
            if input.is_empty() {
                break;
            }
            chunk = self.insert_chunk(&mut index);
        }
        self.debug_check_chunks();
        self.get_position(DEFAULT, index)
    }

    /// Insert a key together with its already converted text (e.g. from kana
    /// input) and return the cursor after them.
    pub fn insert_key_and_preedit_at(&mut self, position: usize, key: &str, preedit: &str) -> usize {
        if key.is_empty() && preedit.is_empty() {
            return position;
        }
        let mut index = self.maybe_split_chunk_at(position);
        let mut chunk = self.get_insertion_chunk(&mut index);

        let mut key = key.to_string();
        let mut converted = preedit.to_string();
        loop {
            self.chunks[chunk].add_input_and_converted_char(&self.table, &mut key, &mut converted);
            if key.is_empty() && converted.is_empty() {
                break;
            }
            chunk = self.insert_chunk(&mut index);
        }
        self.debug_check_chunks();
        self.get_position(DEFAULT, index)
    }

    /// Delete one unit right of `position` and return the new cursor.
    ///
    /// A chunk that is one unit long (or shorter) is removed whole, so
    /// deleting "か" typed as "ka" removes both keys.
    pub fn delete_at(&mut self, position: usize) -> usize {
        let index = self.maybe_split_chunk_at(position);
        let new_position = self.get_position(DEFAULT, index);
        if index >= self.chunks.len() {
            return new_position;
        }

        if self.chunks[index].length(DEFAULT) <= 1 {
            self.chunks.remove(index);
        } else {
            // the left part is the deleted unit
            let _ = self.chunks[index].split_chunk(DEFAULT, 1);
            if self.chunks[index].is_empty() {
                self.chunks.remove(index);
            }
        }
        self.debug_check_chunks();
        new_position
    }

    /// Map a cursor position under `t12r_from` to the position under
    /// `t12r_to`.
    ///
    /// A position at either edge of a chunk maps to the same edge. A position
    /// inside a chunk keeps its offset unless the target view is shorter, in
    /// which case it moves to the chunk end.
    pub fn convert_position(
        &self,
        position_from: usize,
        t12r_from: TransliteratorSelector,
        t12r_to: TransliteratorSelector,
    ) -> usize {
        if t12r_from == t12r_to {
            return position_from;
        }
        if self.chunks.is_empty() {
            return 0;
        }

        let (index, inner_position_from) = self.get_chunk_at(position_from, t12r_from);
        let chunk = &self.chunks[index];
        let chunk_length_from = chunk.length(t12r_from);
        debug_assert!(
            inner_position_from <= chunk_length_from,
            "inner position {} exceeds chunk length {}",
            inner_position_from,
            chunk_length_from
        );

        let position_to = self.get_position(t12r_to, index);
        let chunk_length_to = chunk.length(t12r_to);

        if inner_position_from == 0 {
            position_to
        } else if inner_position_from >= chunk_length_from || inner_position_from > chunk_length_to {
            position_to + chunk_length_to
        } else {
            position_to + inner_position_from
        }
    }

    /// Show every chunk with `t12r` and use it for new input as well.
    /// Returns the new length.
    pub fn set_display_mode(&mut self, t12r: TransliteratorSelector) -> usize {
        self.set_transliterator(0, self.length(), t12r);
        self.set_input_mode(t12r);
        self.length()
    }

    /// Set `t12r` on every chunk touching `[position_from, position_to]`.
    pub fn set_transliterator(
        &mut self,
        position_from: usize,
        position_to: usize,
        t12r: TransliteratorSelector,
    ) {
        if position_from > position_to {
            tracing::error!(
                position_from,
                position_to,
                "position_from is greater than position_to"
            );
            return;
        }
        if self.chunks.is_empty() {
            return;
        }

        let (start, _) = self.get_chunk_at(position_from, DEFAULT);
        let (end, _) = self.get_chunk_at(position_to, DEFAULT);
        for chunk in &mut self.chunks[start..=end] {
            chunk.set_transliterator(t12r);
        }
    }

    /// Transliterator in effect at `position`. On an empty composition this
    /// is the one new input would get.
    pub fn get_transliterator(&self, position: usize) -> Transliterator {
        if self.chunks.is_empty() {
            return self.input_t12r.resolve(Transliterator::default());
        }
        let (index, _) = self.get_chunk_at(position, DEFAULT);
        self.chunks[index].get_transliterator(DEFAULT)
    }

    /// Render the composition under `t12r`. Every chunk but the last is
    /// rendered as buffered; the last one follows `trim_mode`.
    pub fn get_string_with_modes(&self, t12r: TransliteratorSelector, trim_mode: TrimMode) -> String {
        let mut composition = String::new();
        let Some((last, init)) = self.chunks.split_last() else {
            tracing::warn!("composition is empty");
            return composition;
        };

        for chunk in init {
            chunk.append_result(t12r, &mut composition);
        }
        match trim_mode {
            TrimMode::Trim => last.append_trimmed_result(t12r, &mut composition),
            TrimMode::AsIs => last.append_result(t12r, &mut composition),
            TrimMode::Fix => last.append_fixed_result(&self.table, t12r, &mut composition),
        }
        composition
    }

    /// The composition as buffered under the default view.
    pub fn get_string(&self) -> String {
        let mut composition = String::new();
        if self.chunks.is_empty() {
            tracing::warn!("composition is empty");
            return composition;
        }
        for chunk in &self.chunks {
            chunk.append_result(DEFAULT, &mut composition);
        }
        composition
    }

    /// The composition under `t12r` with trailing keys resolved.
    pub fn get_string_with_transliterator(&self, t12r: TransliteratorSelector) -> String {
        self.get_string_with_modes(t12r, TrimMode::Fix)
    }

    pub fn get_string_with_trim_mode(&self, trim_mode: TrimMode) -> String {
        self.get_string_with_modes(DEFAULT, trim_mode)
    }

    /// Split the default rendering around the unit at `position`:
    /// `(left, focused, right)`.
    pub fn get_preedit(&self, position: usize) -> (String, String, String) {
        let composition = self.get_string();
        (
            utils::sub_string(&composition, 0, position).to_string(),
            utils::sub_string(&composition, position, 1).to_string(),
            utils::sub_string(&composition, position.saturating_add(1), usize::MAX).to_string(),
        )
    }

    /// Find the chunk holding `position` under `t12r`.
    ///
    /// Returns the chunk index and the offset inside it. A position on a
    /// boundary belongs to the chunk on its left (offset = full length).
    /// Positions past the end clamp to the end of the last chunk. On an empty
    /// composition the result is `(0, 0)`, i.e. the end of the list.
    fn get_chunk_at(&self, position: usize, t12r: TransliteratorSelector) -> (usize, usize) {
        let Some(last) = self.chunks.len().checked_sub(1) else {
            return (0, 0);
        };
        let mut rest = position;
        for (index, chunk) in self.chunks.iter().enumerate() {
            let length = chunk.length(t12r);
            if rest <= length {
                return (index, rest);
            }
            rest -= length;
        }
        (last, self.chunks[last].length(t12r))
    }

    /// Sum of the lengths of the chunks before `index`.
    fn get_position(&self, t12r: TransliteratorSelector, index: usize) -> usize {
        self.chunks[..index.min(self.chunks.len())]
            .iter()
            .map(|chunk| chunk.length(t12r))
            .sum()
    }

    /// Make sure a chunk boundary sits at `position` (default view) and
    /// return the index of the chunk that starts there, or the chunk count
    /// when `position` is at the end.
    fn maybe_split_chunk_at(&mut self, position: usize) -> usize {
        if position == 0 || self.chunks.is_empty() {
            return 0;
        }

        let (index, inner_position) = self.get_chunk_at(position, DEFAULT);
        if inner_position == 0 {
            return index;
        }
        if inner_position == self.chunks[index].length(DEFAULT) {
            return index + 1;
        }

        let mut right = self.chunks[index].clone();
        let Some(left) = right.split_chunk(DEFAULT, inner_position) else {
            return index + 1;
        };
        // A split inside a voiced half-width kana rounds to a chunk edge.
        if right.is_empty() {
            return index + 1;
        }
        if left.is_empty() {
            return index;
        }
        self.chunks[index] = right;
        self.chunks.insert(index, left);
        index + 1
    }

    /// Choose the chunk that takes new input inserted before `*index`.
    ///
    /// Returns the index of that chunk and moves `*index` so that it still
    /// points at the chunk right of the insertion point.
    fn get_insertion_chunk(&mut self, index: &mut usize) -> usize {
        if *index > 0 && self.chunks[*index - 1].is_appendable(self.input_t12r) {
            return *index - 1;
        }
        self.insert_chunk(index)
    }

    /// Insert an empty chunk before `*index` and return its index.
    fn insert_chunk(&mut self, index: &mut usize) -> usize {
        let position = *index;
        self.chunks
            .insert(position, CharChunk::with_transliterator(self.input_t12r));
        *index += 1;
        position
    }

    fn debug_check_chunks(&self) {
        debug_assert!(
            self.chunks.iter().all(|chunk| !chunk.is_empty()),
            "empty chunk left in composition"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_table() -> Arc<Table> {
        let mut table = Table::new();
        table.add_rule("ka", "か", "");
        table.add_rule("ki", "き", "");
        table.add_rule("ku", "く", "");
        table.add_rule("a", "あ", "");
        table.add_rule("i", "い", "");
        table.add_rule("n", "ん", "");
        table.add_rule("na", "な", "");
        table.add_rule("tt", "っ", "t");
        table.add_rule("ta", "た", "");
        table.add_rule("to", "と", "");
        table.add_rule("kya", "きゃ", "");
        Arc::new(table)
    }

    fn composition_of(keys: &str) -> Composition {
        let mut composition = Composition::new(test_table());
        composition.insert_at(0, keys);
        composition
    }

    fn raw() -> TransliteratorSelector {
        Transliterator::RawString.into()
    }

    #[test]
    fn test_get_chunk_at() {
        let composition = composition_of("kakikya");
        assert_eq!(composition.chunks().len(), 3);
        assert_eq!(composition.get_chunk_at(0, DEFAULT), (0, 0));
        assert_eq!(composition.get_chunk_at(1, DEFAULT), (0, 1));
        assert_eq!(composition.get_chunk_at(2, DEFAULT), (1, 1));
        assert_eq!(composition.get_chunk_at(3, DEFAULT), (2, 1));
        assert_eq!(composition.get_chunk_at(4, DEFAULT), (2, 2));
        assert_eq!(composition.get_chunk_at(10, DEFAULT), (2, 2));
        assert_eq!(composition.get_chunk_at(5, raw()), (2, 1));

        let empty = Composition::new(test_table());
        assert_eq!(empty.get_chunk_at(3, DEFAULT), (0, 0));
    }

    #[test]
    fn test_get_position() {
        let composition = composition_of("kakikya");
        assert_eq!(composition.get_position(DEFAULT, 0), 0);
        assert_eq!(composition.get_position(DEFAULT, 2), 2);
        assert_eq!(composition.get_position(raw(), 2), 4);
        assert_eq!(composition.get_position(raw(), 3), 7);
        assert_eq!(composition.length_with(raw()), 7);
    }

    #[test]
    fn test_maybe_split_chunk_at() {
        let mut composition = composition_of("kakya");
        assert_eq!(composition.maybe_split_chunk_at(0), 0);
        assert_eq!(composition.maybe_split_chunk_at(1), 1);
        assert_eq!(composition.maybe_split_chunk_at(3), 2);
        assert_eq!(composition.chunks().len(), 2);

        // inside "きゃ"
        assert_eq!(composition.maybe_split_chunk_at(2), 2);
        assert_eq!(composition.chunks().len(), 3);
        assert_eq!(composition.chunks()[1].conversion(), "き");
        assert_eq!(composition.chunks()[2].conversion(), "ゃ");
        assert_eq!(composition.get_string(), "かきゃ");
    }

    #[test]
    fn test_insert_at_empty() {
        let mut composition = Composition::new(test_table());
        assert_eq!(composition.insert_at(0, "ka"), 1);
        assert_eq!(composition.get_string(), "か");
        assert_eq!(composition.length(), 1);
        assert_eq!(composition.insert_at(0, ""), 0);
    }

    #[test]
    fn test_insert_at_appends_to_pending_chunk() {
        let mut composition = Composition::new(test_table());
        assert_eq!(composition.insert_at(0, "k"), 1);
        assert_eq!(composition.insert_at(1, "y"), 2);
        assert_eq!(composition.chunks().len(), 1);
        assert_eq!(composition.insert_at(2, "a"), 2);
        assert_eq!(composition.get_string(), "きゃ");
        assert_eq!(composition.chunks().len(), 1);
    }

    #[test]
    fn test_insert_at_middle() {
        let mut composition = composition_of("kaki");
        assert_eq!(composition.insert_at(1, "a"), 2);
        assert_eq!(composition.get_string(), "かあき");
        assert_eq!(composition.chunks().len(), 3);
    }

    #[test]
    fn test_insert_n_then_consonant() {
        let mut composition = Composition::new(test_table());
        let cursor = composition.insert_at(0, "n");
        assert_eq!(composition.get_string(), "n");
        composition.insert_at(cursor, "ka");
        assert_eq!(composition.get_string(), "んか");
        assert_eq!(composition.chunks().len(), 2);
        assert_eq!(composition.chunks()[0].raw(), "n");
    }

    #[test]
    fn test_insert_key_and_preedit_at() {
        let mut table = Table::new();
        table.add_rule("う゛", "ゔ", "");
        let mut composition = Composition::new(Arc::new(table));
        assert_eq!(composition.insert_key_and_preedit_at(0, "4", "う"), 1);
        assert_eq!(composition.insert_key_and_preedit_at(1, "@", "゛"), 1);
        assert_eq!(composition.get_string(), "ゔ");
        assert_eq!(composition.chunks().len(), 1);
        assert_eq!(composition.chunks()[0].raw(), "4@");

        assert_eq!(composition.insert_key_and_preedit_at(1, "t", "か"), 2);
        assert_eq!(composition.chunks().len(), 2);
        assert_eq!(composition.get_string(), "ゔか");
        assert_eq!(composition.insert_key_and_preedit_at(1, "", ""), 1);
    }

    #[test]
    fn test_delete_at() {
        let mut composition = composition_of("kaki");
        assert_eq!(composition.delete_at(1), 1);
        assert_eq!(composition.get_string(), "か");

        assert_eq!(composition.delete_at(1), 1);
        assert_eq!(composition.get_string(), "か");

        assert_eq!(composition.delete_at(0), 0);
        assert!(composition.is_empty());
    }

    #[test]
    fn test_delete_at_inside_chunk() {
        let mut composition = composition_of("kya");
        assert_eq!(composition.delete_at(0), 0);
        assert_eq!(composition.get_string(), "ゃ");
        assert_eq!(composition.chunks().len(), 1);

        let mut composition = composition_of("kya");
        assert_eq!(composition.delete_at(1), 1);
        assert_eq!(composition.get_string(), "き");
    }

    #[test]
    fn test_delete_pending_key() {
        let mut composition = composition_of("ky");
        assert_eq!(composition.delete_at(1), 1);
        assert_eq!(composition.get_string(), "k");
        assert_eq!(composition.chunks()[0].pending(), "k");
    }

    #[test]
    fn test_convert_position() {
        let composition = composition_of("kakya");
        // か(ka) きゃ(kya)
        assert_eq!(composition.convert_position(0, DEFAULT, raw()), 0);
        assert_eq!(composition.convert_position(1, DEFAULT, raw()), 2);
        assert_eq!(composition.convert_position(2, DEFAULT, raw()), 3);
        assert_eq!(composition.convert_position(3, DEFAULT, raw()), 5);
        assert_eq!(composition.convert_position(1, raw(), DEFAULT), 1);
        assert_eq!(composition.convert_position(4, raw(), DEFAULT), 3);
        assert_eq!(composition.convert_position(5, raw(), DEFAULT), 3);
        assert_eq!(composition.convert_position(3, raw(), raw()), 3);

        let empty = Composition::new(test_table());
        assert_eq!(empty.convert_position(3, DEFAULT, raw()), 0);
    }

    #[test]
    fn test_set_transliterator_range() {
        let mut composition = composition_of("kakiku");
        composition.set_transliterator(2, 2, Transliterator::FullKatakana.into());
        assert_eq!(composition.get_string(), "かキく");
        assert_eq!(composition.get_transliterator(0), Transliterator::ConversionString);
        assert_eq!(composition.get_transliterator(2), Transliterator::FullKatakana);

        composition.set_transliterator(2, 1, Transliterator::HalfAscii.into());
        assert_eq!(composition.get_string(), "かキく");

        // position 1 is the end of the first chunk, so it is included
        composition.set_transliterator(1, 2, Transliterator::FullKatakana.into());
        assert_eq!(composition.get_string(), "カキく");
    }

    #[test]
    fn test_set_display_mode() {
        let mut composition = composition_of("kaki");
        assert_eq!(composition.set_display_mode(Transliterator::HalfAscii.into()), 4);
        assert_eq!(composition.get_string(), "kaki");
        assert_eq!(composition.input_mode(), Transliterator::HalfAscii.into());

        let cursor = composition.insert_at(4, "ku");
        assert_eq!(cursor, 6);
        assert_eq!(composition.get_string(), "kakiku");
        assert_eq!(
            composition.get_string_with_transliterator(Transliterator::Hiragana.into()),
            "かきく"
        );
    }

    #[test]
    fn test_get_transliterator_empty_uses_input_mode() {
        let mut composition = Composition::new(test_table());
        assert_eq!(composition.get_transliterator(0), Transliterator::ConversionString);
        composition.set_input_mode(Transliterator::FullKatakana.into());
        assert_eq!(composition.get_transliterator(0), Transliterator::FullKatakana);
    }

    #[test]
    fn test_trim_modes() {
        let composition = composition_of("kakin");
        assert_eq!(composition.get_string_with_trim_mode(TrimMode::AsIs), "かきn");
        assert_eq!(composition.get_string_with_trim_mode(TrimMode::Trim), "かき");
        assert_eq!(composition.get_string_with_trim_mode(TrimMode::Fix), "かきん");
        assert_eq!(
            composition.get_string_with_modes(Transliterator::FullKatakana.into(), TrimMode::Fix),
            "カキン"
        );
    }

    #[test]
    fn test_empty_renders() {
        let composition = Composition::new(test_table());
        assert_eq!(composition.get_string(), "");
        assert_eq!(composition.get_string_with_trim_mode(TrimMode::Fix), "");
        assert_eq!(composition.length(), 0);
    }

    #[test]
    fn test_get_preedit() {
        let composition = composition_of("kaki");
        assert_eq!(
            composition.get_preedit(1),
            ("か".to_string(), "き".to_string(), String::new())
        );
        assert_eq!(
            composition.get_preedit(2),
            ("かき".to_string(), String::new(), String::new())
        );
        assert_eq!(
            composition.get_preedit(usize::MAX),
            ("かき".to_string(), String::new(), String::new())
        );

        let empty = Composition::new(test_table());
        assert_eq!(empty.get_preedit(0), (String::new(), String::new(), String::new()));
    }

    #[test]
    fn test_set_table_affects_new_input_only() {
        let mut composition = composition_of("ka");
        let mut table = Table::new();
        table.add_rule("ka", "カ", "");
        composition.set_table(Arc::new(table));
        composition.insert_at(1, "ka");
        assert_eq!(composition.get_string(), "かカ");
        assert_eq!(composition.table().len(), 1);
    }

    #[test]
    fn test_erase() {
        let mut composition = composition_of("kaki");
        composition.erase();
        assert!(composition.is_empty());
        assert_eq!(composition.length(), 0);
    }

    #[test]
    fn test_half_katakana_split_rounds_up() {
        let mut table = Table::new();
        table.add_rule("ga", "が", "");
        let mut composition = Composition::new(Arc::new(table));
        composition.set_input_mode(Transliterator::HalfKatakana.into());
        composition.insert_at(0, "ga");
        assert_eq!(composition.get_string(), "ｶﾞ");
        assert_eq!(composition.length(), 2);

        // no boundary inside "ｶﾞ": the insertion goes after the chunk
        assert_eq!(composition.insert_at(1, "ga"), 4);
        assert_eq!(composition.get_string(), "ｶﾞｶﾞ");
        assert_eq!(composition.chunks().len(), 2);
    }

    #[test]
    fn test_half_katakana_delete_inside_voiced_kana() {
        let mut table = Table::new();
        table.add_rule("gya", "ぎゃ", "");
        let mut composition = Composition::new(Arc::new(table));
        composition.set_input_mode(Transliterator::HalfKatakana.into());
        composition.insert_at(0, "gya");
        assert_eq!(composition.get_string(), "ｷﾞｬ");
        assert_eq!(composition.length(), 3);

        // "ｷ|ﾞ" rounds up to after "ｷﾞ", so the unit after it goes
        assert_eq!(composition.delete_at(1), 2);
        assert_eq!(composition.get_string(), "ｷﾞ");
        assert_eq!(composition.chunks().len(), 1);
        assert_eq!(composition.length(), 2);
    }
}
