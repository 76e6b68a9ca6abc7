//! Conversion rule table with longest-prefix lookup.
//!
//! A `Table` maps keystroke sequences to converted text. Each rule may leave a
//! pending remainder that takes part in the next lookup, e.g. `"tt"` produces
//! `"っ"` and keeps `"t"` pending so that a following `"a"` yields `"た"`.
//!
//! Tables are read-only once built and are shared between compositions through
//! `Arc<Table>`.
//!
//! # Example
//! ```
//! use libkana_core::Table;
//!
//! let mut table = Table::new();
//! table.add_rule("ka", "か", "");
//! table.add_rule("tt", "っ", "t");
//!
//! let m = table.look_up_prefix("kat");
//! assert_eq!(m.entry.map(|e| e.result.as_str()), Some("か"));
//! assert_eq!(m.key_length, 2);
//! assert!(m.fixed);
//! ```

use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use crate::{romaji, utils, Config};

/// A single conversion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Keystrokes that trigger the rule (e.g. "ka")
    pub input: String,
    /// Converted output (e.g. "か")
    pub result: String,
    /// Raw text left pending after conversion (e.g. "t" for "tt")
    pub pending: String,
}

impl Entry {
    pub fn new<I: Into<String>, R: Into<String>, P: Into<String>>(
        input: I,
        result: R,
        pending: P,
    ) -> Self {
        Self {
            input: input.into(),
            result: result.into(),
            pending: pending.into(),
        }
    }
}

/// Outcome of [`Table::look_up_prefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// Rule stored at the deepest node reachable by walking the key, if any.
    pub entry: Option<&'a Entry>,
    /// Bytes of the key consumed by the walk.
    pub key_length: usize,
    /// True when no longer rule extends the reached node.
    pub fixed: bool,
}

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: AHashMap<char, Box<TrieNode>>,
    /// Index into `Table::entries`.
    entry: Option<usize>,
}

/// On-disk form of a table. The trie is rebuilt on load.
#[derive(Debug, Serialize, Deserialize)]
struct TableSnapshot {
    case_sensitive: bool,
    entries: Vec<Entry>,
}

/// Keystroke-to-text rule table.
#[derive(Debug, Clone)]
pub struct Table {
    entries: Vec<Entry>,
    root: TrieNode,
    case_sensitive: bool,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Create an empty, case-sensitive table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            root: TrieNode::default(),
            case_sensitive: true,
        }
    }

    /// Built-in romaji to hiragana table.
    ///
    /// Covers the gojuon and youon rows, small kana (`x`/`l` prefixes),
    /// doubled consonants (`kk` → `っ` + pending `k`), the `n` variants and
    /// common punctuation. The table is case-insensitive.
    pub fn romaji_hiragana() -> Self {
        let mut table = Self::new();
        table.case_sensitive = false;
        for (prefix, row) in romaji::VOWEL_ROWS {
            for (vowel, kana) in romaji::VOWELS.chars().zip(row.iter()) {
                if !kana.is_empty() {
                    table.add_rule(format!("{}{}", prefix, vowel), *kana, "");
                }
            }
        }
        for consonant in romaji::DOUBLED_CONSONANTS.chars() {
            table.add_rule(
                format!("{}{}", consonant, consonant),
                "っ",
                consonant.to_string(),
            );
        }
        for (input, result, pending) in romaji::EXTRA_RULES {
            table.add_rule(*input, *result, *pending);
        }
        table
    }

    /// Build the table described by `config`: the TSV file at
    /// `config.table_path`, or the built-in romaji table.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut table = match &config.table_path {
            Some(path) => Self::load_tsv(path)?,
            None => Self::romaji_hiragana(),
        };
        table.set_case_sensitive(config.case_sensitive);
        Ok(table)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All rules in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Switch ASCII case sensitivity. Rules are re-indexed under the new
    /// folding, so rules that collide keep the later one.
    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        if self.case_sensitive == case_sensitive {
            return;
        }
        self.case_sensitive = case_sensitive;
        let entries = std::mem::take(&mut self.entries);
        self.root = TrieNode::default();
        for entry in entries {
            self.insert_entry(entry);
        }
    }

    /// Add a rule. A rule with the same input replaces the earlier one.
    pub fn add_rule<I: Into<String>, R: Into<String>, P: Into<String>>(
        &mut self,
        input: I,
        result: R,
        pending: P,
    ) {
        let entry = Entry::new(input, result, pending);
        if entry.input.is_empty() {
            tracing::warn!("ignoring rule with empty input");
            return;
        }
        self.insert_entry(entry);
    }

    fn insert_entry(&mut self, entry: Entry) {
        let case_sensitive = self.case_sensitive;
        let mut node = &mut self.root;
        for ch in entry.input.chars() {
            node = node
                .children
                .entry(fold(ch, case_sensitive))
                .or_insert_with(|| Box::new(TrieNode::default()));
        }
        match node.entry {
            Some(index) => self.entries[index] = entry,
            None => {
                node.entry = Some(self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Exact lookup of a rule by its input.
    pub fn look_up(&self, input: &str) -> Option<&Entry> {
        let mut node = &self.root;
        for ch in input.chars() {
            node = node.children.get(&fold(ch, self.case_sensitive))?;
        }
        node.entry.map(|index| &self.entries[index])
    }

    /// Walk `key` as deep as the rules allow.
    ///
    /// The returned entry is the rule at the deepest reachable node, so
    /// `"ky"` matches nothing (waiting for `"kya"`) while `"nk"` matches the
    /// `"n"` rule with `key_length == 1`.
    pub fn look_up_prefix(&self, key: &str) -> PrefixMatch<'_> {
        let mut node = &self.root;
        let mut key_length = 0;
        for ch in key.chars() {
            match node.children.get(&fold(ch, self.case_sensitive)) {
                Some(child) => {
                    node = child;
                    key_length += ch.len_utf8();
                }
                None => break,
            }
        }
        PrefixMatch {
            entry: node.entry.map(|index| &self.entries[index]),
            key_length,
            fixed: node.children.is_empty(),
        }
    }

    /// Parse rules from TSV text: `input<TAB>result[<TAB>pending]` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped. Result and pending
    /// text are NFC-normalized.
    pub fn from_tsv_str(content: &str) -> Result<Self> {
        let mut table = Self::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 || fields.len() > 3 {
                bail!(
                    "line {}: expected 2 or 3 tab-separated fields, got {}",
                    line_no + 1,
                    fields.len()
                );
            }
            if fields[0].is_empty() {
                bail!("line {}: empty input", line_no + 1);
            }
            let pending = fields.get(2).copied().unwrap_or("");
            table.add_rule(
                fields[0],
                utils::normalize(fields[1]),
                utils::normalize(pending),
            );
        }
        tracing::debug!(rules = table.len(), "parsed rule table");
        Ok(table)
    }

    /// Load rules from a TSV file (see [`Table::from_tsv_str`]).
    pub fn load_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut content = String::new();
        File::open(path)
            .with_context(|| format!("open table {}", path.display()))?
            .read_to_string(&mut content)
            .with_context(|| format!("read table {}", path.display()))?;
        Self::from_tsv_str(&content).with_context(|| format!("parse table {}", path.display()))
    }

    /// Load a table snapshot written by [`Table::save_bincode`].
    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let snapshot: TableSnapshot = bincode::deserialize_from(BufReader::new(f))
            .with_context(|| format!("deserialize {}", path.display()))?;

        let mut table = Self::new();
        table.case_sensitive = snapshot.case_sensitive;
        for entry in snapshot.entries {
            if entry.input.is_empty() {
                bail!("{}: snapshot contains a rule with empty input", path.display());
            }
            table.insert_entry(entry);
        }
        tracing::debug!(rules = table.len(), path = %path.display(), "loaded rule table");
        Ok(table)
    }

    /// Write the rules as a bincode snapshot.
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let snapshot = TableSnapshot {
            case_sensitive: self.case_sensitive,
            entries: self.entries.clone(),
        };
        bincode::serialize_into(BufWriter::new(f), &snapshot)
            .with_context(|| format!("serialize {}", path.display()))?;
        Ok(())
    }
}

fn fold(ch: char, case_sensitive: bool) -> char {
    if case_sensitive {
        ch
    } else {
        ch.to_ascii_lowercase()
    }
}
