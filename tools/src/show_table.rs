use anyhow::Result;
use libkana_core::{Entry, Table};
use std::io::Write;
use std::path::Path;

/// Load a table by file extension: `.bincode` snapshots, anything else as TSV.
/// `None` gives the built-in romaji table.
pub fn load(input: Option<&Path>) -> Result<Table> {
    let Some(path) = input else {
        return Ok(Table::romaji_hiragana());
    };
    match path.extension().and_then(|s| s.to_str()) {
        Some("bincode") | Some("bin") => Table::load_bincode(path),
        _ => Table::load_tsv(path),
    }
}

/// Write the rules of `table`, sorted by input, as TSV lines or a JSON array.
pub fn run<W: Write>(table: &Table, prefix: Option<&str>, json: bool, out: &mut W) -> Result<()> {
    let mut entries: Vec<&Entry> = table
        .entries()
        .iter()
        .filter(|e| prefix.is_none_or(|p| e.input.starts_with(p)))
        .collect();
    entries.sort_by(|a, b| a.input.cmp(&b.input));

    if json {
        serde_json::to_writer_pretty(&mut *out, &entries)?;
        writeln!(out)?;
        return Ok(());
    }
    for e in entries {
        if e.pending.is_empty() {
            writeln!(out, "{}\t{}", e.input, e.result)?;
        } else {
            writeln!(out, "{}\t{}\t{}", e.input, e.result, e.pending)?;
        }
    }
    Ok(())
}
