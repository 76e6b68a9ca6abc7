use anyhow::{Context, Result};
use libkana_core::Table;
use std::path::Path;

/// Parse the TSV table at `input` and write it to `output` as bincode.
/// Returns the number of rules written.
pub fn run(input: &Path, output: &Path, case_sensitive: bool) -> Result<usize> {
    let mut table = Table::load_tsv(input)?;
    table.set_case_sensitive(case_sensitive);
    if table.is_empty() {
        anyhow::bail!("{} contains no rules", input.display());
    }

    table
        .save_bincode(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(table.len())
}
