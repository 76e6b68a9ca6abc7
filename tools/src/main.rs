mod compile_table;
mod show_table;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Build and inspect kana rule tables")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a TSV rule table into a bincode snapshot.
    Compile {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "table.bincode")]
        output: PathBuf,

        /// Match ASCII keys regardless of case.
        #[arg(long)]
        case_insensitive: bool,
    },
    /// Print the rules of a table (TSV, bincode, or the built-in romaji table).
    Show {
        /// Table file; omitted means the built-in romaji table.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Only rules whose input starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Compile {
            input,
            output,
            case_insensitive,
        } => {
            let rules = compile_table::run(&input, &output, !case_insensitive)?;
            println!("Wrote {} rules to {}", rules, output.display());
        }
        Command::Show {
            input,
            prefix,
            json,
        } => {
            let table = show_table::load(input.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            show_table::run(&table, prefix.as_deref(), json, &mut stdout)?;
        }
    }
    Ok(())
}
