//! costledger-replay - Replay an event file and print its postings.
//!
//! # Usage
//!
//! ```bash
//! costledger-replay events.jsonl
//! costledger-replay events.jsonl --config costledger.conf --format json
//! costledger-replay events.jsonl --save-state ledger.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use costledger_loader::save_state;
use costledger_posting::JournalEntry;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Output format for postings.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Journal-style text (default)
    #[default]
    Text,
    /// JSON array of journal entries
    Json,
}

/// Replay costing events and print the resulting postings.
#[derive(Parser, Debug)]
#[command(name = "costledger-replay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The event file (JSON Lines)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Configuration file (`key = value` lines)
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Save the resulting ledger state as JSON
    #[arg(long, value_name = "STATE_FILE")]
    pub save_state: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Main entry point for the replay command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    super::init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let (_, replay) = super::load(&args.file, args.config.as_deref(), false)?;

    let mut stdout = io::stdout().lock();
    match args.format {
        OutputFormat::Text => write_journal(replay.journal.entries(), &mut stdout)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, replay.journal.entries())?;
            writeln!(stdout)?;
        }
    }

    if let Some(path) = &args.save_state {
        save_state(path, &replay.store.snapshot())
            .with_context(|| format!("failed to save state to {}", path.display()))?;
    }
    Ok(())
}

/// Write entries as an indented journal.
pub fn write_journal<W: Write>(entries: &[JournalEntry], writer: &mut W) -> Result<()> {
    for entry in entries {
        let request = &entry.request;
        writeln!(
            writer,
            "{} {} [{}] {}",
            entry.id, request.date, request.metadata.kind, request.description
        )?;
        for line in &request.lines {
            let (side, amount) = if line.debit.is_zero() {
                ("Cr", line.credit)
            } else {
                ("Dr", line.debit)
            };
            writeln!(
                writer,
                "  {side} {:<40} {:>14} {}",
                line.account, amount, request.currency
            )?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
