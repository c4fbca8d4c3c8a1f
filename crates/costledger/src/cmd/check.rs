//! costledger-check - Verify a ledger's layers and reconcile it with its journal.
//!
//! Replays the event file, scans every layer and record for invariant
//! violations, and compares the inventory valuation with the inventory
//! account balance of the replayed journal.
//!
//! Exits 0 when clean, 1 when anything was found, 2 on error.

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use costledger_posting::GeneralLedger;
use costledger_report::{reconcile, validate_integrity, IntegrityReport, Reconciliation};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Output format for findings.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling integration
    Json,
}

/// Check an inventory cost ledger.
#[derive(Parser, Debug)]
#[command(name = "costledger-check")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The event file (JSON Lines)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Configuration file (`key = value` lines)
    #[arg(short, long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Reconciliation date (defaults to the last event date)
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Show debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output (just use exit code)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// JSON output structure.
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    /// Integrity scan.
    pub integrity: IntegrityReport,
    /// Ledger comparison.
    pub reconciliation: Reconciliation,
    /// Issues plus one if unreconciled.
    pub finding_count: usize,
}

fn run(args: &Args) -> Result<ExitCode> {
    let start = std::time::Instant::now();
    let (options, replay) = super::load(&args.file, args.config.as_deref(), args.quiet)?;

    let as_of = args.as_of.unwrap_or_else(|| replay.default_as_of());
    let ledger_balance = replay.journal.balance(&replay.accounts.inventory, as_of);
    let (integrity, reconciliation) = replay.store.read(|state| {
        (
            validate_integrity(state, &replay.ctx),
            reconcile(
                state,
                &replay.ctx,
                as_of,
                ledger_balance,
                options.reconcile_tolerance,
            ),
        )
    });

    // Journal entries must balance no matter how they were built
    let unbalanced = replay
        .journal
        .entries()
        .par_iter()
        .filter(|entry| !entry.request.is_balanced())
        .count();

    let finding_count =
        integrity.issues.len() + usize::from(!reconciliation.reconciled) + unbalanced;

    if !args.quiet {
        let mut stdout = io::stdout().lock();
        match args.format {
            OutputFormat::Text => {
                write_text(&integrity, &reconciliation, unbalanced, &mut stdout)?;
                if args.verbose {
                    eprintln!(
                        "Checked {} layers and {} postings in {:.2?}",
                        integrity.layers_checked,
                        replay.journal.len(),
                        start.elapsed()
                    );
                }
            }
            OutputFormat::Json => {
                let output = JsonOutput {
                    integrity,
                    reconciliation,
                    finding_count,
                };
                serde_json::to_writer_pretty(&mut stdout, &output)?;
                writeln!(stdout)?;
            }
        }
    }

    Ok(if finding_count == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn write_text<W: Write>(
    integrity: &IntegrityReport,
    reconciliation: &Reconciliation,
    unbalanced: usize,
    writer: &mut W,
) -> Result<()> {
    for issue in &integrity.issues {
        writeln!(writer, "error{issue}")?;
    }
    if unbalanced > 0 {
        writeln!(writer, "error: {unbalanced} unbalanced journal entries")?;
    }

    writeln!(
        writer,
        "Inventory valuation {} vs ledger {} as of {}: difference {}",
        reconciliation.valuation_total,
        reconciliation.ledger_balance,
        reconciliation.as_of,
        reconciliation.difference
    )?;
    if !reconciliation.reconciled {
        writeln!(
            writer,
            "error: difference exceeds tolerance {}",
            reconciliation.tolerance
        )?;
    }

    let findings = integrity.issues.len() + usize::from(!reconciliation.reconciled) + unbalanced;
    if findings == 0 {
        writeln!(
            writer,
            "{} layers, {} consumptions, {} landed costs: no problems found",
            integrity.layers_checked,
            integrity.consumptions_checked,
            integrity.landed_costs_checked
        )?;
    } else {
        writeln!(writer, "{findings} problem(s) found")?;
    }
    Ok(())
}

/// Main entry point for the check command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    super::init_tracing(args.verbose);

    match run(&args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
