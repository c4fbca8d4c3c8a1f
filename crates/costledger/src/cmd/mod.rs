//! Command implementations for CLI tools.
//!
//! Each module contains the full implementation for a command,
//! which can be invoked by thin wrapper binaries.

pub mod check;
pub mod replay_cmd;
pub mod report_cmd;

use crate::replay::Replay;
use anyhow::{Context, Result};
use costledger_loader::{load_events, load_options, Options};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

/// Install a DEBUG-level subscriber on stderr when `verbose` is set.
pub(crate) fn init_tracing(verbose: bool) {
    if verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Load options (or defaults) and replay the event file.
///
/// Option warnings are printed to stderr unless `quiet`.
pub(crate) fn load(file: &Path, config: Option<&Path>, quiet: bool) -> Result<(Options, Replay)> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }

    let options = match config {
        Some(path) => load_options(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Options::new(),
    };
    if !quiet {
        for warning in &options.warnings {
            eprintln!("warning[{}]: {}", warning.code, warning.message);
        }
    }

    let records =
        load_events(file).with_context(|| format!("failed to load {}", file.display()))?;
    let mut replay = Replay::new(&options);
    replay
        .run(&records)
        .with_context(|| format!("failed to replay {}", file.display()))?;
    Ok((options, replay))
}
