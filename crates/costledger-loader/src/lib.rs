//! Event file and configuration loader for costledger.
//!
//! - [`load_options`] reads a `key = value` configuration file into
//!   [`Options`], collecting option warnings instead of failing.
//! - [`load_events`] reads a JSON Lines event file into [`CostEvent`]s.
//! - [`load_state`] and [`save_state`] persist a ledger as JSON.
//!
//! # Example
//!
//! ```ignore
//! use costledger_loader::{load_events, load_options};
//! use std::path::Path;
//!
//! let options = load_options(Path::new("costledger.conf"))?;
//! let events = load_events(Path::new("events.jsonl"))?;
//! println!("{} events for tenant {}", events.len(), options.tenant);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod events;
mod options;

pub use events::{parse_events, CostEvent, EventRecord};
pub use options::{OptionWarning, Options};

use costledger_store::LedgerState;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while loading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error reading or writing a file.
    #[error("failed to access file {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An event line could not be parsed.
    #[error("{}:{line}: invalid event: {message}", .path.display())]
    Parse {
        /// The event file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A configuration line is not `key = value`.
    #[error("{}:{line}: invalid configuration line: {message}", .path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A saved ledger could not be read or written.
    #[error("invalid ledger state in {}: {message}", .path.display())]
    State {
        /// The state file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse configuration text.
///
/// One `key = value` per line; `#` starts a comment and values may be
/// double-quoted. Unknown keys and bad values become
/// [`Options::warnings`]; only a line without `=` is an error.
pub fn parse_options(source: &str, path: &Path) -> Result<Options, LoadError> {
    let mut options = Options::new();
    for (i, raw) in source.lines().enumerate() {
        let text = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
        if text.is_empty() {
            continue;
        }
        let Some((key, value)) = text.split_once('=') else {
            return Err(LoadError::Config {
                path: path.to_path_buf(),
                line: i + 1,
                message: format!("expected key = value, found \"{text}\""),
            });
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        options.set(key.trim(), value);
    }
    Ok(options)
}

/// Load a configuration file.
pub fn load_options(path: &Path) -> Result<Options, LoadError> {
    let options = parse_options(&read(path)?, path)?;
    debug!(path = %path.display(), warnings = options.warnings.len(), "loaded options");
    Ok(options)
}

/// Load an event file.
pub fn load_events(path: &Path) -> Result<Vec<EventRecord>, LoadError> {
    let events = parse_events(&read(path)?, path)?;
    debug!(path = %path.display(), events = events.len(), "loaded events");
    Ok(events)
}

/// Load a ledger saved by [`save_state`].
pub fn load_state(path: &Path) -> Result<LedgerState, LoadError> {
    serde_json::from_str(&read(path)?).map_err(|e| LoadError::State {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Save a ledger as pretty-printed JSON.
pub fn save_state(path: &Path, state: &LedgerState) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(state).map_err(|e| LoadError::State {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, json).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), layers = state.layers().len(), "saved ledger state");
    Ok(())
}
