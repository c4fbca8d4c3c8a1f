//! Inventory costing CLI tools.
//!
//! This crate provides command-line tools over costledger event files:
//!
//! - `costledger-replay`: Replay events and print the resulting postings
//! - `costledger-report`: Valuation, aging, variance and summary reports
//! - `costledger-check`: Integrity check and general-ledger reconciliation
//!
//! # Example Usage
//!
//! ```bash
//! costledger-replay events.jsonl --config costledger.conf
//! costledger-report events.jsonl valuation --as-of 2024-06-30
//! costledger-check events.jsonl --format json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod replay;
