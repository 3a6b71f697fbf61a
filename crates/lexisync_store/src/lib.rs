//! # LexiSync Store
//!
//! Persistence collaborator for the sync engine.
//!
//! This crate provides:
//! - Tables of JSON rows keyed by record key
//! - Write transactions with read-your-writes and all-or-nothing commit
//! - The version ledger: per-user row locks and compare-and-swap
//! - The append-only operation log, with retention and health queries
//! - Diagnostic issue records
//! - JSON snapshot save/open

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod diagnostics;
mod error;
mod ledger;
mod state;
mod store;
mod transaction;

pub use diagnostics::DiagnosticIssue;
pub use error::{StoreError, StoreResult};
pub use ledger::RowGuard;
pub use state::{LogRecord, TableRows};
pub use store::Store;
pub use transaction::{PendingWrite, TransactionState, WriteTransaction};
