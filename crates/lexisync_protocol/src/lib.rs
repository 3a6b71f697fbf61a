//! # LexiSync Protocol
//!
//! Wire types for the per-user operation-log sync protocol.
//!
//! This crate provides:
//! - `Operation` for the four mutation kinds
//! - `ClientLog` (push shape) and `LogEntry` (stored/pull shape)
//! - Protocol messages (Push, Pull) and failure codes
//! - Names of the synchronizable tables
//! - Timestamp decoding shared by client payloads
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod operation;
mod oplog;
pub mod tables;
pub mod time;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    codes, FailureKind, FullResyncReason, PullRequest, PullResponse, PushRequest, PushResponse,
    ResyncMode, SyncFailure, SyncMessage,
};
pub use operation::Operation;
pub use oplog::{ClientLog, LogEntry};
