//! # LexiSync Server
//!
//! Per-user operation-log synchronization for the vocabulary app.
//!
//! This crate provides:
//! - Per-table appliers behind a registry
//! - The push-sync engine (version gate, atomic apply, post-sync checks)
//! - The resync planner (incremental tail or full reconstruction)
//! - Ranking and diagnostics hooks
//! - The `SyncServer` request facade
//!
//! # Protocol
//!
//! 1. A device pulls from the last version it applied and replays the result
//! 2. It pushes its pending mutations together with that version
//! 3. The server applies the whole batch or nothing, and answers with the
//!    version to present next time
//!
//! A push with a stale version fails with `DB_VERSION_NOT_MATCH`; the device
//! pulls and resubmits.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod appliers;
mod config;
mod diagnostics;
mod engine;
mod error;
mod handler;
mod planner;
mod ranking;
mod server;
mod validation;

pub use appliers::{ApplierRegistry, ApplyOutcome, SkipReason, TableApplier};
pub use config::ServerConfig;
pub use diagnostics::DiagnosticsSink;
pub use engine::SyncEngine;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use planner::{choose_mode, ResyncPlanner};
pub use ranking::{Leaderboard, NoopRanking, RankingHook};
pub use server::SyncServer;
pub use validation::{PostSyncCheck, RawWordOrderCheck, Violation};
