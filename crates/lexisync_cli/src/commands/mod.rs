//! CLI command implementations.

pub mod check_log;
pub mod create_user;
pub mod dump_log;
pub mod issues;
pub mod prune_log;
pub mod pull;
pub mod push;

use lexisync_server::{ServerConfig, SyncServer};
use lexisync_store::Store;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Loads the server configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let bytes = fs::read(path)
                .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
            Ok(serde_json::from_slice(&bytes)?)
        }
        None => Ok(ServerConfig::default()),
    }
}

/// Opens the snapshot at `path` behind a server.
pub fn open_server(
    path: &Path,
    config: ServerConfig,
) -> Result<SyncServer, Box<dyn std::error::Error>> {
    debug!(path = %path.display(), "opening store");
    let store = Store::open(path)?;
    Ok(SyncServer::new(Arc::new(store), config))
}

/// Opens the snapshot at `path`, which must exist.
pub fn open_existing(path: &Path) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Store::open(path)?)
}
