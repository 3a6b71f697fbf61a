//! Pull command implementation.

use lexisync_protocol::{PullRequest, ResyncMode};
use lexisync_server::{ServerConfig, SyncServer};
use std::path::Path;
use std::sync::Arc;

/// Runs the pull command. Read-only.
pub fn run(
    path: &Path,
    config: ServerConfig,
    user_id: &str,
    from_version: u64,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let server = SyncServer::new(Arc::new(store), config);
    let response = server.handle_pull(&PullRequest::new(user_id, from_version))?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => {
            let mode = match response.mode {
                ResyncMode::Incremental => "incremental".to_string(),
                ResyncMode::Full(reason) => format!("full ({reason})"),
            };
            println!("Pull for {user_id} from version {from_version}");
            println!("================");
            println!("Mode:    {mode}");
            println!("Version: {}", response.version);
            println!("Entries: {}", response.logs.len());
            println!();
            for entry in &response.logs {
                println!(
                    "v{:<6} {:12} {:18} {}",
                    entry.version, entry.operate, entry.table, entry.record_id
                );
            }
        }
    }

    Ok(())
}
