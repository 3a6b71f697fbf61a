//! Check-log command implementation.

use lexisync_server::ServerConfig;
use std::path::Path;

/// Runs the check-log command. Returns the number of orphaned entries found.
pub fn run(
    path: &Path,
    config: ServerConfig,
    user_id: &str,
    fix: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let server = super::open_server(path, config)?;
    let orphaned = server.orphaned_log_count(user_id);
    let version = server.version(user_id).unwrap_or(0);

    if orphaned == 0 {
        println!("Log of {user_id} is consistent with version {version}");
        return Ok(0);
    }

    println!("Found {orphaned} log entries of {user_id} beyond version {version}");
    if fix {
        let removed = server.delete_orphaned_logs(user_id);
        server.store().save()?;
        println!("Deleted {removed} entries");
    } else {
        println!("Run with --fix to delete them");
    }
    Ok(orphaned)
}
