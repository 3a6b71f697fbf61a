//! Prune-log command implementation.

use lexisync_server::ServerConfig;
use std::path::Path;

/// Runs the prune-log command.
pub fn run(
    path: &Path,
    config: ServerConfig,
    user_id: &str,
    before_version: u64,
) -> Result<usize, Box<dyn std::error::Error>> {
    let server = super::open_server(path, config)?;
    let removed = server.prune_log(user_id, before_version);
    server.store().save()?;
    println!("Removed {removed} log entries of {user_id} below version {before_version}");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexisync_protocol::{LogEntry, Operation};
    use lexisync_store::Store;

    #[test]
    fn removes_entries_below_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = Store::open(&path).unwrap();
            let mut txn = store.begin_write();
            let now = Utc::now();
            for version in 1..=3 {
                txn.append_log(LogEntry::new("u1", version, "daka", Operation::Insert, "r", "{}", now, now))
                    .unwrap();
            }
            txn.commit().unwrap();
            store.save().unwrap();
        }

        assert_eq!(run(&path, ServerConfig::default(), "u1", 3).unwrap(), 2);
        let store = Store::open(&path).unwrap();
        assert_eq!(store.log_for("u1").len(), 1);
        assert_eq!(store.pruned_before("u1"), 3);

        assert_eq!(run(&path, ServerConfig::default(), "u1", 3).unwrap(), 0);
    }
}
