//! Issues command implementation.

use std::path::Path;

/// Runs the issues command.
pub fn run(path: &Path, user_id: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let issues = store.issues(user_id);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&issues)?);
        }
        _ => {
            println!("Issues of {user_id} ({} total)", issues.len());
            println!("================");
            for issue in &issues {
                println!(
                    "{} {} {}",
                    issue.create_time.to_rfc3339(),
                    issue.issue_type,
                    issue.details
                );
            }
        }
    }

    Ok(())
}
