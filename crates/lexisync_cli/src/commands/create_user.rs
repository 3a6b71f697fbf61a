//! Create-user command implementation.

use lexisync_server::ServerConfig;
use std::path::Path;

/// Runs the create-user command.
pub fn run(
    path: &Path,
    config: ServerConfig,
    user_id: &str,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = super::open_server(path, config)?;
    if server.register_user(user_id, name.unwrap_or(user_id))? {
        server.store().save()?;
        println!("Created user {user_id}");
    } else {
        println!("User {user_id} already exists");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexisync_store::Store;

    #[test]
    fn creates_user_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        run(&path, ServerConfig::default(), "u1", None).unwrap();
        run(&path, ServerConfig::default(), "u1", Some("again")).unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.version("u1"), Some(0));
        assert_eq!(store.get("user", "u1").unwrap()["userName"], "u1");
    }
}
