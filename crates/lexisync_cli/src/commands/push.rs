//! Push command implementation.

use lexisync_protocol::{ClientLog, PushRequest};
use lexisync_server::ServerConfig;
use std::fs;
use std::path::Path;

/// Runs the push command.
///
/// The snapshot is saved only if the push was applied.
pub fn run(
    path: &Path,
    config: ServerConfig,
    user_id: &str,
    expected: u64,
    logs_path: &Path,
) -> Result<u64, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(logs_path)
        .map_err(|e| format!("Cannot read logs {}: {e}", logs_path.display()))?;
    let logs: Vec<ClientLog> = serde_json::from_str(&text)?;

    let server = super::open_server(path, config)?;
    let response = server.handle_push(&PushRequest::new(user_id, expected, logs))?;

    match (response.new_version, response.failure) {
        (_, Some(failure)) => Err(format!("Push rejected ({:?}): {failure}", failure.kind).into()),
        (Some(version), None) => {
            server.store().save()?;
            println!("Pushed; new version {version}");
            Ok(version)
        }
        (None, None) => Err("Push returned no version".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexisync_store::Store;

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store.json");
        let logs = dir.path().join("logs.json");
        crate::commands::create_user::run(&store, ServerConfig::default(), "u1", None).unwrap();
        fs::write(
            &logs,
            r#"[{"table": "daka", "operate": "INSERT", "recordId": "u1-20240101",
                "record": "{\"userId\":\"u1\",\"forLearningDate\":\"2024-01-01T00:00:00Z\"}"}]"#,
        )
        .unwrap();
        (dir, store, logs)
    }

    #[test]
    fn applies_and_saves() {
        let (_dir, store, logs) = setup();
        assert_eq!(run(&store, ServerConfig::default(), "u1", 0, &logs).unwrap(), 1);

        let reopened = Store::open(&store).unwrap();
        assert_eq!(reopened.version("u1"), Some(1));
        assert!(reopened.get("daka", "u1-20240101").is_some());
    }

    #[test]
    fn stale_push_is_an_error() {
        let (_dir, store, logs) = setup();
        run(&store, ServerConfig::default(), "u1", 0, &logs).unwrap();
        let err = run(&store, ServerConfig::default(), "u1", 0, &logs).unwrap_err();
        assert!(err.to_string().contains("DB_VERSION_NOT_MATCH"));
        assert_eq!(Store::open(&store).unwrap().version("u1"), Some(1));
    }
}
