//! Server configuration.

use lexisync_protocol::tables;
use serde::Deserialize;

/// Configuration for the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Longest accepted `recordId`, in characters.
    pub max_record_id_len: usize,
    /// How many versions behind a client may be and still get an incremental pull.
    pub catch_up_window: u64,
    /// Maximum number of mutations in one push.
    pub max_push_batch: usize,
    /// Name of the per-user raw-word dictionary whose order is checked after every push.
    pub raw_word_dict_name: String,
    /// Tables whose changes trigger the ranking hook.
    pub ranking_tables: Vec<String>,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_record_id_len: 131,
            catch_up_window: 10,
            max_push_batch: 1000,
            raw_word_dict_name: "生词本".to_string(),
            ranking_tables: vec![tables::DAKA.to_string(), tables::USER.to_string()],
        }
    }

    /// Sets the record id length limit.
    pub fn with_max_record_id_len(mut self, len: usize) -> Self {
        self.max_record_id_len = len;
        self
    }

    /// Sets the incremental catch-up window.
    pub fn with_catch_up_window(mut self, window: u64) -> Self {
        self.catch_up_window = window;
        self
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: usize) -> Self {
        self.max_push_batch = size;
        self
    }

    /// Sets the raw-word dictionary name.
    pub fn with_raw_word_dict_name(mut self, name: impl Into<String>) -> Self {
        self.raw_word_dict_name = name.into();
        self
    }

    /// Sets the tables that trigger the ranking hook.
    pub fn with_ranking_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ranking_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if a change to `table` affects ranking.
    pub fn affects_ranking(&self, table: &str) -> bool {
        self.ranking_tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
