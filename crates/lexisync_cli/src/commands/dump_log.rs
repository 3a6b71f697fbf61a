//! Dump-log command implementation.

use lexisync_store::LogRecord;
use serde::Serialize;
use std::path::Path;

/// Log entry representation for output.
#[derive(Debug, Serialize)]
pub struct LogEntryInfo {
    /// Append sequence.
    pub seq: u64,
    /// Version that wrote the entry.
    pub version: u64,
    /// Operation.
    pub operate: String,
    /// Target table.
    pub table: String,
    /// Target record.
    pub record_id: String,
    /// When the entry was written (RFC 3339).
    pub create_time: String,
    /// Record or filter size in bytes.
    pub record_size: usize,
}

impl From<&LogRecord> for LogEntryInfo {
    fn from(record: &LogRecord) -> Self {
        let entry = &record.entry;
        Self {
            seq: record.seq,
            version: entry.version,
            operate: entry.operate.to_string(),
            table: entry.table.clone(),
            record_id: entry.record_id.clone(),
            create_time: entry.create_time.to_rfc3339(),
            record_size: entry.record.len(),
        }
    }
}

/// Runs the dump-log command.
pub fn run(
    path: &Path,
    user_id: &str,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_existing(path)?;
    let records = collect(&store.log_for(user_id), limit);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(user_id, &records);
        }
    }

    Ok(())
}

fn collect(records: &[LogRecord], limit: Option<usize>) -> Vec<LogEntryInfo> {
    records
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(LogEntryInfo::from)
        .collect()
}

fn print_text_output(user_id: &str, records: &[LogEntryInfo]) {
    println!("Operation log of {user_id} ({} entries)", records.len());
    println!("================");
    println!();

    for record in records {
        println!(
            "[{:08}] v{:<6} {:12} {:18} {} ({} bytes, {})",
            record.seq,
            record.version,
            record.operate,
            record.table,
            record.record_id,
            record.record_size,
            record.create_time
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lexisync_protocol::{LogEntry, Operation};

    #[test]
    fn limit_applies_in_append_order() {
        let now = Utc::now();
        let records: Vec<LogRecord> = (1..=3)
            .map(|seq| LogRecord {
                seq,
                entry: LogEntry::new("u1", seq, "daka", Operation::Insert, format!("r{seq}"), "{}", now, now),
            })
            .collect();

        let out = collect(&records, Some(2));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].record_id, "r2");
        assert_eq!(out[0].operate, "INSERT");
        assert_eq!(collect(&records, None).len(), 3);
    }
}
