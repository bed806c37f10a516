//! Plain text rendering of the backup list.
//!
//! One row per backup: slot, description, timestamp and size. Rows come out
//! in the order given, which the catalog already sorts newest first.

use crate::store::catalog::BackupRecord;
use crate::util::format_bytes;

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn render(records: &[BackupRecord]) -> String {
    let mut output = String::new();

    for record in records {
        let slot = record
            .slot
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let description = record.description.as_deref().unwrap_or("-");

        output.push_str(&format!(
            "{:<4} {:30} {:19} {:>10}\n",
            slot,
            truncate(description, 30),
            record.created_at.format(DISPLAY_FORMAT),
            format_bytes(record.size_bytes)
        ));
    }

    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
