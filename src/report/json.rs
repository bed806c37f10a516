//! JSON output for backup listings.
//!
//! Serializes the records for scripting and piping.

use crate::store::catalog::BackupRecord;

pub fn render(records: &[BackupRecord]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| String::from("[]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::time::SystemTime;

    #[test]
    fn renders_records_as_array() {
        let record = BackupRecord {
            path: PathBuf::from("/backups/2_edit_2024-03-09_08-30-15-250.json"),
            slot: Some(2),
            description: Some("edit".to_string()),
            created_at: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_milli_opt(8, 30, 15, 250)
                .unwrap(),
            size_bytes: 10,
            modified: SystemTime::now(),
        };

        let value: serde_json::Value = serde_json::from_str(&render(&[record])).unwrap();
        assert_eq!(value[0]["slot"], 2);
        assert_eq!(value[0]["description"], "edit");
        assert_eq!(value[0]["created_at"], "2024-03-09T08:30:15.250");
        assert!(value[0].get("modified").is_none());
    }

    #[test]
    fn empty_list_is_empty_array() {
        assert_eq!(render(&[]), "[]");
    }
}
