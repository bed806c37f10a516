//! Listing backups that live in a directory.
//!
//! Only files whose names parse under the active scheme count as backups.
//! Everything else (the live data file, temp files, stray notes) is skipped
//! without error.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::naming::{BackupName, Scheme};
use crate::error::{Error, Result};
use crate::report;

/// A backup file on disk and the metadata decoded from its name.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub size_bytes: u64,
    #[serde(skip)]
    pub modified: SystemTime,
}

impl BackupRecord {
    fn new(path: PathBuf, name: BackupName, metadata: &fs::Metadata) -> Self {
        let modified = metadata.modified().unwrap_or_else(|e| {
            warn!("unable to read modification time of {}: {e}", path.display());
            SystemTime::now()
        });

        BackupRecord {
            slot: name.slot(),
            description: name.description().map(str::to_string),
            created_at: name.created_at(),
            size_bytes: metadata.len(),
            modified,
            path,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// All backups in `dir`, newest filename timestamp first.
/// A directory that doesn't exist holds no backups.
pub fn list_backups(dir: &Path, scheme: &Scheme) -> Result<Vec<BackupRecord>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            // the directory itself could not be read
            Err(e) if e.depth() == 0 => return Err(Error::at("list", dir, e.into())),
            Err(e) => {
                debug!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };

        let Some(name) = BackupName::parse(scheme, file_name) else {
            debug!("ignoring {file_name}: not a {} backup", scheme.as_str());
            continue;
        };

        // deleted between the directory read and now
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("skipping {file_name}: {e}");
                continue;
            }
        };

        records.push(BackupRecord::new(entry.into_path(), name, &metadata));
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.path.cmp(&a.path)));
    Ok(records)
}

/// Orders records newest first by modification time. Equal modification
/// times fall back to the filename timestamp, then the path.
pub fn sort_by_recency(records: &mut [BackupRecord]) {
    records.sort_by(newest_first);
}

fn newest_first(a: &BackupRecord, b: &BackupRecord) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.path.cmp(&a.path))
}

/// One line per backup, most recent first. Empty when there are none.
pub fn formatted_backup_list(dir: &Path, scheme: &Scheme) -> Result<String> {
    let records = list_backups(dir, scheme)?;
    Ok(report::table::render(&records))
}
