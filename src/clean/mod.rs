//! Retention engine.
//!
//! Keeps the newest `max_backups` backups in a directory and removes the rest:
//! - Dry run mode: reports what would be deleted
//! - Execute mode: deletes, logging each removal
//!
//! Deletion is best effort. A file that can't be removed is logged and
//! recorded in `CleanResult::errors`; the remaining deletions still run.
//! Files that don't parse as backups are never candidates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::catalog;
use crate::store::naming::Scheme;

pub const MIN_BACKUPS_MESSAGE: &str = "maxBackups must be at least 1.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanMode {
    DryRun,
    Execute,
}

#[derive(Debug, Default)]
pub struct CleanResult {
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl CleanResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn run(dir: &Path, scheme: &Scheme, max_backups: i64, mode: CleanMode) -> Result<CleanResult> {
    if max_backups < 1 {
        return Err(Error::Validation(MIN_BACKUPS_MESSAGE.to_string()));
    }
    let keep = usize::try_from(max_backups).unwrap_or(usize::MAX);

    let mut records = catalog::list_backups(dir, scheme)?;
    catalog::sort_by_recency(&mut records);

    let excess = records.into_iter().skip(keep).map(|record| record.path);

    let result = match mode {
        CleanMode::DryRun => CleanResult {
            deleted: excess.collect(),
            errors: Vec::new(),
        },
        CleanMode::Execute => delete_all(excess),
    };

    Ok(result)
}

/// Attempts every deletion, collecting failures instead of stopping at one.
fn delete_all(paths: impl IntoIterator<Item = PathBuf>) -> CleanResult {
    paths
        .into_iter()
        .fold(CleanResult::default(), |mut acc, path| {
            match delete_backup(&path) {
                Ok(()) => acc.deleted.push(path),
                Err(e) => {
                    warn!("{e}");
                    acc.errors.push(e);
                }
            }
            acc
        })
}

fn delete_backup(path: &Path) -> std::result::Result<(), String> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("deleted old backup: {}", path.display());
            Ok(())
        }
        // already gone counts as deleted
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("old backup already gone: {}", path.display());
            Ok(())
        }
        Err(e) => Err(format!("failed to delete backup {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::naming::BackupName;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn seed(dir: &Path, count: u32) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(BackupName::plain("data", at(i)).file_name());
                fs::write(&path, b"x\n").unwrap();
                path
            })
            .collect()
    }

    fn remaining(dir: &Path) -> usize {
        catalog::list_backups(dir, &Scheme::plain("data")).unwrap().len()
    }

    #[test]
    fn rejects_non_positive_limits() {
        let tmp = TempDir::new().unwrap();
        for limit in [0, -1] {
            let err =
                run(tmp.path(), &Scheme::plain("data"), limit, CleanMode::Execute).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert_eq!(err.to_string(), "maxBackups must be at least 1.");
        }
    }

    #[test]
    fn under_limit_deletes_nothing() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path(), 3);

        let result = run(tmp.path(), &Scheme::plain("data"), 5, CleanMode::Execute).unwrap();
        assert!(result.deleted.is_empty());
        assert!(result.is_clean());
        assert_eq!(remaining(tmp.path()), 3);
    }

    #[test]
    fn over_limit_keeps_the_newest() {
        let tmp = TempDir::new().unwrap();
        let paths = seed(tmp.path(), 5);

        let result = run(tmp.path(), &Scheme::plain("data"), 2, CleanMode::Execute).unwrap();
        assert_eq!(result.deleted.len(), 3);
        assert_eq!(remaining(tmp.path()), 2);

        // written in name order, so mtime and the filename tie-break agree
        assert!(paths[3].exists());
        assert!(paths[4].exists());
        assert!(!paths[0].exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path(), 4);

        let result = run(tmp.path(), &Scheme::plain("data"), 1, CleanMode::DryRun).unwrap();
        assert_eq!(result.deleted.len(), 3);
        assert_eq!(remaining(tmp.path()), 4);
    }

    #[test]
    fn foreign_files_are_never_deleted() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path(), 3);
        let live = tmp.path().join("addressbook.json");
        fs::write(&live, b"{}").unwrap();

        run(tmp.path(), &Scheme::plain("data"), 1, CleanMode::Execute).unwrap();
        assert!(live.exists());
        assert_eq!(remaining(tmp.path()), 1);
    }

    #[test]
    fn missing_directory_is_empty_result() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone");
        let result = run(&gone, &Scheme::Indexed, 3, CleanMode::Execute).unwrap();
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn already_deleted_file_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vanished.json");
        assert!(delete_backup(&path).is_ok());
    }

    #[test]
    fn failed_deletion_is_collected_and_the_rest_still_run() {
        let tmp = TempDir::new().unwrap();
        let paths = seed(tmp.path(), 2);
        // remove_file refuses a directory whatever the caller's privileges
        let blocker = tmp.path().join("blocker.json");
        fs::create_dir(&blocker).unwrap();

        let result = delete_all([paths[0].clone(), blocker.clone(), paths[1].clone()]);

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("blocker.json"));
        assert!(!result.is_clean());
        assert_eq!(result.deleted, paths);
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(blocker.is_dir());
    }
}
