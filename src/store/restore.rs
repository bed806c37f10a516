//! Picking a backup to restore from.
//!
//! Selection only hands back a path. Loading it into the live data model is
//! the caller's job; `restore_to` is there for callers that just want the
//! bytes copied back over a file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::catalog;
use super::naming::Scheme;
use crate::error::{Error, Result};

/// Backup with the newest modification time, or None when there are no backups.
pub fn most_recent(dir: &Path, scheme: &Scheme) -> Result<Option<PathBuf>> {
    let mut records = catalog::list_backups(dir, scheme)?;
    catalog::sort_by_recency(&mut records);
    Ok(records.into_iter().next().map(|record| record.path))
}

pub fn by_index(dir: &Path, scheme: &Scheme, slot: usize) -> Result<PathBuf> {
    catalog::list_backups(dir, scheme)?
        .into_iter()
        .find(|record| record.slot == Some(slot))
        .map(|record| record.path)
        .ok_or_else(|| Error::NotFound(format!("no backup found in slot {slot}")))
}

/// Replaces `destination` with the contents of `backup` in one rename.
pub fn restore_to(backup: &Path, destination: &Path) -> Result<()> {
    let bytes = fs::read(backup).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::NotFound(format!("backup does not exist: {}", backup.display()))
        }
        _ => Error::at("read", backup, e),
    })?;

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut staged = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| Error::at("create temp file in", parent, e))?;
    staged
        .write_all(&bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| Error::at("write", staged.path(), e))?;
    staged
        .persist(destination)
        .map_err(|e| Error::at("replace", destination, e.error))?;

    info!("restored {} from {}", destination.display(), backup.display());
    Ok(())
}
