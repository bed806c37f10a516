//! Backup storage.
//!
//! Backups are plain files in one directory, named so that the name alone
//! carries the metadata (see `naming`). `Store` is the handle the rest of the
//! application talks to:
//! - writing plain or slot-indexed backups, optionally debounced
//! - pruning to a retention window after each write
//! - listing and picking backups to restore from
//!
//! The only in-process state is the next indexed slot and the time of the
//! last accepted triggered backup. Both are guarded by mutexes, so a `Store`
//! can be shared between threads.

pub mod catalog;
pub mod naming;
pub mod restore;
pub mod writer;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::clean::{self, CleanMode, CleanResult};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform;
use catalog::BackupRecord;
use naming::{BackupName, Scheme, MAX_FILENAME_LEN};
use writer::{Debouncer, SlotCounter};

/// Creates the backup directory tree if it isn't there yet.
pub fn ensure_dir(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Err(Error::Configuration("backup directory path cannot be empty".to_string())),
    };

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::Configuration(format!(
            "backup path {} exists and is not a directory",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| Error::at("create backup directory", path, e))?;
            info!("created backup directory at {}", path.display());
            Ok(())
        }
        Err(e) => Err(Error::at("inspect backup directory", path, e)),
    }
}

pub struct Store {
    dir: PathBuf,
    scheme: Scheme,
    max_backups: usize,
    max_slots: usize,
    line_ending: &'static [u8],
    clock: Arc<dyn Clock>,
    slots: Mutex<SlotCounter>,
    debounce: Debouncer,
}

impl Store {
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Opens the store on `config.backup_dir`, creating it if needed.
    /// A config with a zero retention or slot count is refused here rather
    /// than failing every later prune.
    pub fn open_with_clock(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        ensure_dir(Some(&config.backup_dir))?;

        let slots = if config.scheme.is_indexed() {
            let records = catalog::list_backups(&config.backup_dir, &config.scheme)?;
            SlotCounter::seed(&records, config.max_slots)
        } else {
            SlotCounter::seed(&[], config.max_slots)
        };

        Ok(Store {
            dir: config.backup_dir.clone(),
            scheme: config.scheme.clone(),
            max_backups: config.max_backups,
            max_slots: config.max_slots,
            line_ending: platform::line_ending(config.platform),
            clock,
            slots: Mutex::new(slots),
            debounce: Debouncer::new(config.debounce),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Slot the next indexed backup will go into.
    pub fn next_slot(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).current()
    }

    /// Writes a new timestamped backup of `source` and prunes to `max_backups`.
    pub fn save_backup(&self, source: &Path) -> Result<PathBuf> {
        let Scheme::Plain { prefix } = &self.scheme else {
            return Err(Error::Configuration(
                "plain backups need the plain scheme; this store is indexed".to_string(),
            ));
        };

        ensure_dir(Some(&self.dir))?;
        let bytes = writer::read_source(source, self.line_ending)?;
        let name = BackupName::plain(prefix, self.clock.now());

        let staged = writer::stage(&self.dir, &bytes)?;
        let path = writer::publish(&self.dir, staged, name)?;
        info!("backup created: {}", path.display());

        self.prune_after_write(self.max_backups);
        Ok(path)
    }

    /// Writes `source` into the next round-robin slot, replacing whatever
    /// occupied it.
    pub fn create_indexed_backup(
        &self,
        source: &Path,
        description: Option<&str>,
    ) -> Result<PathBuf> {
        if !self.scheme.is_indexed() {
            return Err(Error::Configuration(
                "indexed backups need the indexed scheme; this store is plain".to_string(),
            ));
        }

        ensure_dir(Some(&self.dir))?;
        let bytes = writer::read_source(source, self.line_ending)?;

        // held for the whole write so concurrent callers get distinct slots
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.current();
        let name = BackupName::indexed(slot, description, self.clock.now());

        let file_name = name.file_name();
        if file_name.len() > MAX_FILENAME_LEN {
            return Err(Error::Validation(format!(
                "backup filename is {} bytes, the limit is {MAX_FILENAME_LEN}; \
                 use a shorter description",
                file_name.len()
            )));
        }

        let staged = writer::stage(&self.dir, &bytes)?;
        self.evict_slot(slot)?;
        let path = writer::publish(&self.dir, staged, name)?;
        slots.advance();
        drop(slots);

        info!("backup created in slot {slot}: {}", path.display());
        self.prune_after_write(self.max_slots);
        Ok(path)
    }

    /// Writes a backup using whichever scheme the store is configured for.
    /// Plain backups have nowhere to keep a description, so it is dropped.
    pub fn backup(&self, source: &Path, description: Option<&str>) -> Result<PathBuf> {
        match self.scheme {
            Scheme::Plain { .. } => self.save_backup(source),
            Scheme::Indexed => self.create_indexed_backup(source, description),
        }
    }

    /// Debounced `backup`. Returns `Ok(None)` when the call landed inside the
    /// debounce window of the previous accepted one and nothing was written.
    pub fn trigger_backup(
        &self,
        source: &Path,
        description: Option<&str>,
    ) -> Result<Option<PathBuf>> {
        self.debounce
            .run(self.clock.as_ref(), || self.backup(source, description))
    }

    pub fn clean_old_backups(&self, max_backups: i64) -> Result<CleanResult> {
        clean::run(&self.dir, &self.scheme, max_backups, CleanMode::Execute)
    }

    pub fn clean(&self, max_backups: i64, mode: CleanMode) -> Result<CleanResult> {
        clean::run(&self.dir, &self.scheme, max_backups, mode)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        catalog::list_backups(&self.dir, &self.scheme)
    }

    pub fn formatted_backup_list(&self) -> Result<String> {
        catalog::formatted_backup_list(&self.dir, &self.scheme)
    }

    pub fn restore_most_recent_backup(&self) -> Result<Option<PathBuf>> {
        restore::most_recent(&self.dir, &self.scheme)
    }

    pub fn restore_backup_by_index(&self, slot: usize) -> Result<PathBuf> {
        restore::by_index(&self.dir, &self.scheme, slot)
    }

    fn evict_slot(&self, slot: usize) -> Result<()> {
        for record in self.list_backups()?.into_iter().filter(|r| r.slot == Some(slot)) {
            match fs::remove_file(&record.path) {
                Ok(()) => info!("replaced backup in slot {slot}: {}", record.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::at("remove previous backup", &record.path, e)),
            }
        }
        Ok(())
    }

    // the backup itself already succeeded, a failed prune only gets logged
    fn prune_after_write(&self, keep: usize) {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        if let Err(e) = self.clean_old_backups(keep) {
            warn!("cleaning old backups failed: {e}");
        }
    }
}
