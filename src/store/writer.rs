//! Writing backup files.
//!
//! Source bytes are staged in a temp file inside the backup directory, then
//! published under their final name with a no-clobber rename. A name that is
//! already taken is retried one millisecond later, so a write never replaces
//! an existing backup.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::catalog::BackupRecord;
use super::naming::BackupName;
use crate::clock::Clock;
use crate::error::{Error, Result};

// a thousand collisions means the clock is stuck, not that names are busy
const MAX_PUBLISH_ATTEMPTS: usize = 1000;

/// Reads the whole source file and makes sure it ends with `line_ending`.
pub(crate) fn read_source(source: &Path, line_ending: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = fs::read(source).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::NotFound(format!("the file to back up does not exist: {}", source.display()))
        }
        _ => Error::at("read", source, e),
    })?;

    if !bytes.ends_with(line_ending) {
        bytes.extend_from_slice(line_ending);
    }
    Ok(bytes)
}

/// Writes `bytes` to a hidden temp file in `dir`. Dropped unpublished, it
/// removes itself.
pub(crate) fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix(".snapkeep-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::at("create temp file in", dir, e))?;

    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| Error::at("write", staged.path(), e))?;

    Ok(staged)
}

/// Moves a staged file to its final name without replacing anything.
pub(crate) fn publish(
    dir: &Path,
    mut staged: NamedTempFile,
    mut name: BackupName,
) -> Result<PathBuf> {
    for _ in 0..MAX_PUBLISH_ATTEMPTS {
        let path = dir.join(name.file_name());
        match staged.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("{} already exists, trying the next millisecond", path.display());
                staged = e.file;
                name = name.next_millisecond();
            }
            Err(e) => return Err(Error::at("write backup", &path, e.error)),
        }
    }

    Err(Error::at(
        "find a free backup name in",
        dir,
        io::Error::new(io::ErrorKind::AlreadyExists, "every candidate name is taken"),
    ))
}

/// Round robin position for the next indexed backup.
#[derive(Debug)]
pub(crate) struct SlotCounter {
    next: usize,
    max_slots: usize,
}

impl SlotCounter {
    /// Continues the rotation after the most recently created backup, which is
    /// the least recently used slot when slots were filled in order.
    pub(crate) fn seed(records: &[BackupRecord], max_slots: usize) -> Self {
        let max_slots = max_slots.max(1);
        let next = records
            .iter()
            .filter_map(|r| r.slot.map(|slot| (r.created_at, slot)))
            .max()
            .map(|(_, slot)| (slot + 1) % max_slots)
            .unwrap_or(0);

        debug!("next backup slot: {next}");
        SlotCounter { next, max_slots }
    }

    pub(crate) fn current(&self) -> usize {
        self.next
    }

    pub(crate) fn advance(&mut self) {
        self.next = (self.next + 1) % self.max_slots;
    }
}

/// Drops triggers that arrive within `interval` of the last accepted one.
#[derive(Debug)]
pub(crate) struct Debouncer {
    interval: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl Debouncer {
    pub(crate) fn new(interval: Duration) -> Self {
        Debouncer {
            interval,
            last_accepted: Mutex::new(None),
        }
    }

    /// Runs `write` unless the previous accepted call was too recent.
    ///
    /// Elapsed time comes from the clock's monotonic reading. It is read,
    /// compared and updated while holding the lock, and the lock stays held
    /// through `write`, so racing callers can't both get through inside one
    /// window.
    pub(crate) fn run<T>(
        &self,
        clock: &dyn Clock,
        write: impl FnOnce() -> Result<T>,
    ) -> Result<Option<T>> {
        let mut last = self.last_accepted.lock().unwrap_or_else(PoisonError::into_inner);
        let now = clock.monotonic();

        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < self.interval {
                info!("backup skipped: last backup was {}ms ago", elapsed.as_millis());
                return Ok(None);
            }
        }

        *last = Some(now);
        write().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(10, 0, second, 0)
            .unwrap()
    }

    fn record(slot: usize, created_at: NaiveDateTime) -> BackupRecord {
        BackupRecord {
            path: PathBuf::from(BackupName::indexed(slot, None, created_at).file_name()),
            slot: Some(slot),
            description: Some("backup".to_string()),
            created_at,
            size_bytes: 0,
            modified: SystemTime::now(),
        }
    }

    #[test]
    fn source_gets_a_trailing_newline() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("data.json");

        fs::write(&source, b"{\"a\":1}").unwrap();
        assert_eq!(read_source(&source, b"\n").unwrap(), b"{\"a\":1}\n");

        fs::write(&source, b"{\"a\":1}\n").unwrap();
        assert_eq!(read_source(&source, b"\n").unwrap(), b"{\"a\":1}\n");

        fs::write(&source, b"{}\n").unwrap();
        assert_eq!(read_source(&source, b"\r\n").unwrap(), b"{}\n\r\n");
    }

    #[test]
    fn missing_source_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = read_source(&tmp.path().join("missing.json"), b"\n").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn publish_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let name = BackupName::plain("data", at(0));

        let staged = stage(tmp.path(), b"one\n").unwrap();
        let first = publish(tmp.path(), staged, name.clone()).unwrap();
        let staged = stage(tmp.path(), b"two\n").unwrap();
        let second = publish(tmp.path(), staged, name).unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), b"one\n");
        assert_eq!(fs::read(&second).unwrap(), b"two\n");
        assert_eq!(
            second.file_name().unwrap().to_str().unwrap(),
            "data-backup-2024-03-09_10-00-00-001.json"
        );
    }

    #[test]
    fn unpublished_stage_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let staged = stage(tmp.path(), b"x").unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn slot_counter_starts_at_zero_when_empty() {
        assert_eq!(SlotCounter::seed(&[], 10).current(), 0);
    }

    #[test]
    fn slot_counter_continues_after_newest_backup() {
        let records = vec![record(0, at(1)), record(1, at(2)), record(2, at(3))];
        assert_eq!(SlotCounter::seed(&records, 10).current(), 3);

        // full rotation: slot 9 newest, so slot 0 is next
        let records: Vec<_> = (0..10).map(|s| record(s, at(s as u32))).collect();
        assert_eq!(SlotCounter::seed(&records, 10).current(), 0);

        // wrapped rotation: 0 and 1 rewritten after 2..9
        let mut records: Vec<_> = (2..10).map(|s| record(s, at(s as u32))).collect();
        records.push(record(0, at(20)));
        records.push(record(1, at(21)));
        assert_eq!(SlotCounter::seed(&records, 10).current(), 2);
    }

    #[test]
    fn slot_counter_wraps() {
        let mut counter = SlotCounter::seed(&[record(8, at(0))], 10);
        assert_eq!(counter.current(), 9);
        counter.advance();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn debouncer_drops_calls_inside_window() {
        let clock = ManualClock::new(at(0));
        let debouncer = Debouncer::new(Duration::from_millis(3000));

        assert_eq!(debouncer.run(&clock, || Ok(1)).unwrap(), Some(1));
        assert_eq!(debouncer.run(&clock, || Ok(2)).unwrap(), None);

        clock.advance(Duration::from_millis(2999));
        assert_eq!(debouncer.run(&clock, || Ok(3)).unwrap(), None);

        clock.advance(Duration::from_millis(1));
        assert_eq!(debouncer.run(&clock, || Ok(4)).unwrap(), Some(4));
    }

    #[test]
    fn wall_clock_steps_do_not_move_the_window() {
        let clock = ManualClock::new(at(0));
        let debouncer = Debouncer::new(Duration::from_secs(3));
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_some());

        // an hour forward on the wall clock alone, as at a DST change
        clock.set(at(0) + chrono::Duration::hours(1));
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_none());

        clock.set(at(0) - chrono::Duration::hours(1));
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_none());

        clock.advance(Duration::from_secs(3));
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_some());
    }

    #[test]
    fn zero_interval_never_debounces() {
        let clock = ManualClock::new(at(0));
        let debouncer = Debouncer::new(Duration::ZERO);
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_some());
        assert!(debouncer.run(&clock, || Ok(())).unwrap().is_some());
    }

    #[test]
    fn failed_write_still_counts_as_accepted() {
        let clock = ManualClock::new(at(0));
        let debouncer = Debouncer::new(Duration::from_secs(3));

        let failed: Result<Option<()>> =
            debouncer.run(&clock, || Err(Error::NotFound("gone".into())));
        assert!(failed.is_err());
        assert_eq!(debouncer.run(&clock, || Ok(())).unwrap(), None);
    }

    #[test]
    fn racing_triggers_accept_exactly_one() {
        let clock = Arc::new(ManualClock::new(at(0)));
        let debouncer = Arc::new(Debouncer::new(Duration::from_secs(3)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                let debouncer = Arc::clone(&debouncer);
                std::thread::spawn(move || {
                    debouncer.run(clock.as_ref(), || Ok(())).unwrap().is_some()
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|a| *a)
            .count();
        assert_eq!(accepted, 1);
    }
}
