//! Backup filename grammar.
//!
//! A backup's metadata lives entirely in its filename:
//! - plain:   `<prefix>-backup-<yyyy-MM-dd_HH-mm-ss-SSS>.json`
//! - indexed: `<slot>_<description>_<yyyy-MM-dd_HH-mm-ss-SSS>.json`
//!
//! `BackupName::file_name` and `BackupName::parse` are the only places that
//! know the grammar. Everything else goes through them.

use chrono::{NaiveDateTime, Timelike};

pub const BACKUP_EXTENSION: &str = "json";

/// Filesystems commonly cap a single name component at 255 bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Description reported for names that don't follow the indexed grammar.
pub const UNKNOWN_DESCRIPTION: &str = "Unknown";

const DEFAULT_DESCRIPTION: &str = "backup";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";
const SECONDS_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
// yyyy-MM-dd_HH-mm-ss-SSS
const TIMESTAMP_LEN: usize = 23;

/// Which filename grammar a backup directory uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheme {
    /// Keep the newest N, unlimited new files.
    Plain { prefix: String },
    /// Fixed number of round-robin slots.
    Indexed,
}

impl Scheme {
    pub fn plain(prefix: impl Into<String>) -> Self {
        Scheme::Plain {
            prefix: prefix.into(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Scheme::Indexed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Plain { .. } => "plain",
            Scheme::Indexed => "indexed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupName {
    Plain {
        prefix: String,
        created_at: NaiveDateTime,
    },
    Indexed {
        slot: usize,
        description: String,
        created_at: NaiveDateTime,
    },
}

impl BackupName {
    pub fn plain(prefix: &str, created_at: NaiveDateTime) -> Self {
        BackupName::Plain {
            prefix: prefix.to_string(),
            created_at: truncate_to_millis(created_at),
        }
    }

    /// Description is sanitized here so every indexed name is a valid filename.
    pub fn indexed(slot: usize, description: Option<&str>, created_at: NaiveDateTime) -> Self {
        BackupName::Indexed {
            slot,
            description: sanitize_description(description),
            created_at: truncate_to_millis(created_at),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            BackupName::Plain { prefix, created_at } => format!(
                "{prefix}-backup-{}.{BACKUP_EXTENSION}",
                created_at.format(TIMESTAMP_FORMAT)
            ),
            BackupName::Indexed {
                slot,
                description,
                created_at,
            } => format!(
                "{slot}_{description}_{}.{BACKUP_EXTENSION}",
                created_at.format(TIMESTAMP_FORMAT)
            ),
        }
    }

    /// Returns None for anything that isn't a backup under `scheme`.
    pub fn parse(scheme: &Scheme, file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{BACKUP_EXTENSION}"))?;
        match scheme {
            Scheme::Plain { prefix } => {
                let timestamp = stem.strip_prefix(&format!("{prefix}-backup-"))?;
                Some(BackupName::Plain {
                    prefix: prefix.clone(),
                    created_at: parse_timestamp(timestamp)?,
                })
            }
            Scheme::Indexed => {
                // timestamp is fixed width, so split from the end and let the
                // description keep any underscores it has
                let split = stem.len().checked_sub(TIMESTAMP_LEN)?;
                if !stem.is_char_boundary(split) {
                    return None;
                }
                let (head, timestamp) = stem.split_at(split);
                let head = head.strip_suffix('_')?;
                let (slot, description) = head.split_once('_')?;

                if slot.is_empty()
                    || !slot.bytes().all(|b| b.is_ascii_digit())
                    || description.is_empty()
                {
                    return None;
                }

                Some(BackupName::Indexed {
                    slot: slot.parse().ok()?,
                    description: description.to_string(),
                    created_at: parse_timestamp(timestamp)?,
                })
            }
        }
    }

    pub fn slot(&self) -> Option<usize> {
        match self {
            BackupName::Plain { .. } => None,
            BackupName::Indexed { slot, .. } => Some(*slot),
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            BackupName::Plain { .. } => None,
            BackupName::Indexed { description, .. } => Some(description),
        }
    }

    pub fn created_at(&self) -> NaiveDateTime {
        match self {
            BackupName::Plain { created_at, .. } | BackupName::Indexed { created_at, .. } => {
                *created_at
            }
        }
    }

    /// Same name one millisecond later, used to step around a taken filename.
    pub fn next_millisecond(&self) -> Self {
        let mut next = self.clone();
        match &mut next {
            BackupName::Plain { created_at, .. } | BackupName::Indexed { created_at, .. } => {
                *created_at += chrono::Duration::milliseconds(1);
            }
        }
        next
    }
}

/// Slot number of an indexed backup filename.
pub fn extract_index(file_name: &str) -> Option<usize> {
    BackupName::parse(&Scheme::Indexed, file_name).and_then(|name| name.slot())
}

/// Description of an indexed backup filename, or `"Unknown"`.
pub fn extract_description(file_name: &str) -> String {
    BackupName::parse(&Scheme::Indexed, file_name)
        .and_then(|name| name.description().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_DESCRIPTION.to_string())
}

pub fn extract_timestamp(scheme: &Scheme, file_name: &str) -> Option<NaiveDateTime> {
    BackupName::parse(scheme, file_name).map(|name| name.created_at())
}

pub fn sanitize_description(description: Option<&str>) -> String {
    let cleaned: String = description
        .unwrap_or_default()
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        cleaned
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if s.len() != TIMESTAMP_LEN || !s.is_ascii() {
        return None;
    }
    let (seconds, millis) = s.split_at(TIMESTAMP_LEN - 4);
    let millis = millis.strip_prefix('-')?;
    if !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let base = NaiveDateTime::parse_from_str(seconds, SECONDS_FORMAT).ok()?;
    let millis: i64 = millis.parse().ok()?;
    Some(base + chrono::Duration::milliseconds(millis))
}

fn truncate_to_millis(ts: NaiveDateTime) -> NaiveDateTime {
    let nanos = ts.nanosecond() % 1_000_000_000;
    ts.with_nanosecond(nanos - nanos % 1_000_000).unwrap_or(ts)
}
