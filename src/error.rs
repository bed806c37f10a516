//! Error taxonomy shared by every backup operation.

use std::io;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or unusable backup directory, bad config values, or an
    /// operation that does not belong to the active naming scheme.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Source file missing at backup time, or no backup matches a restore request.
    #[error("{0}")]
    NotFound(String),

    /// Rejected input such as a non-positive retention count.
    #[error("{0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Wraps an io error with the action and path that produced it.
    pub(crate) fn at(action: &str, path: &Path, source: io::Error) -> Self {
        Error::io(format!("failed to {action} {}", path.display()), source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
