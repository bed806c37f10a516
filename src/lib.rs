//! Backup manager for a single data file.
//!
//! Snapshots the file into a backup directory, keeps the number of copies
//! bounded, and finds copies to restore from. See `store::Store`.

pub mod clean;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod platform;
pub mod report;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use store::Store;
