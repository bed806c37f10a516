use std::path::PathBuf;

use directories::ProjectDirs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
    Unknown,
}

pub fn detect() -> Platform {
    match std::env::consts::OS {
        "macos" => Platform::MacOS,
        "linux" => Platform::Linux,
        "windows" => Platform::Windows,
        _ => Platform::Unknown,
    }
}

/// Line separator appended to backups that don't already end with one.
pub fn line_ending(platform: Platform) -> &'static [u8] {
    match platform {
        Platform::Windows => b"\r\n",
        Platform::MacOS | Platform::Linux | Platform::Unknown => b"\n",
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "snapkeep")
}

/// Default backup location (~/.local/share/snapkeep/backups or platform equivalent).
/// Falls back to ./backups when no home directory can be determined.
pub fn default_backup_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("backups"))
        .unwrap_or_else(|| PathBuf::from("backups"))
}

/// ~/.config/snapkeep/config.toml or platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
