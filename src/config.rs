use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::{Cli, Command, SchemeArg};
use crate::error::{Error, Result};
use crate::platform::{self, Platform};
use crate::store::naming::Scheme;

pub const DEFAULT_MAX_BACKUPS: usize = 10;
pub const DEFAULT_MAX_SLOTS: usize = 10;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(3000);
pub const DEFAULT_PREFIX: &str = "data";

#[derive(Debug, Clone)]
pub struct Config {
    pub backup_dir: PathBuf,
    pub scheme: Scheme,
    pub max_backups: usize,
    pub max_slots: usize,
    pub debounce: Duration,
    pub verbose: bool,
    pub json_output: bool,
    pub platform: Platform,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backup_dir: platform::default_backup_dir(),
            scheme: Scheme::plain(DEFAULT_PREFIX),
            max_backups: DEFAULT_MAX_BACKUPS,
            max_slots: DEFAULT_MAX_SLOTS,
            debounce: DEFAULT_DEBOUNCE,
            verbose: false,
            json_output: false,
            platform: platform::detect(),
        }
    }
}

/// On-disk config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    backup_dir: Option<PathBuf>,
    scheme: Option<String>,
    prefix: Option<String>,
    max_backups: Option<usize>,
    max_slots: Option<usize>,
    debounce: Option<String>,
}

impl Config {
    /// Defaults overlaid with a config file. An explicit `path` must exist;
    /// the default location is only read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => platform::default_config_path().filter(|p| p.is_file()),
        };

        if let Some(path) = path {
            let text = fs::read_to_string(&path).map_err(|e| {
                Error::Configuration(format!("cannot read config file {}: {e}", path.display()))
            })?;
            config.apply_toml(&text)?;
        }

        Ok(config)
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::load(cli.config.as_deref())?;

        if let Some(dir) = &cli.dir {
            config.backup_dir = dir.clone();
        }

        let prefix = cli.prefix.clone().or_else(|| match &config.scheme {
            Scheme::Plain { prefix } => Some(prefix.clone()),
            Scheme::Indexed => None,
        });

        match cli.scheme {
            Some(SchemeArg::Indexed) => config.scheme = Scheme::Indexed,
            Some(SchemeArg::Plain) => {
                config.scheme = Scheme::plain(prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()))
            }
            None => {
                if let (Scheme::Plain { .. }, Some(prefix)) = (&config.scheme, cli.prefix.clone()) {
                    config.scheme = Scheme::plain(prefix);
                }
            }
        }

        config.verbose = cli.verbose;
        config.json_output = matches!(&cli.command, Command::List(args) if args.json);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid config file: {e}")))?;

        if let Some(dir) = file.backup_dir {
            self.backup_dir = dir;
        }

        let prefix = file.prefix.clone().unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        match file.scheme.as_deref() {
            Some(name) => self.scheme = parse_scheme(name, prefix)?,
            None => {
                if let (Scheme::Plain { .. }, Some(prefix)) = (&self.scheme, file.prefix) {
                    self.scheme = Scheme::plain(prefix);
                }
            }
        }

        if let Some(max_backups) = file.max_backups {
            self.max_backups = max_backups;
        }
        if let Some(max_slots) = file.max_slots {
            self.max_slots = max_slots;
        }
        if let Some(debounce) = file.debounce {
            self.debounce = humantime::parse_duration(&debounce)
                .map_err(|e| Error::Configuration(format!("invalid debounce '{debounce}': {e}")))?;
        }

        self.validate()
    }

    /// Number of backups a write prunes down to under the active scheme.
    pub fn retention_limit(&self) -> usize {
        match self.scheme {
            Scheme::Plain { .. } => self.max_backups,
            Scheme::Indexed => self.max_slots,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.backup_dir.as_os_str().is_empty() {
            return Err(Error::Configuration("backup_dir cannot be empty".to_string()));
        }
        if self.max_backups == 0 {
            return Err(Error::Configuration("max_backups must be at least 1".to_string()));
        }
        if self.max_slots == 0 {
            return Err(Error::Configuration("max_slots must be at least 1".to_string()));
        }
        if let Scheme::Plain { prefix } = &self.scheme {
            if prefix.is_empty() || prefix.contains(|c: char| c == '/' || c == '\\') {
                return Err(Error::Configuration(format!("invalid backup prefix '{prefix}'")));
            }
        }
        Ok(())
    }
}

fn parse_scheme(name: &str, prefix: String) -> Result<Scheme> {
    match name {
        "plain" => Ok(Scheme::plain(prefix)),
        "indexed" => Ok(Scheme::Indexed),
        other => Err(Error::Configuration(format!(
            "unknown scheme '{other}', expected 'plain' or 'indexed'"
        ))),
    }
}
