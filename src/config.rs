use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EtlError, Result};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";

pub const EVENTS_PATH_ENV: &str = "ETL_EVENTS_PATH";
pub const USERS_PATH_ENV: &str = "ETL_USERS_PATH";
pub const ENRICHED_OUTPUT_PATH_ENV: &str = "ETL_ENRICHED_OUTPUT_PATH";
pub const SUMMARY_OUTPUT_PATH_ENV: &str = "ETL_SUMMARY_OUTPUT_PATH";

/// Input and output locations for one run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub events_path: PathBuf,
    pub users_path: PathBuf,
    pub enriched_output_path: PathBuf,
    pub summary_output_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            events_path: PathBuf::from("./data/raw_events.json"),
            users_path: PathBuf::from("./data/users.csv"),
            enriched_output_path: PathBuf::from("./output/clean_events.parquet"),
            summary_output_path: PathBuf::from("./output/daily_summary.parquet"),
        }
    }
}

/// Per-path overrides, typically from command-line flags
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub events_path: Option<PathBuf>,
    pub users_path: Option<PathBuf>,
    pub enriched_output_path: Option<PathBuf>,
    pub summary_output_path: Option<PathBuf>,
}

impl Config {
    /// Read a TOML config file; keys it leaves out keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content)?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else `etl.toml` if it exists, else the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    /// Full resolution: file or defaults, then environment, then overrides
    pub fn resolve(config_file: Option<&Path>, overrides: &PathOverrides) -> Result<Self> {
        let mut config = Self::load_or_default(config_file)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.apply_overrides(overrides);
        config.validate()?;

        info!(
            "Resolved config: events={}, users={}, enriched={}, summary={}",
            config.events_path.display(),
            config.users_path.display(),
            config.enriched_output_path.display(),
            config.summary_output_path.display()
        );
        Ok(config)
    }

    /// Replace paths whose variable is set and non-empty
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets = [
            (EVENTS_PATH_ENV, &mut self.events_path),
            (USERS_PATH_ENV, &mut self.users_path),
            (ENRICHED_OUTPUT_PATH_ENV, &mut self.enriched_output_path),
            (SUMMARY_OUTPUT_PATH_ENV, &mut self.summary_output_path),
        ];
        for (key, slot) in targets {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                debug!("{} overrides configured path", key);
                *slot = PathBuf::from(value.trim());
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &PathOverrides) {
        let targets = [
            (&overrides.events_path, &mut self.events_path),
            (&overrides.users_path, &mut self.users_path),
            (&overrides.enriched_output_path, &mut self.enriched_output_path),
            (&overrides.summary_output_path, &mut self.summary_output_path),
        ];
        for (value, slot) in targets {
            if let Some(path) = value {
                *slot = path.clone();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let named = [
            ("events_path", &self.events_path),
            ("users_path", &self.users_path),
            ("enriched_output_path", &self.enriched_output_path),
            ("summary_output_path", &self.summary_output_path),
        ];
        if let Some((name, _)) = named.iter().find(|(_, p)| p.as_os_str().is_empty()) {
            return Err(EtlError::Config(format!("{} must not be empty", name)));
        }

        if self.enriched_output_path == self.summary_output_path {
            return Err(EtlError::Config(format!(
                "enriched and summary outputs both point at '{}'",
                self.enriched_output_path.display()
            )));
        }

        for output in [&self.enriched_output_path, &self.summary_output_path] {
            if output == &self.events_path || output == &self.users_path {
                return Err(EtlError::Config(format!(
                    "output '{}' would overwrite an input file",
                    output.display()
                )));
            }
        }

        Ok(())
    }
}
