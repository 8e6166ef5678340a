//! Configuration for crunchd.
//!
//! Loads settings from `/etc/logcruncher/crunchd.toml` (or the file named by
//! `CRUNCHD_CONFIG`) and falls back to defaults with a warning. There are no
//! command-line flags; recurrence belongs to the OS scheduler and paths
//! belong here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default config file path.
pub const CONFIG_PATH: &str = "/etc/logcruncher/crunchd.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CRUNCHD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the per-host upgrade log trees.
    #[serde(default = "default_logs_root")]
    pub logs_root_path: PathBuf,

    /// Where JSON artifacts are written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// File name pattern of the free-text setup log.
    #[serde(default = "default_setupact_pattern")]
    pub setupact_pattern: String,

    /// File name pattern of the appraiser XML document.
    #[serde(default = "default_appraiser_pattern")]
    pub appraiser_pattern: String,

    /// When false, only JSON artifacts are produced.
    #[serde(default)]
    pub save_to_database: bool,

    /// SQLite database location, used when `save_to_database` is on.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_logs_root() -> PathBuf {
    PathBuf::from("/var/lib/logcruncher/logs")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("/var/lib/logcruncher/output")
}

fn default_setupact_pattern() -> String {
    "setupact.log".to_string()
}

fn default_appraiser_pattern() -> String {
    "*.4.0.1_APPRAISER_HumanReadable.xml".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/var/lib/logcruncher/cruncher.db")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logs_root_path: default_logs_root(),
            output_path: default_output_path(),
            setupact_pattern: default_setupact_pattern(),
            appraiser_pattern: default_appraiser_pattern(),
            save_to_database: false,
            database_path: default_database_path(),
        }
    }
}

impl Settings {
    /// Load from `CRUNCHD_CONFIG` or the default path.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load from a specific file, falling back to defaults on any problem.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(settings) => {
                    info!("loaded config from {}", path.display());
                    settings
                }
                Err(err) => {
                    warn!("invalid config {}: {err}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => {
                info!("no config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.setupact_pattern, "setupact.log");
        assert!(!settings.save_to_database);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "logs_root_path = \"/srv/uploads\"\nsave_to_database = true"
        )
        .unwrap();

        let settings = Settings::load_from(file.path());
        assert_eq!(settings.logs_root_path, PathBuf::from("/srv/uploads"));
        assert!(settings.save_to_database);
        assert_eq!(settings.setupact_pattern, "setupact.log");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load_from(Path::new("/nonexistent/crunchd.toml"));
        assert_eq!(settings.setupact_pattern, "setupact.log");
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logs_root_path = [not toml").unwrap();
        let settings = Settings::load_from(file.path());
        assert_eq!(settings.output_path, PathBuf::from("/var/lib/logcruncher/output"));
    }
}
