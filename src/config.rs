//! Optional TOML configuration.
//!
//! Looked up at `--config`, then `$GMAIL_ATTACHMENTS_CONFIG`, then
//! `<config dir>/gmail_attachments/config.toml`. Without a file the built-in
//! defaults apply.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::sink::local::DEFAULT_DOWNLOAD_FOLDER;

pub const CONFIG_ENV_VAR: &str = "GMAIL_ATTACHMENTS_CONFIG";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub download_folder: PathBuf,
    /// Drive folder that uploads go to. Required by the `drive` command.
    pub drive_folder_id: Option<String>,
    /// env_logger filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            download_folder: PathBuf::from(DEFAULT_DOWNLOAD_FOLDER),
            drive_folder_id: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn require_drive_folder_id(&self) -> Result<&str> {
        self.drive_folder_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "drive_folder_id is not set in the configuration file".to_string(),
                )
            })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gmail_attachments").join("config.toml"))
}

/// Load the configuration. An explicitly named file must exist; the default
/// location may be absent.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Configuration(format!(
                "config file '{}' not found",
                path.display()
            )));
        }
        return read_config(path);
    }

    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return load_config(Some(Path::new(&path)));
    }

    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => Ok(Config::default()),
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    toml::from_str(&s).map_err(|e| {
        Error::Configuration(format!("invalid config file '{}': {e}", path.display()))
    })
}
