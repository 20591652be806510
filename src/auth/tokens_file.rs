use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens considered expired this long before their real expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Stored credentials, laid out like Google's "authorized user" JSON so files
/// written by other Google tooling can be reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensFile {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl TokensFile {
    pub fn covers(&self, scopes: &[&str]) -> bool {
        scopes.iter().all(|s| self.scopes.iter().any(|have| have.as_str() == *s))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(exp) => exp <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    /// Usable as-is for the requested scopes.
    pub fn is_valid_at(&self, now: DateTime<Utc>, scopes: &[&str]) -> bool {
        self.token.is_some() && !self.is_expired_at(now) && self.covers(scopes)
    }

    pub fn can_refresh(&self, scopes: &[&str]) -> bool {
        self.refresh_token.is_some() && self.covers(scopes)
    }
}

/// Save the token file, replacing whatever was there.
pub fn save_tokens(path: &Path, tf: &TokensFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }
    let s = serde_json::to_string_pretty(tf)?;
    fs::write(path, s).map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Load the token file if present. An unreadable file is treated as absent.
pub fn load_tokens(path: &Path) -> Result<Option<TokensFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    match serde_json::from_str(&s) {
        Ok(tf) => Ok(Some(tf)),
        Err(e) => {
            log::warn!("Ignoring unreadable token file {}: {e}", path.display());
            Ok(None)
        }
    }
}
