use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

use crate::auth::oauth::{self, Tokens};
use crate::auth::tokens_file::{self, TokensFile};
use crate::auth::Session;
use crate::error::{Error, Result};

/// Loads, refreshes or obtains credentials and keeps the token file current.
#[derive(Clone)]
pub struct TokenManager {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub scopes: Vec<String>,
}

impl TokenManager {
    pub fn new(
        credentials_path: impl Into<PathBuf>,
        token_path: impl Into<PathBuf>,
        scopes: &[&str],
    ) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Returns a session with a usable access token; refreshes or runs the
    /// browser flow if needed.
    pub fn ensure_session(&self) -> Result<Session> {
        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let now = Utc::now();
        let cached = tokens_file::load_tokens(&self.token_path)?;

        // 1) cached & not expired
        if let Some(tf) = &cached {
            if tf.is_valid_at(now, &scopes) {
                if let Some(at) = &tf.token {
                    log::debug!("Using cached access token from {}", self.token_path.display());
                    return Ok(Session::new(at.clone()));
                }
            }
        }

        // 2) refresh if possible
        if let Some(tf) = cached {
            if let (true, Some(rt)) = (tf.can_refresh(&scopes), tf.refresh_token.clone()) {
                match self.refresh(tf, &rt, now) {
                    Ok(session) => return Ok(session),
                    Err(e) => log::warn!("Refresh failed: {e}, falling back to interactive auth"),
                }
            }
        }

        // 3) otherwise interactive flow, which needs the client secrets
        let secrets = oauth::load_client_secrets(&self.credentials_path)?;
        log::info!("Running interactive authorization flow");
        let t = oauth::perform_loopback_flow(&secrets, &scopes)?;
        let tf = TokensFile {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: self.scopes.clone(),
            expiry: None,
        };
        self.persist(merge_tokens(tf, t, now))
    }

    fn refresh(&self, tf: TokensFile, rt: &str, now: DateTime<Utc>) -> Result<Session> {
        log::info!("Access token expired; refreshing");
        let t = oauth::refresh_access_token(
            &tf.client_id,
            tf.client_secret.as_deref(),
            &tf.token_uri,
            rt,
        )?;
        self.persist(merge_tokens(tf, t, now))
    }

    fn persist(&self, tf: TokensFile) -> Result<Session> {
        tokens_file::save_tokens(&self.token_path, &tf)?;
        log::debug!("Saved token file {}", self.token_path.display());
        match tf.token {
            Some(at) => Ok(Session::new(at)),
            None => Err(Error::Auth("provider returned no access token".into())),
        }
    }
}

/// Fold a token response into the stored file. A response without a refresh
/// token or scope list keeps the previous ones.
fn merge_tokens(mut tf: TokensFile, t: Tokens, now: DateTime<Utc>) -> TokensFile {
    tf.token = Some(t.access_token);
    if t.refresh_token.is_some() {
        tf.refresh_token = t.refresh_token;
    }
    if let Some(scopes) = t.scopes {
        if !scopes.is_empty() {
            tf.scopes = scopes;
        }
    }
    tf.expiry = t.expires_in.and_then(|s| expiry_after(now, s));
    tf
}

/// `now + secs`, or `None` when that is not a representable instant.
fn expiry_after(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_add_signed(Duration::try_seconds(secs)?)
}
