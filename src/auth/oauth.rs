use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by the oauth flow (in-memory)
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scopes: Option<Vec<String>>,
}

/// OAuth client registration, as downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    super::tokens_file::DEFAULT_TOKEN_URI.to_string()
}

/// Read a client secrets file. A missing file is a configuration error.
pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    if !path.exists() {
        return Err(Error::Configuration(format!(
            "credentials file '{}' not found; download it from the Google Cloud Console",
            path.display()
        )));
    }
    let s = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let file: ClientSecretsFile = serde_json::from_str(&s)?;
    file.installed.or(file.web).ok_or_else(|| {
        Error::Configuration(format!(
            "credentials file '{}' has neither an 'installed' nor a 'web' client",
            path.display()
        ))
    })
}

fn build_client(
    client_id: &str,
    client_secret: Option<&str>,
    auth_uri: &str,
    token_uri: &str,
) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(auth_uri.to_string())
        .map_err(|e| Error::Configuration(format!("invalid auth_uri '{auth_uri}': {e}")))?;
    let token_url = TokenUrl::new(token_uri.to_string())
        .map_err(|e| Error::Configuration(format!("invalid token_uri '{token_uri}': {e}")))?;
    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        client_secret.map(|s| ClientSecret::new(s.to_string())),
        auth_url,
        Some(token_url),
    ))
}

fn into_tokens<T: TokenResponse<oauth2::basic::BasicTokenType>>(token: &T) -> Tokens {
    Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
        scopes: token
            .scopes()
            .map(|s| s.iter().map(|x| x.to_string()).collect()),
    }
}

/// Exchange a refresh token for a new access token using the oauth2 crate
pub fn refresh_access_token(
    client_id: &str,
    client_secret: Option<&str>,
    token_uri: &str,
    refresh_token: &str,
) -> Result<Tokens> {
    let oauth_client = build_client(client_id, client_secret, DEFAULT_AUTH_URI, token_uri)?;

    let rt = RefreshToken::new(refresh_token.to_string());
    let token = oauth_client
        .exchange_refresh_token(&rt)
        .request(http_client)
        .map_err(|e| Error::Auth(format!("token refresh failed: {e}")))?;

    Ok(into_tokens(&token))
}

/// Authorization Code + PKCE flow on a loopback redirect. Opens the system
/// browser and captures the code with a tiny local server on a free port.
pub fn perform_loopback_flow(secrets: &ClientSecrets, scopes: &[&str]) -> Result<Tokens> {
    let bind_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));

    // Listen before the browser is opened so the redirect can't be missed.
    let server = Server::http(bind_addr)
        .map_err(|e| Error::Auth(format!("failed to bind OAuth callback server: {e}")))?;
    let port = server.server_addr().port();
    let redirect_uri = format!("http://127.0.0.1:{port}/");

    let oauth_client = build_client(
        &secrets.client_id,
        secrets.client_secret.as_deref(),
        &secrets.auth_uri,
        &secrets.token_uri,
    )?
    .set_redirect_uri(
        RedirectUrl::new(redirect_uri.clone())
            .map_err(|e| Error::Auth(format!("invalid redirect uri: {e}")))?,
    );

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut request = oauth_client
        .authorize_url(CsrfToken::new_random)
        .set_pkce_challenge(pkce_challenge)
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent");
    for scope in scopes {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let (auth_url, csrf_token) = request.url();

    println!("Please visit this URL to authorize this application:\n{auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        log::warn!("could not open browser automatically: {e}");
    }

    let code = wait_for_code(&server, &redirect_uri, csrf_token.secret())?;

    let token = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|e| {
            log::debug!("token exchange failed: {e:#?}");
            Error::Auth(format!("token exchange failed: {e}"))
        })?;

    Ok(into_tokens(&token))
}

fn wait_for_code(server: &Server, redirect_uri: &str, expected_state: &str) -> Result<String> {
    let wait_until = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        // request.url() is a path+query like "/?code=...&state=..."
        let full = format!("{}{}", redirect_uri.trim_end_matches('/'), request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        match parse_callback(&parsed, expected_state) {
            Callback::Code(code) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            Callback::Denied(reason) => {
                let _ = request.respond(Response::from_string(
                    "Authorization was denied. You can close this tab.",
                ));
                return Err(Error::Auth(format!("authorization denied: {reason}")));
            }
            Callback::StateMismatch => {
                let _ = request.respond(Response::from_string("State mismatch."));
                return Err(Error::Auth("OAuth state mismatch on redirect".into()));
            }
            Callback::Nothing => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(Error::Auth("no authorization code received within timeout".into()))
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    Nothing,
}

fn parse_callback(url: &Url, expected_state: &str) -> Callback {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }

    if let Some(e) = error {
        return Callback::Denied(e);
    }
    match code {
        Some(c) if state.as_deref() == Some(expected_state) => Callback::Code(c),
        Some(_) => Callback::StateMismatch,
        None => Callback::Nothing,
    }
}
