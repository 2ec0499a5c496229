//! OAuth 2.0 PKCE flow for Google APIs.
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) over a
//! loopback redirect, plus token refresh and a tokeninfo probe.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Bind a local HTTP listener on the first free port in the range
//! 3. Open the user's browser to Google's consent page
//! 4. Google redirects to the listener with the authorization code
//! 5. Exchange the code (with the verifier) for access and refresh tokens

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration as StdDuration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::credential::{ClientKeys, Credential, StoredToken};
use crate::error::{AuthError, AuthResult};

use super::config::GoogleConfig;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

const CALLBACK_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// OAuth client for Google's token endpoints.
#[derive(Debug)]
pub struct GoogleOAuth {
    http_client: reqwest::Client,
    port_range: (u16, u16),
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                AuthError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            http_client,
            port_range: config.loopback_port_range,
        })
    }

    /// Runs the interactive PKCE flow and returns a new credential.
    ///
    /// Fails if no port in the range is free, the user denies consent, the
    /// callback does not arrive within five minutes, or the code exchange
    /// is rejected.
    pub async fn authorize(
        &self,
        keys: &ClientKeys,
        scopes: &[String],
    ) -> AuthResult<Credential> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback_server(self.port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = pkce.build_auth_url(&keys.client_id, &redirect_uri, scopes);

        info!("starting OAuth flow, opening browser...");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) =
            tokio::task::spawn_blocking(move || wait_for_callback(listener))
                .await
                .map_err(|e| AuthError::internal(format!("callback listener failed: {}", e)))??;

        if received_state != pkce.state {
            return Err(AuthError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens...");
        self.exchange_code(keys, &code, &pkce.verifier, &redirect_uri)
            .await
    }

    /// Exchanges the credential's refresh token for a new access token.
    pub async fn refresh(&self, credential: &Credential) -> AuthResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::authentication("no refresh token available"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.post_token(&params, "token refresh").await?;
        info!("successfully refreshed access token");
        Ok(token.into_credential(&credential.keys(), Utc::now()))
    }

    /// Checks a credential against Google.
    ///
    /// An access token is verified with tokeninfo, which also reports its
    /// real expiry. Without an access token, or when tokeninfo rejects it,
    /// the refresh token is exercised instead.
    pub async fn probe(&self, credential: &Credential) -> AuthResult<Credential> {
        if let Some(access_token) = credential.access_token.as_deref() {
            match self.token_info(access_token).await {
                Ok(info) => {
                    let mut probed = credential.clone();
                    if let Some(expiry) = info.expiry(Utc::now()) {
                        probed.expiry = Some(expiry);
                    }
                    debug!("access token accepted by tokeninfo");
                    return Ok(probed);
                }
                Err(e) if credential.refresh_token.is_some() => {
                    debug!("tokeninfo rejected access token, trying refresh: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        self.refresh(credential).await
    }

    async fn token_info(&self, access_token: &str) -> AuthResult<TokenInfoResponse> {
        let response = self
            .http_client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| AuthError::network(format!("tokeninfo request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(token_endpoint_error(status, &body, "tokeninfo"));
        }

        serde_json::from_str(&body)
            .map_err(|e| AuthError::invalid_response(format!("invalid tokeninfo response: {}", e)))
    }

    async fn exchange_code(
        &self,
        keys: &ClientKeys,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> AuthResult<Credential> {
        let params = [
            ("client_id", keys.client_id.as_str()),
            ("client_secret", keys.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let token = self.post_token(&params, "token exchange").await?;
        if token.refresh_token.is_none() {
            warn!("token exchange returned no refresh token; re-consent may be required later");
        }
        info!("successfully obtained tokens");
        Ok(token.into_credential(keys, Utc::now()))
    }

    async fn post_token(&self, params: &[(&str, &str)], what: &str) -> AuthResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::network(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(token_endpoint_error(status, &body, what));
        }

        serde_json::from_str(&body)
            .map_err(|e| AuthError::invalid_response(format!("invalid token response: {}", e)))
    }
}

/// Maps a non-2xx token endpoint status to an error.
fn token_endpoint_error(status: reqwest::StatusCode, body: &str, what: &str) -> AuthError {
    let message = format!("{} failed ({}): {}", what, status, body);
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        AuthError::rate_limited(message)
    } else if status.is_server_error() {
        AuthError::server(message)
    } else {
        AuthError::authentication(message)
    }
}

/// Tries to bind a TCP listener on an available port in the given range.
fn bind_loopback_server(port_range: (u16, u16)) -> AuthResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            debug!("bound loopback server on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(AuthError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Blocks until the OAuth callback arrives or the timeout passes.
fn wait_for_callback(listener: TcpListener) -> AuthResult<(String, String)> {
    let (tx, rx) = mpsc::channel();

    let _handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(AuthError::authentication("OAuth callback timeout"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(AuthError::internal("callback channel disconnected"))
        }
    }
}

/// Handles one request on the callback listener.
///
/// Returns `None` for requests that are not the callback (favicon and the
/// like), so the listener keeps waiting.
fn handle_callback(mut stream: TcpStream) -> Option<AuthResult<(String, String)>> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return None;
    }

    // GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let path = parts.next()?;
    let query = path.strip_prefix("/callback")?;
    let params = CallbackParams::parse(query.trim_start_matches('?'));

    let response = if params.error.is_some() || params.code.is_none() {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Authorization Failed</h1>\
        <p>You can close this window.</p></body></html>"
    } else {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
        <html><body><h1>Authorization Successful</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(params.into_result())
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_default();
            match key {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                _ => {}
            }
        }
        params
    }

    fn into_result(self) -> AuthResult<(String, String)> {
        if let Some(error) = self.error {
            return Err(AuthError::authentication(format!(
                "authorization denied: {}",
                error
            )));
        }
        match self.code {
            Some(code) => Ok((code, self.state.unwrap_or_default())),
            None => Err(AuthError::authentication(
                "missing authorization code in callback",
            )),
        }
    }
}

/// PKCE flow state.
#[derive(Debug)]
pub struct PkceFlow {
    /// High-entropy random code verifier.
    pub verifier: String,
    /// SHA-256 of the verifier, base64url encoded.
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the Google authorization URL.
    ///
    /// Requests offline access with forced consent so Google always returns
    /// a refresh token.
    pub fn build_auth_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, keys: &ClientKeys, now: DateTime<Utc>) -> Credential {
        Credential::from_parts(
            StoredToken {
                access_token: Some(self.access_token),
                refresh_token: self.refresh_token,
                token_type: self.token_type,
                expiry_date: self.expires_in.map(|secs| now + Duration::seconds(secs)),
                ..Default::default()
            },
            keys,
        )
    }
}

/// Response from the tokeninfo endpoint.
///
/// Google returns the numeric fields as strings.
#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    #[serde(default)]
    exp: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

impl TokenInfoResponse {
    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(exp) = self.exp.as_deref().and_then(|s| s.parse::<i64>().ok()) {
            return DateTime::from_timestamp(exp, 0);
        }
        self.expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| now + Duration::seconds(secs))
    }
}
