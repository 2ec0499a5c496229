//! OAuth client keys, the persisted token record, and the live credential.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Default token type when a record does not carry one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// OAuth 2.0 client identity.
///
/// Read from the client key source (a JSON file downloaded from the
/// Google Cloud Console, or an inline environment value). Never written.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientKeys {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URIs registered for the client.
    pub redirect_uris: Vec<String>,
}

/// Structure of the client key JSON.
///
/// Supports both the Cloud Console layout (an `installed` or `web` section)
/// and a flat layout with `client_id` / `client_secret` at the root.
#[derive(Debug, Deserialize)]
struct ClientKeysFile {
    installed: Option<NestedKeys>,
    web: Option<NestedKeys>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedKeys {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientKeys {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uris: Vec::new(),
        }
    }

    /// Reads client keys from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::credential_format(format!(
                "failed to read client key file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses client keys from a JSON string.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ClientKeysFile = serde_json::from_str(json).map_err(|e| {
            AuthError::credential_format(format!("failed to parse client key JSON: {}", e))
        })?;

        let keys = if let Some(nested) = file.installed.or(file.web) {
            Self {
                client_id: nested.client_id,
                client_secret: nested.client_secret,
                redirect_uris: nested.redirect_uris,
            }
        } else if let (Some(id), Some(secret)) = (file.client_id, file.client_secret) {
            Self::new(id, secret)
        } else {
            return Err(AuthError::credential_format(
                "client key JSON must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
            ));
        };

        keys.validate()?;
        Ok(keys)
    }

    /// Checks that both identifier and secret are present.
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::credential_format("client_id is empty"));
        }
        if self.client_secret.trim().is_empty() {
            return Err(AuthError::credential_format("client_secret is empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for ClientKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKeys")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// The persisted token record.
///
/// `expiry_date` is stored as epoch milliseconds, matching what Google's
/// client libraries write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Client identity copied from the key source at save time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl StoredToken {
    /// Parses a token record, rejecting records without any usable token.
    pub fn from_json(json: &str) -> AuthResult<Self> {
        let token: Self = serde_json::from_str(json).map_err(|e| {
            AuthError::credential_format(format!("failed to parse token JSON: {}", e))
        })?;
        if !token.has_token() {
            return Err(AuthError::credential_format(
                "token JSON has neither access_token nor refresh_token",
            ));
        }
        Ok(token)
    }

    fn has_token(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.access_token) || present(&self.refresh_token)
    }

    /// Client identity embedded in the record, if complete.
    pub fn embedded_keys(&self) -> Option<ClientKeys> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(ClientKeys::new(id.clone(), secret.clone()))
            }
            _ => None,
        }
    }
}

/// Where a credential sits relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Expiry is unknown or already passed; a refresh is mandatory.
    Expired,
    /// Still valid, but expiry falls inside the refresh horizon.
    Expiring,
    /// Valid beyond the refresh horizon.
    Valid,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Expiring => "expiring",
            Self::Valid => "valid",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete OAuth credential: token set plus the client identity that
/// owns it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expiry: Option<DateTime<Utc>>,
    pub client_id: String,
    pub client_secret: String,
}

impl Credential {
    /// Merges a token record with client keys.
    pub fn from_parts(token: StoredToken, keys: &ClientKeys) -> Self {
        Self {
            access_token: token.access_token.filter(|s| !s.is_empty()),
            refresh_token: token.refresh_token.filter(|s| !s.is_empty()),
            token_type: token
                .token_type
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            expiry: token.expiry_date,
            client_id: keys.client_id.clone(),
            client_secret: keys.client_secret.clone(),
        }
    }

    /// Converts to the persisted record, stamping the given client identity.
    pub fn to_stored(&self, keys: &ClientKeys) -> StoredToken {
        StoredToken {
            refresh_token: self.refresh_token.clone(),
            access_token: self.access_token.clone(),
            token_type: Some(self.token_type.clone()),
            expiry_date: self.expiry,
            client_id: Some(keys.client_id.clone()),
            client_secret: Some(keys.client_secret.clone()),
        }
    }

    /// The client identity this credential was issued to.
    pub fn keys(&self) -> ClientKeys {
        ClientKeys::new(self.client_id.clone(), self.client_secret.clone())
    }

    /// Classifies the credential at `now` with the given refresh horizon.
    pub fn state_at(&self, now: DateTime<Utc>, horizon: Duration) -> TokenState {
        match self.expiry {
            None => TokenState::Expired,
            Some(expiry) if expiry <= now => TokenState::Expired,
            Some(expiry) if expiry <= now + horizon => TokenState::Expiring,
            Some(_) => TokenState::Valid,
        }
    }

    /// Returns true if `other` may replace this credential.
    ///
    /// A replacement must carry an expiry strictly later than the current
    /// one; a credential is never downgraded.
    pub fn is_superseded_by(&self, other: &Credential) -> bool {
        match (self.expiry, other.expiry) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(current), Some(next)) => next > current,
        }
    }

    /// The `Authorization` header value for this credential.
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .map(|token| format!("{} {}", self.token_type, token))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credential")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorCode;
    use chrono::TimeZone;

    fn credential(expiry: Option<DateTime<Utc>>) -> Credential {
        Credential::from_parts(
            StoredToken {
                access_token: Some("access".to_string()),
                refresh_token: Some("refresh".to_string()),
                expiry_date: expiry,
                ..Default::default()
            },
            &ClientKeys::new("id", "secret"),
        )
    }

    #[test]
    fn keys_from_installed_section() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let keys = ClientKeys::from_json(json).unwrap();
        assert_eq!(keys.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(keys.client_secret, "test-secret");
        assert_eq!(keys.redirect_uris, vec!["http://localhost".to_string()]);
    }

    #[test]
    fn keys_from_web_section() {
        let json = r#"{"web": {"client_id": "web-id", "client_secret": "web-secret"}}"#;
        let keys = ClientKeys::from_json(json).unwrap();
        assert_eq!(keys.client_id, "web-id");
        assert!(keys.redirect_uris.is_empty());
    }

    #[test]
    fn keys_from_flat_layout() {
        let json = r#"{"client_id": "flat-id", "client_secret": "flat-secret", "refresh_token": "x"}"#;
        let keys = ClientKeys::from_json(json).unwrap();
        assert_eq!(keys.client_id, "flat-id");
        assert_eq!(keys.client_secret, "flat-secret");
    }

    #[test]
    fn keys_missing_section_is_format_error() {
        let err = ClientKeys::from_json(r#"{"other": {}}"#).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::CredentialFormat);
        assert!(err.message().contains("client_id"));
    }

    #[test]
    fn keys_malformed_json_is_format_error() {
        let err = ClientKeys::from_json("not json").unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::CredentialFormat);
    }

    #[test]
    fn keys_empty_secret_rejected() {
        let json = r#"{"installed": {"client_id": "id", "client_secret": ""}}"#;
        assert!(ClientKeys::from_json(json).is_err());
    }

    #[test]
    fn keys_debug_redacts_secret() {
        let keys = ClientKeys::new("id", "very-secret");
        assert!(!format!("{:?}", keys).contains("very-secret"));
    }

    #[test]
    fn stored_token_uses_epoch_millis() {
        let json = r#"{
            "refresh_token": "1//refresh",
            "access_token": "ya29.access",
            "token_type": "Bearer",
            "expiry_date": 1741600800123
        }"#;

        let token = StoredToken::from_json(json).unwrap();
        let expiry = token.expiry_date.unwrap();
        assert_eq!(expiry.timestamp_millis(), 1_741_600_800_123);

        let out = serde_json::to_value(&token).unwrap();
        assert_eq!(out["expiry_date"], 1_741_600_800_123_i64);
        assert!(out.get("client_id").is_none());
    }

    #[test]
    fn stored_token_without_tokens_is_format_error() {
        let err = StoredToken::from_json(r#"{"token_type": "Bearer"}"#).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::CredentialFormat);

        let err = StoredToken::from_json(r#"{"access_token": ""}"#).unwrap_err();
        assert_eq!(err.code(), AuthErrorCode::CredentialFormat);
    }

    #[test]
    fn stored_token_refresh_only_is_accepted() {
        let token = StoredToken::from_json(r#"{"refresh_token": "r"}"#).unwrap();
        assert!(token.access_token.is_none());
        assert!(token.expiry_date.is_none());
    }

    #[test]
    fn embedded_keys_need_both_fields() {
        let mut token = StoredToken {
            client_id: Some("id".to_string()),
            ..Default::default()
        };
        assert!(token.embedded_keys().is_none());
        token.client_secret = Some("secret".to_string());
        assert_eq!(token.embedded_keys().unwrap().client_id, "id");
    }

    #[test]
    fn credential_defaults_token_type() {
        let cred = credential(None);
        assert_eq!(cred.token_type, DEFAULT_TOKEN_TYPE);
        assert_eq!(cred.authorization_header().as_deref(), Some("Bearer access"));
    }

    #[test]
    fn to_stored_carries_client_identity() {
        let cred = credential(Some(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()));
        let stored = cred.to_stored(&ClientKeys::new("file-id", "file-secret"));
        assert_eq!(stored.client_id.as_deref(), Some("file-id"));
        assert_eq!(stored.client_secret.as_deref(), Some("file-secret"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.expiry_date, cred.expiry);
    }

    #[test]
    fn state_classification() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let horizon = Duration::minutes(5);

        assert_eq!(credential(None).state_at(now, horizon), TokenState::Expired);
        assert_eq!(credential(Some(now)).state_at(now, horizon), TokenState::Expired);
        assert_eq!(
            credential(Some(now - Duration::milliseconds(1))).state_at(now, horizon),
            TokenState::Expired
        );
        assert_eq!(
            credential(Some(now + Duration::minutes(2))).state_at(now, horizon),
            TokenState::Expiring
        );
        assert_eq!(
            credential(Some(now + Duration::minutes(5))).state_at(now, horizon),
            TokenState::Expiring
        );
        assert_eq!(
            credential(Some(now + Duration::minutes(6))).state_at(now, horizon),
            TokenState::Valid
        );
    }

    #[test]
    fn never_downgrades() {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        let current = credential(Some(now));

        assert!(current.is_superseded_by(&credential(Some(now + Duration::seconds(1)))));
        assert!(!current.is_superseded_by(&credential(Some(now))));
        assert!(!current.is_superseded_by(&credential(Some(now - Duration::hours(1)))));
        assert!(!current.is_superseded_by(&credential(None)));
        assert!(credential(None).is_superseded_by(&current));
    }

    #[test]
    fn debug_redacts_tokens() {
        let rendered = format!("{:?}", credential(None));
        assert!(!rendered.contains("access\""));
        assert!(rendered.contains("<redacted>"));
    }
}
