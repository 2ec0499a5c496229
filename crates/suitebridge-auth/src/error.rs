//! Error types for credential and remote-service operations.

use std::fmt;
use thiserror::Error;

/// The category of an [`AuthError`].
///
/// Callers use the code to decide whether an operation may be retried and
/// whether the user has to go through the interactive grant again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorCode {
    /// Stored or environment-supplied token/key data exists but is malformed.
    CredentialFormat,
    /// The token is past expiry and could not be refreshed.
    AuthExpired,
    /// An opportunistic refresh close to expiry failed; the token still works.
    RefreshTransient,
    /// The remote side rejected the credentials.
    AuthenticationFailed,
    /// Network error - connection failed, timeout, DNS resolution, etc.
    NetworkError,
    /// Rate limit exceeded - too many requests.
    RateLimited,
    /// Server returned an error (5xx status codes).
    ServerError,
    /// Invalid response from the server - parse error, unexpected format.
    InvalidResponse,
    /// Configuration error - missing or invalid config.
    ConfigurationError,
    /// Internal error - unexpected state, bug.
    InternalError,
}

impl AuthErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError | Self::RefreshTransient
        )
    }

    /// Returns true if recovery needs a fresh interactive authorization.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::CredentialFormat | Self::AuthExpired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialFormat => "credential_format",
            Self::AuthExpired => "auth_expired",
            Self::RefreshTransient => "refresh_transient",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by the credential manager or a remote collaborator.
#[derive(Debug, Error)]
pub struct AuthError {
    code: AuthErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AuthError {
    /// Creates a new error with the given code and message.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Malformed token or client key data.
    pub fn credential_format(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::CredentialFormat, message)
    }

    /// Hard-expired token that could not be refreshed.
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::AuthExpired, message)
    }

    /// Failed best-effort refresh of a token that is still valid.
    pub fn refresh_transient(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::RefreshTransient, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::AuthenticationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AuthErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true if the persisted token must be discarded and the
    /// interactive grant run again.
    pub fn requires_reauth(&self) -> bool {
        self.code.requires_reauth()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;
