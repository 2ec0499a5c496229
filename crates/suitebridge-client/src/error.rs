//! Client error types.

use thiserror::Error;

use suitebridge_auth::AuthError;
use suitebridge_core::TracingError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("failed to initialize logging: {0}")]
    Tracing(#[from] TracingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_display_transparently() {
        let err: ClientError = AuthError::auth_expired("refresh rejected").into();
        assert_eq!(err.to_string(), "auth_expired: refresh rejected");
    }

    #[test]
    fn config_error_display() {
        let err = ClientError::Config("bad port".to_string());
        assert_eq!(err.to_string(), "configuration error: bad port");
    }
}
