//! Failed-result envelope.
//!
//! Every command that talks to the backend reports through a [`ToolResult`]
//! on stdout, so a caller driving the binary sees one JSON shape whether the
//! operation worked or not.

use serde::{Deserialize, Serialize};

use suitebridge_auth::AuthError;

/// Hint appended when the stored credential must be replaced.
pub const REAUTH_HINT: &str =
    "run `suitebridge auth logout` and then `suitebridge auth login` to re-authorize";

/// Outcome of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the failure can only be fixed by re-authorizing.
    #[serde(default)]
    pub reauth_required: bool,
    /// True when the same call may succeed if tried again later.
    #[serde(default)]
    pub retryable: bool,
}

impl ToolResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            reauth_required: false,
            retryable: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            reauth_required: false,
            retryable: false,
        }
    }

    /// Wraps an auth error, carrying its message and the re-auth and
    /// retry flags.
    pub fn from_auth_error(err: &AuthError) -> Self {
        if err.requires_reauth() {
            Self {
                reauth_required: true,
                ..Self::failure(format!("{} ({})", err, REAUTH_HINT))
            }
        } else {
            Self {
                retryable: err.is_retryable(),
                ..Self::failure(err.to_string())
            }
        }
    }

    /// Serializes the envelope for stdout.
    pub fn to_json(&self) -> String {
        // A Value-backed struct with string keys always serializes.
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            r#"{"ok": false, "error": "failed to serialize result"}"#.to_string()
        })
    }
}

impl From<AuthError> for ToolResult {
    fn from(err: AuthError) -> Self {
        Self::from_auth_error(&err)
    }
}
