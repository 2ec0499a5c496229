//! The authenticated client handle.

use tokio::sync::{Mutex, MutexGuard};

use crate::credential::Credential;
use crate::error::{AuthError, AuthResult};

/// Handle wrapping the live credential.
///
/// Produced by [`CredentialManager::authorize`](crate::CredentialManager::authorize)
/// and passed by reference to every remote call. Only the credential
/// manager mutates it; the inner lock serializes refresh-then-persist so
/// that two refreshes never race on the same refresh token.
#[derive(Debug)]
pub struct AuthClient {
    credential: Mutex<Credential>,
}

impl AuthClient {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(credential),
        }
    }

    /// Returns a copy of the current credential.
    pub async fn credential(&self) -> Credential {
        self.credential.lock().await.clone()
    }

    /// The `Authorization` header value for the current access token.
    pub async fn authorization_header(&self) -> AuthResult<String> {
        self.credential
            .lock()
            .await
            .authorization_header()
            .ok_or_else(|| AuthError::authentication("no access token available"))
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Credential> {
        self.credential.lock().await
    }
}
