//! Collaborator interfaces for the remote side.
//!
//! The credential manager never talks to the network itself. Token
//! refresh, token probing and interval listing go through
//! [`RemoteService`]; the interactive consent flow goes through
//! [`AuthorizationProvider`]. Tests substitute fakes for both.

use std::future::Future;
use std::pin::Pin;

use suitebridge_core::{BusyInterval, TimeWindow};

use crate::client::AuthClient;
use crate::credential::{ClientKeys, Credential};
use crate::error::AuthResult;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Network operations against the productivity-suite backend.
pub trait RemoteService: Send + Sync {
    /// Validates a credential with one lightweight round trip.
    ///
    /// Returns the credential the backend accepted, which may carry a newer
    /// access token than the one passed in.
    fn probe_access_token<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, AuthResult<Credential>>;

    /// Exchanges the refresh token for a new access token.
    ///
    /// The returned credential may omit the refresh token when the backend
    /// does not rotate it.
    fn refresh_access_token<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, AuthResult<Credential>>;

    /// Lists busy intervals overlapping `window`, ordered by start time.
    fn list_busy_intervals<'a>(
        &'a self,
        client: &'a AuthClient,
        window: &'a TimeWindow,
    ) -> BoxFuture<'a, AuthResult<Vec<BusyInterval>>>;
}

/// Runs the interactive consent flow and returns a fresh credential.
pub trait AuthorizationProvider: Send + Sync {
    fn interactive_authorize<'a>(
        &'a self,
        scopes: &'a [String],
        keys: &'a ClientKeys,
    ) -> BoxFuture<'a, AuthResult<Credential>>;
}
