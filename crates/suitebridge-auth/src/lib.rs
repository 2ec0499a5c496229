//! Credential lifecycle management for productivity-suite APIs.
//!
//! - [`CredentialManager`] - loads, validates, refreshes and persists OAuth
//!   credentials, running the interactive grant when nothing usable exists
//! - [`AuthClient`] - the authenticated handle passed to remote calls
//! - [`RemoteService`] / [`AuthorizationProvider`] - the network seams,
//!   implemented for Google behind the `google` feature
//! - [`AuthError`] - error taxonomy shared by every operation
//!
//! # Example
//!
//! ```ignore
//! use suitebridge_core::{TimeWindow, find_free_slots};
//!
//! let client = manager.authorize().await?;
//! manager.ensure_valid(&client).await?;
//! let busy = manager.remote().list_busy_intervals(&client, &window).await?;
//! let free = find_free_slots(window.start, window.end, 30, &busy);
//! ```

pub mod client;
pub mod credential;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod manager;
pub mod remote;
pub mod source;
pub mod storage;

pub use client::AuthClient;
pub use credential::{ClientKeys, Credential, StoredToken, TokenState};
pub use error::{AuthError, AuthErrorCode, AuthResult};
pub use manager::{
    CredentialManager, CredentialStatus, DEFAULT_REFRESH_HORIZON_SECS, ManagerSettings,
};
pub use remote::{AuthorizationProvider, BoxFuture, RemoteService};
pub use source::{
    CredentialSource, EnvLookup, EnvSource, FileSource, KeySource, SourceChain, process_env,
};
pub use storage::TokenStore;
