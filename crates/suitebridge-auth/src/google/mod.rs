//! Google implementation of the remote collaborators.
//!
//! # Features
//!
//! - OAuth 2.0 PKCE authorization flow with loopback redirect
//! - Token refresh and tokeninfo probing
//! - Busy intervals from Calendar `events.list`, recurring events expanded
//!   server-side
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use suitebridge_auth::google::{GoogleConfig, GoogleRemote};
//! use suitebridge_auth::{CredentialManager, ManagerSettings};
//!
//! let remote = Arc::new(GoogleRemote::new(GoogleConfig::default())?);
//! let manager = CredentialManager::from_settings(&settings, remote.clone(), remote);
//!
//! let client = manager.authorize().await?;
//! manager.ensure_valid(&client).await?;
//! ```

mod calendar;
mod config;
mod oauth;
mod remote;

pub use calendar::GoogleCalendar;
pub use config::GoogleConfig;
pub use oauth::{GoogleOAuth, PkceFlow};
pub use remote::GoogleRemote;
