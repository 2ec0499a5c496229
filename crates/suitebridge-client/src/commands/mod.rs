//! Command implementations.

pub mod auth;
pub mod config;
pub mod free;

use std::sync::Arc;

use suitebridge_auth::CredentialManager;
use suitebridge_auth::google::GoogleRemote;

use crate::config::AppConfig;
use crate::error::ClientResult;

/// Builds a credential manager backed by Google.
///
/// `calendar` overrides the configured calendar for busy-interval listing.
pub fn google_manager(
    config: &AppConfig,
    calendar: Option<&str>,
) -> ClientResult<CredentialManager> {
    let remote = Arc::new(GoogleRemote::new(config.google.to_google_config(calendar))?);
    Ok(CredentialManager::from_settings(
        &config.auth.to_manager_settings(),
        remote.clone(),
        remote,
    ))
}
