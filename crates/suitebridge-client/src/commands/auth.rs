//! Authentication commands.

use chrono::{DateTime, Local, Utc};
use tracing::info;

use suitebridge_auth::{CredentialManager, CredentialStatus};

use crate::error::ClientResult;

/// Authorizes access and saves the resulting token.
///
/// Reuses a stored credential when the backend still accepts it. With
/// `force`, the stored token is deleted and the browser flow always runs.
pub async fn login(manager: &CredentialManager, force: bool) -> ClientResult<()> {
    let client = if force {
        manager.logout()?;
        print_browser_notice();
        manager.authorize_interactive().await?
    } else {
        if manager.load()?.is_none() {
            print_browser_notice();
        }
        manager.authorize().await?
    };

    let credential = client.credential().await;
    info!("authorization complete");
    println!("Authorization successful.");
    println!("Token saved to {}", manager.store().path().display());
    if let Some(expiry) = credential.expiry {
        println!("Access token valid until {}", format_time(expiry));
    }
    Ok(())
}

/// Prints what is stored, without contacting the network.
pub fn status(manager: &CredentialManager) -> ClientResult<()> {
    match manager.status()? {
        Some(status) => println!("{}", render_status(&status)),
        None => {
            println!("Not authorized.");
            println!("Run 'suitebridge auth login' to authorize.");
        }
    }
    println!("Token file: {}", manager.store().path().display());
    Ok(())
}

/// Deletes the stored token.
pub fn logout(manager: &CredentialManager) -> ClientResult<()> {
    let existed = manager.store().exists();
    manager.logout()?;
    if existed {
        println!("Removed {}", manager.store().path().display());
    } else {
        println!("No stored token at {}", manager.store().path().display());
    }
    Ok(())
}

fn print_browser_notice() {
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();
}

fn render_status(status: &CredentialStatus) -> String {
    let expiry = status
        .expiry
        .map(format_time)
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Source: {}\nClient: {}\nState: {}\nExpires: {}\nRefresh token: {}",
        status.source,
        status.client_id,
        status.state,
        expiry,
        if status.has_refresh_token { "yes" } else { "no" },
    )
}

fn format_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use suitebridge_auth::TokenState;

    #[test]
    fn status_rendering() {
        let status = CredentialStatus {
            source: "token file".to_string(),
            state: TokenState::Expiring,
            expiry: Some(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()),
            has_refresh_token: true,
            client_id: "id.apps.googleusercontent.com".to_string(),
        };
        let rendered = render_status(&status);
        assert!(rendered.contains("Source: token file"));
        assert!(rendered.contains("State: expiring"));
        assert!(rendered.contains("Refresh token: yes"));
        assert!(!rendered.contains("unknown"));
    }

    #[test]
    fn status_without_expiry() {
        let status = CredentialStatus {
            source: "environment".to_string(),
            state: TokenState::Expired,
            expiry: None,
            has_refresh_token: false,
            client_id: "id".to_string(),
        };
        let rendered = render_status(&status);
        assert!(rendered.contains("Expires: unknown"));
        assert!(rendered.contains("Refresh token: no"));
    }
}
