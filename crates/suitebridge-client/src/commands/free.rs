//! The `free` command: authorize, fetch busy intervals, compute free slots.

use tracing::debug;

use suitebridge_auth::{AuthResult, CredentialManager};
use suitebridge_core::{FreeInterval, TimeWindow, find_free_slots};

use crate::tool::ToolResult;

/// Finds free slots of at least `min_duration_minutes` inside `window`.
///
/// Authorizes, makes sure the token is fresh, lists busy intervals, then
/// computes the gaps.
pub async fn find_free(
    manager: &CredentialManager,
    window: &TimeWindow,
    min_duration_minutes: u32,
) -> AuthResult<Vec<FreeInterval>> {
    let client = manager.authorize().await?;
    manager.ensure_valid(&client).await?;

    let busy = manager.remote().list_busy_intervals(&client, window).await?;
    debug!("{} busy intervals in window", busy.len());

    Ok(find_free_slots(
        window.start,
        window.end,
        min_duration_minutes,
        &busy,
    ))
}

/// Runs [`find_free`] and wraps the outcome in a [`ToolResult`].
pub async fn run(
    manager: &CredentialManager,
    window: &TimeWindow,
    min_duration_minutes: u32,
) -> ToolResult {
    match find_free(manager, window, min_duration_minutes).await {
        Ok(slots) => match serde_json::to_value(&slots) {
            Ok(data) => ToolResult::success(data),
            Err(e) => ToolResult::failure(format!("failed to serialize slots: {}", e)),
        },
        Err(e) => ToolResult::from_auth_error(&e),
    }
}
