//! Google backend configuration.

use std::time::Duration;

/// Settings for the Google OAuth and Calendar clients.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Request timeout.
    pub timeout: Duration,

    /// User agent string for API requests.
    pub user_agent: String,

    /// Port range for the loopback OAuth server.
    ///
    /// The OAuth flow binds the first free port in this range.
    /// Defaults to (8080, 8090).
    pub loopback_port_range: (u16, u16),

    /// Calendar queried for busy intervals.
    pub calendar_id: String,
}

impl GoogleConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Default OAuth scope for read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";

    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("suitebridge/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err("invalid loopback port range".to_string());
        }
        if self.calendar_id.trim().is_empty() {
            return Err("calendar_id must not be empty".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::new()
    }
}
