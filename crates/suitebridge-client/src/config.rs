//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/suitebridge/config.toml` by default. A missing file means
//! defaults for everything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use suitebridge_auth::google::GoogleConfig;
use suitebridge_auth::{ClientKeys, DEFAULT_REFRESH_HORIZON_SECS, ManagerSettings};

use crate::error::{ClientError, ClientResult};

/// Upper bound for `refresh_horizon_secs` (one day).
pub const MAX_REFRESH_HORIZON_SECS: u64 = 86_400;

/// Configuration for the suitebridge client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Credential locations and refresh policy.
    pub auth: AuthSettings,

    /// Google backend settings.
    pub google: GoogleSettings,

    /// Free-slot search defaults.
    pub slots: SlotSettings,
}

/// The `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Persisted token file. Defaults to `<data dir>/suitebridge/token.json`.
    pub token_path: Option<PathBuf>,

    /// OAuth client key file. Defaults to
    /// `<config dir>/suitebridge/credentials.json`.
    pub credentials_path: Option<PathBuf>,

    /// Environment variable holding token JSON. Empty disables it.
    pub token_env: String,

    /// Environment variable holding client key JSON. Empty disables it.
    pub credentials_env: String,

    /// OAuth scopes requested by `auth login`.
    pub scopes: Vec<String>,

    /// Seconds before expiry at which a refresh is attempted.
    pub refresh_horizon_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_path: None,
            credentials_path: None,
            token_env: "GOOGLE_TOKEN_JSON".to_string(),
            credentials_env: "GOOGLE_CREDENTIALS_JSON".to_string(),
            scopes: vec![GoogleConfig::DEFAULT_SCOPE.to_string()],
            refresh_horizon_secs: DEFAULT_REFRESH_HORIZON_SECS as u64,
        }
    }
}

impl AuthSettings {
    pub fn resolved_token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| AppConfig::default_data_dir().join("token.json"))
    }

    pub fn resolved_credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| AppConfig::default_config_dir().join("credentials.json"))
    }

    /// Converts to credential manager settings.
    pub fn to_manager_settings(&self) -> ManagerSettings {
        let non_empty = |v: &str| (!v.trim().is_empty()).then(|| v.to_string());
        let horizon_secs = self.refresh_horizon_secs.min(MAX_REFRESH_HORIZON_SECS) as i64;

        let mut settings = ManagerSettings::new(self.resolved_token_path());
        settings.credentials_path = Some(self.resolved_credentials_path());
        settings.token_env = non_empty(&self.token_env);
        settings.credentials_env = non_empty(&self.credentials_env);
        settings.scopes = self.scopes.clone();
        settings.refresh_horizon = chrono::Duration::seconds(horizon_secs);
        settings
    }
}

/// The `[google]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// First port tried for the OAuth loopback redirect.
    pub loopback_port_start: u16,

    /// Last port tried for the OAuth loopback redirect.
    pub loopback_port_end: u16,

    /// Calendar queried by `free`.
    pub calendar_id: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
            loopback_port_start: 8080,
            loopback_port_end: 8090,
            calendar_id: GoogleConfig::DEFAULT_CALENDAR_ID.to_string(),
        }
    }
}

impl GoogleSettings {
    /// Converts to backend configuration, optionally overriding the calendar.
    pub fn to_google_config(&self, calendar_override: Option<&str>) -> GoogleConfig {
        GoogleConfig::new()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_loopback_port_range(self.loopback_port_start, self.loopback_port_end)
            .with_calendar_id(calendar_override.unwrap_or(&self.calendar_id))
    }
}

/// The `[slots]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSettings {
    /// Minimum free slot length when `free` gets no `--min-duration`.
    pub min_duration_minutes: u32,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            min_duration_minutes: 30,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or from the default path.
    ///
    /// A missing default file yields defaults; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn to_toml(&self) -> ClientResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Checks the settings for values that cannot work.
    ///
    /// The client key file is parsed when it exists; a missing one is fine
    /// since keys may come from the environment.
    pub fn validate(&self) -> ClientResult<()> {
        if self.auth.scopes.is_empty() {
            return Err(ClientError::Config(
                "at least one OAuth scope is required".to_string(),
            ));
        }

        if self.auth.refresh_horizon_secs > MAX_REFRESH_HORIZON_SECS {
            return Err(ClientError::Config(format!(
                "[auth] refresh_horizon_secs must be at most {}",
                MAX_REFRESH_HORIZON_SECS
            )));
        }

        self.google
            .to_google_config(None)
            .validate()
            .map_err(|e| ClientError::Config(format!("[google]: {}", e)))?;

        if self.slots.min_duration_minutes == 0 {
            return Err(ClientError::Config(
                "[slots] min_duration_minutes must be greater than zero".to_string(),
            ));
        }

        let credentials_path = self.auth.resolved_credentials_path();
        if credentials_path.exists() {
            ClientKeys::from_file(&credentials_path)?;
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suitebridge")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suitebridge")
    }
}
