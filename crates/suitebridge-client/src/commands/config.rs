//! Configuration commands.

use std::path::Path;

use crate::config::AppConfig;
use crate::error::ClientResult;

/// Dump the effective configuration to stdout.
pub fn dump(config: &AppConfig, path: &Path) -> ClientResult<()> {
    let toml_str = config.to_toml()?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &AppConfig) -> ClientResult<()> {
    config.validate()?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path and the credential locations.
pub fn path(config: &AppConfig, path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    println!("token: {}", config.auth.resolved_token_path().display());
    println!(
        "credentials: {}",
        config.auth.resolved_credentials_path().display()
    );
    Ok(())
}
