//! CLI, configuration, auth and free-slot commands
//!
//! This crate provides the `suitebridge` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod tool;

pub use cli::Cli;
pub use config::AppConfig;
pub use error::{ClientError, ClientResult};
pub use tool::ToolResult;
