//! suitebridge CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use suitebridge_client::cli::{AuthAction, Cli, Command, ConfigAction, FreeArgs};
use suitebridge_client::commands;
use suitebridge_client::config::AppConfig;
use suitebridge_client::error::{ClientError, ClientResult};
use suitebridge_core::{TimeWindow, TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig::from_flags(cli.debug, cli.json_logs)) {
        eprintln!("warning: {}", ClientError::from(e));
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);

    match cli.command {
        Command::Auth { action } => {
            let manager = commands::google_manager(&config, None)?;
            match action {
                AuthAction::Login { force } => commands::auth::login(&manager, force).await?,
                AuthAction::Status => commands::auth::status(&manager)?,
                AuthAction::Logout => commands::auth::logout(&manager)?,
            }
        }
        Command::Free(args) => return free(&config, args).await,
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path)?,
            ConfigAction::Validate => commands::config::validate(&config)?,
            ConfigAction::Path => commands::config::path(&config, &config_path)?,
        },
    }
    Ok(ExitCode::SUCCESS)
}

async fn free(config: &AppConfig, args: FreeArgs) -> ClientResult<ExitCode> {
    let window = TimeWindow::try_new(args.start, args.end).ok_or_else(|| {
        ClientError::InvalidArgument("--start must not be after --end".to_string())
    })?;
    let min_duration = args
        .min_duration
        .unwrap_or(config.slots.min_duration_minutes);
    if min_duration == 0 {
        return Err(ClientError::InvalidArgument(
            "minimum slot length must be at least one minute".to_string(),
        ));
    }

    let manager = commands::google_manager(config, args.calendar.as_deref())?;
    let result = commands::free::run(&manager, &window, min_duration).await;

    println!("{}", result.to_json());
    Ok(if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
