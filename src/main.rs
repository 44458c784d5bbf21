use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use project_board::cli::{Cli, Command};
use project_board::config::Settings;
use project_board::store::{MemoryStore, RemoteStore, RestStore};
use project_board::{ProjectData, ServiceError, ServiceResult, commands, render, shell};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", render::error(&err));
            ExitCode::FAILURE
        }
    }
}

fn settings_path(cli: &Cli) -> Option<PathBuf> {
    cli.connection.settings.clone().or_else(Settings::default_path)
}

async fn run(cli: Cli) -> ServiceResult<()> {
    let path = settings_path(&cli);
    let memory = cli.connection.memory;

    if let Command::Version = cli.command {
        println!("{}", commands::version());
        return Ok(());
    }
    if let Command::Config = cli.command {
        let path = path.ok_or_else(|| {
            ServiceError::Config("no config directory on this platform; pass --settings".to_string())
        })?;
        println!("{}", commands::configure(&path)?);
        return Ok(());
    }

    let file_settings = match &path {
        Some(p) => Settings::load(p)?,
        None => Settings::default(),
    };
    let settings = file_settings.apply(cli.connection.overrides());

    if let Command::Status = cli.command {
        println!("{}", commands::status(&settings, path.as_deref(), memory));
        return Ok(());
    }

    let store: Arc<dyn RemoteStore> = if memory {
        tracing::info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let rest = RestStore::new(settings.rest_config()?);
        tracing::info!(url = rest.base_url(), "using rest store");
        Arc::new(rest)
    };
    let data = ProjectData::new(store);

    match cli.command {
        Command::Shell => shell::run(&data, &settings, path.as_deref(), memory).await,
        command => {
            println!("{}", commands::run(&data, command).await?);
            Ok(())
        }
    }
}
