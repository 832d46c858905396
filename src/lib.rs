pub mod cli;
pub mod core;
pub mod providers;

use crate::cli::show::ShowOptions;
use crate::core::config::AppConfig;
use crate::core::orchestrator::DataOrchestrator;
use crate::providers::HttpDashboardSource;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Commands that need the dashboard service.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Show(ShowOptions),
    Update { wait: bool },
    Watch(ShowOptions),
    Status,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    }
    .with_env_overrides();
    debug!("Loaded config: {config:#?}");
    info!(base_url = %config.api.base_url, "Using dashboard service");

    let source = HttpDashboardSource::from_config(&config.api)
        .context("Failed to create dashboard client")?;
    let orchestrator = Arc::new(DataOrchestrator::new(Arc::new(source)));

    match command {
        AppCommand::Show(options) => cli::show::run(&orchestrator, &config.view, options).await,
        AppCommand::Update { wait } => cli::update::run(orchestrator, &config.refresh, wait).await,
        AppCommand::Watch(options) => cli::watch::run(orchestrator, &config, options).await,
        AppCommand::Status => cli::status::run(&orchestrator, &config.api.base_url).await,
    }
}
