pub mod cli;
pub mod core;
pub mod gateway;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::gateway::Gateway;
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Quotes {
        symbols: Vec<String>,
        json: bool,
    },
    History {
        symbol: String,
        period: Option<String>,
        interval: Option<String>,
        json: bool,
    },
    Ingest {
        historical: bool,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Market gateway starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let gateway = Gateway::from_config(&config)?;

    match command {
        AppCommand::Quotes { symbols, json } => cli::quotes::run(&gateway, &symbols, json).await,
        AppCommand::History {
            symbol,
            period,
            interval,
            json,
        } => {
            cli::history::run(
                &gateway,
                &symbol,
                period.as_deref(),
                interval.as_deref(),
                json,
            )
            .await
        }
        AppCommand::Ingest { historical } => {
            cli::ingest::run(&gateway, &config.tickers, historical).await
        }
    }
}
