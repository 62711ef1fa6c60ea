use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use marketgate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for marketgate::AppCommand {
    fn from(cmd: Commands) -> marketgate::AppCommand {
        match cmd {
            Commands::Quotes { symbols, json } => marketgate::AppCommand::Quotes { symbols, json },
            Commands::History {
                symbol,
                period,
                interval,
                json,
            } => marketgate::AppCommand::History {
                symbol,
                period,
                interval,
                json,
            },
            Commands::Ingest { historical } => marketgate::AppCommand::Ingest { historical },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the latest quotes for one or more symbols
    Quotes {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Show OHLC history for a symbol
    History {
        symbol: String,
        /// Lookback period, e.g. 5d, 1mo, 1y
        #[arg(long)]
        period: Option<String>,
        /// Bar interval, e.g. 1h, 1d, 1wk
        #[arg(long)]
        interval: Option<String>,
        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
    /// Refresh stored data for the configured tickers
    Ingest {
        /// Also refresh recent daily history
        #[arg(long)]
        historical: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => marketgate::cli::setup::setup(),
        Some(cmd) => marketgate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
