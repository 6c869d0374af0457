use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use stock_forecast::{server, ForecastPipeline, PredictionRequest, Result, ServiceConfig, YahooFinance};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single forecast and print the JSON report
    Predict {
        symbol: String,
        /// Reference date, YYYY-MM-DD; today when omitted
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        days: Option<usize>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ServiceConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServiceConfig::load(path)
        }
        None => Ok(ServiceConfig::default()),
    }
}

fn build_pipeline(config: ServiceConfig) -> Result<ForecastPipeline> {
    // The blocking client owns a runtime of its own, so it is created before
    // the actix system starts.
    let provider = YahooFinance::new(&config.market_data)?;
    Ok(ForecastPipeline::new(Arc::new(provider), config))
}

fn run(args: Args) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args.config.as_ref())?;

    match args.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let pipeline = build_pipeline(config)?;
            server::run(pipeline)?;
        }
        Command::Predict { symbol, date, days } => {
            let pipeline = build_pipeline(config)?;
            let report = pipeline.handle(&PredictionRequest {
                symbol,
                start_date: date,
                days,
            })?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
