mod check_cmd;
mod compare_cmd;
mod output;
mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ocrbench_config::{Settings, DEFAULT_SHEET_NAME};
use ocrbench_gateway::{start_server, AppState};
use ocrbench_logging::{init_logger, LogOptions};
use ocrbench_understanding::http_client;

#[derive(Parser)]
#[command(name = "ocrbench")]
#[command(about = "Compare Google Vision and Naver Clova OCR on the same image")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(long)]
        host: Option<String>,
    },
    /// Compare both providers on a local image
    Compare {
        image: PathBuf,
        /// Append the result to the configured spreadsheet
        #[arg(long)]
        save: bool,
        #[arg(long, default_value = DEFAULT_SHEET_NAME)]
        sheet_name: String,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the supported providers
    Providers,
    /// Validate configuration and print effective settings
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    init_logger(&LogOptions {
        level: settings.log_level.clone(),
        json: settings.log_json,
        log_dir: settings.log_dir.clone(),
    });

    match cli.command {
        Commands::Serve { port, host } => {
            let settings = Settings {
                port: port.unwrap_or(settings.port),
                host: host.unwrap_or(settings.host),
                ..settings
            };
            run_server(settings).await?;
        }
        Commands::Compare {
            image,
            save,
            sheet_name,
            json,
        } => {
            let client = http_client()?;
            let comparator = wiring::build_comparator(&settings, &client)?;
            let sheets = save.then(|| wiring::build_sheets(&settings, &client));
            let sheets = sheets.as_ref().map(|s| s.as_deref().map_err(|e| e.clone()));
            compare_cmd::run(&comparator, sheets, &image, &sheet_name, json).await?;
        }
        Commands::Providers => compare_cmd::providers(),
        Commands::Check => check_cmd::run(&settings)?,
    }

    Ok(())
}

async fn run_server(settings: Settings) -> Result<()> {
    info!(
        addr = %settings.bind_address(),
        environment = %settings.environment,
        settings = %settings.redacted(),
        "Starting OCR comparison API"
    );

    let report = settings.validate();
    for warning in &report.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    let client = http_client()?;
    let comparator = Arc::new(wiring::build_comparator(&settings, &client)?);
    let sheets = wiring::build_sheets(&settings, &client);

    let state = Arc::new(AppState::new(comparator, sheets, &settings));
    start_server(&settings.bind_address(), state).await
}
