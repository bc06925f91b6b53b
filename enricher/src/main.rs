//! Enricher - post enrichment service
//!
//! Entry point for the enrichment pipeline. Consumes posts from a Redis
//! stream, adds categories and sentiment, and publishes them to another
//! stream. `enricher batch` runs the same enrichment over a JSON file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use enricher::config::build_enricher;
use enricher::{logging, Dependencies, EnricherError, Settings};
use enricher_pipeline::batch::BatchRunner;
use enricher_pipeline::orchestrator::ShutdownHandle;

#[derive(Parser)]
#[command(name = "enricher")]
#[command(about = "Enriches posts with categories and sentiment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Environment file to load before reading settings
    #[arg(long, default_value = ".env", global = true)]
    env_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume the input stream until interrupted (default)
    Serve,
    /// Enrich a JSON file of records once
    Batch {
        /// JSON array of input records
        #[arg(long, default_value = "data.json")]
        input: PathBuf,

        /// Directory for the timestamped output file
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing env file is fine; the environment alone may be enough
    let _ = dotenv::from_path(&cli.env_file);

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(logging::LogFormat::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init(settings.log_format);
    info!(settings = ?settings, "Loaded settings");

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&settings).await,
        Commands::Batch { input, output_dir } => batch(&settings, input, output_dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Enricher failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(settings: &Settings) -> Result<(), EnricherError> {
    let Dependencies { mut orchestrator } = Dependencies::new(settings).await?;

    tokio::spawn(shutdown_on_signal(orchestrator.shutdown_handle()));

    orchestrator.run().await?;
    Ok(())
}

async fn batch(
    settings: &Settings,
    input: PathBuf,
    output_dir: PathBuf,
) -> Result<(), EnricherError> {
    let runner = BatchRunner::new(build_enricher(settings));
    let path = runner.run(&input, &output_dir).await?;
    info!(path = %path.display(), "Batch run complete");
    Ok(())
}

async fn shutdown_on_signal(handle: ShutdownHandle) {
    wait_for_signal().await;
    info!("Shutdown signal received, finishing current batch");
    handle.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
