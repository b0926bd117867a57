use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Oracle attestation verification backend.
#[derive(Parser)]
#[command(name = "oracle-verify-server", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(err) = oracle_verify_server::run(&cli.config).await {
        tracing::error!(error = %err, "server failed to start");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
