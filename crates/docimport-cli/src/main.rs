//! docimport - main entry point

use std::process;

use clap::Parser;
use docimport_cli::{Cli, Commands};
use docimport_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("docimport")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env().unwrap_or(log_config);

    // The importer works without logging
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let connection = &cli.connection;
    let import = &cli.import;

    match &cli.command {
        Commands::Csv { input, format } => {
            docimport_cli::commands::csv::run(connection, import, input, format).await
        },
        Commands::Xml { input, format } => {
            docimport_cli::commands::xml::run(connection, import, input, format).await
        },
        Commands::Json { input } => docimport_cli::commands::json::run(connection, import, input).await,
        Commands::Run { manifest } => {
            docimport_cli::commands::run::run(connection, import, manifest).await
        },
    }
}
