//! Terraform Provider for FlexibleEngine
//!
//! Serves the JSON-RPC plugin protocol on stdin/stdout for managing
//! FlexibleEngine VPCs, networking, NAT, RDS, DCS and SWR resources.

use anyhow::Context;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use terraform_provider_flexibleengine::logging::LoggingConfig;
use terraform_provider_flexibleengine::provider::FlexibleEngineProvider;

/// Terraform Provider for FlexibleEngine
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-flexibleengine")]
#[command(about = "Terraform provider for the FlexibleEngine cloud")]
struct Args {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Also write JSON logs to this file
    #[arg(long, env = "FLEXIBLEENGINE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _guard = LoggingConfig {
        level: if args.debug { "debug" } else { "info" }.to_string(),
        file_path: args.log_file,
    }
    .init()
    .context("failed to initialize logging")?;

    tracing::info!("Starting Terraform Provider for FlexibleEngine");

    let provider = FlexibleEngineProvider::new().context("failed to create Tokio runtime")?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();

    for line in stdin.lock().lines() {
        let input = match line {
            Ok(input) => input,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        };
        if input.trim().is_empty() {
            continue;
        }

        let response = provider.handle_request(&input);
        if let Err(e) = writeln!(stdout_lock, "{}", response).and_then(|_| stdout_lock.flush()) {
            tracing::error!("Failed to write response: {}", e);
            break;
        }
    }

    tracing::info!("Terraform Provider shutting down");
    Ok(())
}
