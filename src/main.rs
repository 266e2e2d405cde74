//! depbot - Dependency update bot CLI
//!
//! Checks every top-level npm_and_yarn dependency of one repository
//! directory, regenerates the manifest and lock files for each accepted
//! update and opens a pull request on Azure DevOps.

use anyhow::Context;
use clap::Parser;
use depbot::cli::CliArgs;
use depbot::config::RunConfig;
use depbot::controller::RunController;
use depbot::ecosystem::bundle_for;
use depbot::http::HttpClient;
use depbot::output::{create_formatter, OutputConfig, OutputFormat};
use depbot::provider::create_provider;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(&args);

    // Every error reaching this point is fatal for the run
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the level chosen by the flags
fn init_tracing(args: &CliArgs) {
    let level = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = RunConfig::from_cli(&args)?;

    let http = HttpClient::with_timeout(config.request_timeout)
        .context("failed to create the HTTP client")?;
    let provider = create_provider(&config.source, &config.credentials, http.clone())?;
    let ecosystem = bundle_for(config.package_manager);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current dependency");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet);
    let show_progress = !args.quiet && output_config.format == OutputFormat::Text;

    let summary = RunController::new(&config, ecosystem, provider, http)
        .with_cancellation(cancel)
        .with_progress(show_progress)
        .run()
        .await?;

    if summary.cancelled {
        info!("run stopped by interrupt");
    }

    let formatter = create_formatter(output_config);
    let mut stdout = io::stdout().lock();
    formatter.format(&summary, &mut stdout)?;
    stdout.flush()?;

    Ok(())
}
