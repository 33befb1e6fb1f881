use anyhow::{Context, Result};
use clap::Parser;
use compressor::{CompressionCounter, Compressor};
use compressor_server::config::{AppConfig, CliOverrides};
use compressor_server::{AppState, logging, router, signals};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Compressor Server - upload endpoint for image and PDF compression
#[derive(Parser)]
#[command(name = "compressor-server")]
#[command(about = "Compressor Server - upload endpoint for image and PDF compression")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upload directory override (overrides config)
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Print effective configuration (secrets redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        port: cli.port,
        upload_dir: cli.upload_dir.clone(),
        verbose: cli.verbose,
    });

    if cli.print_config {
        println!(
            "Effective configuration:\n{}",
            serde_json::to_string_pretty(&config)?
        );
        return Ok(());
    }

    logging::init_logging(&config.logging);
    tracing::info!("Compressor Server starting");

    tokio::fs::create_dir_all(&config.server.upload_dir)
        .await
        .with_context(|| {
            format!(
                "create upload dir {}",
                config.server.upload_dir.display()
            )
        })?;

    let compressor = Compressor::from_config(&config.compressor, CompressionCounter::new())
        .context("failed to build compressor")?;
    let app = router(
        AppState {
            compressor,
            upload_dir: config.server.upload_dir.clone(),
        },
        config.server.max_upload_size,
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("HTTP server bound on {}", addr);

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(signals::cancel_on_shutdown(cancel.clone()));
    let shutdown = {
        let cancel = cancel.clone();
        async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    cancel.cancel();
    signals.await??;
    Ok(())
}
