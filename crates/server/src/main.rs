// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ccdashd
//!
//! Usage dashboard server: ingests the assistant's conversation logs,
//! maintains 5-hour usage windows with P90 limit predictions, and runs
//! scheduled coding jobs against the assistant binary.
//!
//! Architecture:
//! - HTTP API (axum): queries and mutations for the dashboard UI
//! - Background: initial ingestion pass, scheduler tick, executor pool

use ccdash_engine::spawn_supervised;
use ccdash_server::{init, routes, App, Config};
use std::net::SocketAddr;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Handle info flags before any store or key work
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ccdashd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ccdashd {}", env!("CARGO_PKG_VERSION"));
                println!("Usage dashboard server for assistant conversation logs and jobs");
                println!();
                println!("USAGE:");
                println!("    ccdashd");
                println!();
                println!("Configuration is environment-based: PORT, HOST, FRONTEND_URL,");
                println!("CCDASH_DB_PATH, CCDASH_API_KEY, CCDASH_DISABLE_SAFETY_CHECK,");
                println!("CCDASH_CLAUDE_CODE_PATH, CCDASH_LOG_ROOT, CCDASH_ENV.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ccdashd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    let config = Config::from_env();
    info!(db_path = %config.db_path.display(), log_root = %config.log_root.display(), "starting ccdashd");

    // Store open, migrations, and API key provisioning are fatal: exit 1.
    let app = match App::build(config) {
        Ok(app) => app,
        Err(e) => {
            error!("failed to start: {e}");
            return Err(e);
        }
    };

    let shutdown = CancellationToken::new();
    app.start_background(shutdown.clone());

    // Initial ingestion pass runs in the background; the API serves
    // read-only queries meanwhile and reports progress.
    {
        let app = app.clone();
        let (failures, mut failures_rx) = mpsc::channel::<ccdash_engine::TaskFailure>(1);
        tokio::spawn(async move {
            if let Some(failure) = failures_rx.recv().await {
                error!(message = %failure.message, "initial sync pass panicked");
            }
        });
        let _initial_sync =
            spawn_supervised("initial-sync", shutdown.clone(), Some(failures), async move {
                match init::run_pipeline(app).await {
                    Ok(report) => info!(
                        files = report.files,
                        new_lines = report.new_lines,
                        "initial sync complete"
                    ),
                    Err(e) => error!(error = %e, "initial sync failed"),
                }
            });
    }

    let addr = app.config.bind_addr();
    let router = routes::router(app);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let serve_shutdown = shutdown.clone();

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
            _ = serve_shutdown.cancelled() => {}
        }
    })
    .await?;

    // Stop the scheduler and workers; in-flight jobs are cancelled and
    // their children terminated.
    shutdown.cancel();
    info!("ccdashd stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
