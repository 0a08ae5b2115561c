// Cash Ledger - Web Server
// Serves the latest reconciled ledger and re-polls the data directory

use anyhow::{bail, Context, Result};
use cash_ledger::api::{refresh_now, router, spawn_poller};
use cash_ledger::{FileSource, LedgerConfig, LedgerShell};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config_path: Option<PathBuf> = None;
    let mut data_dir: Option<PathBuf> = None;
    let mut addr = String::from("0.0.0.0:3000");

    let args: Vec<String> = env::args().skip(1).collect();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config_path = Some(iter.next().context("--config needs a file")?.into()),
            "--data-dir" => {
                data_dir = Some(iter.next().context("--data-dir needs a directory")?.into())
            }
            "--addr" => addr = iter.next().context("--addr needs host:port")?.clone(),
            other => bail!("Unknown option: {}", other),
        }
    }

    let mut config = LedgerConfig::load_or_default(config_path.as_deref())?;
    if let Some(dir) = data_dir {
        config = config.with_data_dir(dir);
    }

    println!("🌐 Cash Ledger - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let interval = Duration::from_secs(config.poll_interval_secs);
    let source = FileSource::new(&config.data_dir);
    println!("✓ Data directory: {}", source.dir().display());
    let shell = Arc::new(LedgerShell::new(source, config));

    // First snapshot up front; the API answers 503 until one exists
    match refresh_now(Arc::clone(&shell)).await {
        Ok(applied) if applied.is_published() => info!("initial ledger computed"),
        Ok(_) => {}
        Err(e) => error!("initial refresh failed: {:#}", e),
    }

    let _poller = spawn_poller(Arc::clone(&shell), interval);

    let app = router(shell).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/ledger", addr);
    println!("   Polling every {}s", interval.as_secs());
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server stopped")?;

    Ok(())
}
