use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vgsales_report::config::normalize_listen_addr;
use vgsales_report::{AppState, Args, ReportConfig, Store, router, snapshot};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = ReportConfig::from(&args);
    let http_addr = normalize_listen_addr(&args.listen)?;

    let store = Arc::new(Store::open(&args.db_path)?);
    tracing::info!(db_path = %args.db_path, "store opened");

    if let Some(dir) = &args.seed_dir {
        seed(&store, dir).await?;
    }
    if let Some(dir) = &args.export_dir {
        let manifest = snapshot::export_tables(&store, dir).await?;
        tracing::info!(
            dir = %dir.display(),
            tables = manifest.tables.len(),
            "snapshot exported"
        );
    }

    let app_state = AppState { store, config };
    let http_app = router(app_state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(listen = %http_addr, "vgsales-report listening");

    axum::serve(http_listener, http_app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn seed(store: &Store, dir: &Path) -> Result<(), anyhow::Error> {
    let outcome = snapshot::seed_tables(store, dir).await?;
    let loaded = outcome
        .iter()
        .filter(|(_, s)| matches!(s, snapshot::Seeded::Loaded(_)))
        .count();
    tracing::info!(dir = %dir.display(), tables = loaded, "seed finished");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}
