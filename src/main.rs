use anyhow::{Context, Result, bail};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod events;
mod handlers;
mod imaging;
mod models;
mod report;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use config::{AppConfig, Command};
use events::EventBus;
use services::{
    attachment_store::AttachmentStore,
    catalog_service::{CatalogService, CatalogSource, FileCatalogSource, HttpCatalogSource},
    report_service::{ReportGenerator, ReportService},
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting fruit-catalog with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.data_dir).exists() {
        fs::create_dir_all(&cfg.data_dir)
            .with_context(|| format!("creating data directory {}", cfg.data_dir.display()))?;
        tracing::info!("Created data directory at {}", cfg.data_dir.display());
    }

    // --- Initialize services ---
    let events = EventBus::default();
    let source: Arc<dyn CatalogSource> = match &cfg.catalog_file {
        Some(path) => Arc::new(FileCatalogSource::new(path)),
        None => Arc::new(HttpCatalogSource::new(
            &cfg.catalog_url,
            Duration::from_secs(cfg.fetch_timeout_secs),
        )?),
    };
    let state = AppState {
        catalog: CatalogService::new(source, events.clone()),
        store: AttachmentStore::new(&cfg.data_dir, cfg.jpeg_quality, events.clone()),
        reports: ReportService::new(
            ReportGenerator::new(cfg.report_fields.clone()),
            &cfg.export_dir,
            events.clone(),
        ),
        events,
    };

    // --- Load catalog, then the photos that belong to it ---
    state.catalog.refresh().await;
    state.store.load_all().await;

    if command == Command::Export {
        return export_once(&state).await;
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Write the report once and exit.
async fn export_once(state: &AppState) -> Result<()> {
    let catalog = state.catalog.current().await;
    if catalog.is_empty() {
        tracing::warn!("Catalog is empty; the report will have no pages");
    }

    match state.reports.export(catalog, &state.store).await {
        Some(exported) => {
            tracing::info!(
                "Report with {} pages written to {}",
                exported.report.page_count(),
                exported.path.display()
            );
            Ok(())
        }
        None => bail!("report export failed"),
    }
}
