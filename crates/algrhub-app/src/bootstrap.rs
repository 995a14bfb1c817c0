//! Service wiring: configuration, logging, catalog, pipeline, and HTTP host.

use std::future::Future;
use std::sync::Arc;

use algrhub_api::ApiServer;
use algrhub_config::{AppConfig, CatalogConfig};
use algrhub_data::PgCatalog;
use algrhub_intake::{
    AlgorithmCatalog, JsonLinesCatalog, MemoryCatalog, ServiceStateTracker, UploadOrchestrator,
};
use algrhub_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const SERVICE_NAME: &str = "algrhub";
const BUILD_SHA: &str = match option_env!("ALGRHUB_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Entry point for the service boot sequence.
///
/// Loads configuration from the environment, installs logging, and serves
/// until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration, logging, catalog construction, or the
/// API server fails.
pub async fn run_app() -> AppResult<()> {
    let config = AppConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
    init_logging(&LoggingConfig {
        level: &config.telemetry.level,
        format: LogFormat::from_name(config.telemetry.format.as_deref()),
        build_sha: BUILD_SHA,
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new(SERVICE_NAME);

    info!("algorithm upload service bootstrap starting");
    serve(config, shutdown_signal()).await
}

/// Wire every component for `config` and serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if metrics, the catalog, or the API server fail.
pub async fn serve<F>(config: AppConfig, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let telemetry = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let catalog = open_catalog(&config.catalog).await?;
    info!(
        catalog = catalog.backend(),
        storage_root = %config.intake.storage_root.display(),
        languages = ?config.intake.language_names(),
        validation = config.intake.validation.as_str(),
        "upload pipeline ready"
    );

    let tracker = Arc::new(ServiceStateTracker::with_metrics(telemetry.clone()));
    let orchestrator = UploadOrchestrator::new(config.intake, catalog, tracker)
        .with_metrics(telemetry.clone());
    let api = ApiServer::new(
        Arc::new(orchestrator),
        telemetry,
        config.server.max_upload_bytes,
    );

    api.serve(config.server.bind_addr, shutdown)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

/// Build the catalog backend selected by `config`.
///
/// # Errors
///
/// Returns an error if the JSON lines file cannot be opened or the database
/// is unreachable.
pub async fn open_catalog(config: &CatalogConfig) -> AppResult<Arc<dyn AlgorithmCatalog>> {
    match config {
        CatalogConfig::Memory => {
            warn!("memory catalog selected; records are lost on restart");
            Ok(Arc::new(MemoryCatalog::new()))
        }
        CatalogConfig::JsonLines { path } => {
            let catalog = JsonLinesCatalog::open(path.clone())
                .await
                .map_err(|err| AppError::catalog("catalog.jsonl.open", err))?;
            Ok(Arc::new(catalog))
        }
        CatalogConfig::Postgres { url } => {
            let catalog = PgCatalog::connect(url)
                .await
                .map_err(|err| AppError::data("catalog.postgres.connect", err))?;
            Ok(Arc::new(catalog))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
