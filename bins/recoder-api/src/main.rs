mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use recoder_common::challenges::ChallengeCatalog;
use recoder_common::config::{LogFormat, Settings};
use recoder_validator::{Backend, Validator, ValidatorConfig};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ChallengeCatalog>,
    pub validator: Validator,
    /// Progress endpoints are disabled without Redis
    pub redis: Option<ConnectionManager>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    init_tracing(&settings.log_format);

    info!("Recoder API booting...");

    let catalog = ChallengeCatalog::load_or_builtin(settings.catalog_path.as_deref())
        .context("Failed to load challenge catalog")?;
    info!(
        challenges = catalog.len(),
        source = ?settings.catalog_path,
        "Challenge catalog loaded"
    );

    let validator_config =
        ValidatorConfig::server_from_env().context("Invalid validator configuration")?;
    if let Backend::Process { worker_path } = &validator_config.backend {
        if !worker_path.exists() {
            warn!(path = %worker_path.display(), "Worker binary not found; validations will fail");
        }
    }
    let validator = Validator::from_config(&validator_config);
    info!(
        engine = validator.engine_name(),
        case_timeout_ms = validator_config.case_timeout.as_millis() as u64,
        "Validator configured"
    );
    if validator_config.backend == Backend::Embedded {
        warn!("Embedded backend selected; timed-out submissions keep their sandbox thread running");
    }

    // Connect to Redis
    let redis = match &settings.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Failed to create Redis client")?;
            let conn = ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Connected to Redis: {}", url);
            Some(conn)
        }
        None => {
            warn!("REDIS_URL not set; progress tracking disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        catalog: Arc::new(catalog),
        validator,
        redis,
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    info!("HTTP server listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("API shutdown complete");
    Ok(())
}

fn init_tracing(format: &LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Received shutdown signal");
}
