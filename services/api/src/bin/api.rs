//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LogNotifier, StripeGateway},
    config::{Config, StorageBackend},
    error::ApiError,
    web::{router, state::AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use storefront_core::ports::PaymentGateway;
use storefront_core::{select_gateway, InMemoryStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize the Payment Gateway & Notifier ---
    let live_gateway = config.stripe_secret_key.as_ref().map(|key| {
        Arc::new(StripeGateway::new(config.stripe_api_base.clone(), key.clone()))
            as Arc<dyn PaymentGateway>
    });
    let gateway = select_gateway(live_gateway, config.simulated_gateway_delay);
    info!(mode = gateway.mode().as_str(), "Payment gateway ready");
    let notifier = Arc::new(LogNotifier);

    // --- 3. Connect to Storage & Build the Shared AppState ---
    let app_state = match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| ApiError::Internal("DATABASE_URL is required".to_string()))?;
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            let db_adapter = Arc::new(DbAdapter::new(db_pool));
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            AppState::new(db_adapter, gateway, notifier, config.clone())
        }
        StorageBackend::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            AppState::new(
                Arc::new(InMemoryStore::new()),
                gateway,
                notifier,
                config.clone(),
            )
        }
    };

    // --- 4. Create the Web Router ---
    let app = router(Arc::new(app_state))?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
