use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vistagram::{config::Config, create_router, db, errors::AppError, AppState, Database};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "vistagram=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::load()?);
    tracing::info!(
        backend = ?config.storage_backend,
        bind_address = %config.bind_address,
        public_base_url = ?config.public_base_url,
        "Configuration loaded"
    );

    // Storage connects in the background; handlers answer 500 until it is ready.
    let (database, sender) = Database::connecting();
    tokio::spawn(db::connect(config.clone(), sender));

    let state = Arc::new(AppState::new(database, config.max_upload_bytes));
    let app = create_router(state);

    tracing::info!("Server listening on http://{}", config.bind_address);
    tracing::info!("Health check: http://{}/api/health", config.bind_address);

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
