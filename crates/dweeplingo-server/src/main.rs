//! DweepLingo Server - offline English/Hindi translation over HTTP

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use dweeplingo_core::{ComputeStrategy, MarianLoader, ModelRegistry, Settings};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dweeplingo_server=debug,dweeplingo_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting DweepLingo Translation Server");

    // Load configuration
    let settings = Settings::load(None)?;
    info!("Models directory: {:?}", settings.engine.models_dir);

    let strategy = ComputeStrategy::resolve(settings.engine.device)?;
    info!("Compute: {}", strategy);

    // Load models before accepting traffic
    let loader = Arc::new(MarianLoader::new(strategy, settings.engine.clone()));
    let registry = ModelRegistry::load(&settings.engine.models_dir, loader).await;
    info!("Models loaded: {:?}", registry.loaded());

    let state = AppState::new(registry, &settings.server);

    // Build router
    let app = api::create_router(state, &settings.server);

    // Start server
    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("Frontend: http://{}/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
