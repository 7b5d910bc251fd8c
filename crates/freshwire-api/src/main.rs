// Freshwire API server
// Decision: Tenants are provisioned via FRESHWIRE_SITES; an empty registry
//           gets a dev site with a generated key logged once at startup

use std::sync::Arc;

use anyhow::{Context, Result};
use freshwire_api::{build_router, ApiDoc, ApiState};
use freshwire_core::DeliveryConfig;
use freshwire_store::{EventStore, MemoryContentSource, SiteRegistry, SnapshotService};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshwire_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("freshwire-api starting...");

    let config = DeliveryConfig::from_env();
    tracing::info!(
        retention_secs = config.retention_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        push_window = config.push_window,
        "Delivery configuration loaded"
    );

    let store = Arc::new(EventStore::new());
    let registry = Arc::new(SiteRegistry::new());

    let seeded = registry.seed_from_env();
    if seeded > 0 {
        tracing::info!(sites = seeded, "Seeded tenants from FRESHWIRE_SITES");
    } else {
        let (site, key) = registry.register("site-1", "Dev Site");
        tracing::warn!(
            site_id = %site.id,
            api_key = %key.key,
            "No tenants configured; registered a dev site (key shown once)"
        );
    }

    let cleanup_secret = std::env::var("FRESHWIRE_CLEANUP_SECRET").unwrap_or_else(|_| {
        tracing::warn!("FRESHWIRE_CLEANUP_SECRET not set; using dev default");
        "dev-cleanup-secret".to_string()
    });

    let content = Arc::new(MemoryContentSource::new());
    let snapshots = SnapshotService::new(content);

    let state = ApiState::new(
        store.clone(),
        registry,
        snapshots,
        config.clone(),
        cleanup_secret,
    );

    // Periodic retention sweep, independent of the /v1/cleanup cron hook
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = freshwire_store::spawn_sweeper(
        store,
        config.retention(),
        config.sweep_interval(),
        shutdown_rx,
    );

    let app = build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("FRESHWIRE_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    // Stop the sweeper before exiting
    let _ = shutdown_tx.send(true);
    sweeper.await.ok();

    Ok(())
}
