// Freshwire subscriber binary
//
// One long-lived consumer process per subscriber application. Connects the
// push channel, dispatches revalidation callbacks, and exits cleanly on
// ctrl-c with a final metrics report.

use std::sync::Arc;

use anyhow::{Context, Result};
use freshwire_subscriber::{
    DeliveryMetrics, ReconnectingSubscriber, RevalidationDispatcher, SubscriberConfig,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "freshwire_subscriber=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("freshwire-subscriber starting...");

    let config = SubscriberConfig::from_env().context("Invalid subscriber configuration")?;
    tracing::info!(
        api_url = %config.api_url,
        site_id = %config.site_id,
        revalidate_url = %config.revalidate_url,
        settling_delay_ms = config.delivery.settling_delay_ms,
        "Subscriber configuration loaded"
    );

    let metrics = Arc::new(DeliveryMetrics::default());
    let dispatcher = Arc::new(RevalidationDispatcher::new(
        config.revalidate_url.clone(),
        config.delivery.settling_delay(),
        config.delivery.revalidation_timeout(),
        metrics.clone(),
    ));
    let subscriber = ReconnectingSubscriber::new(config, dispatcher, metrics.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let result = subscriber.run(shutdown_rx).await;

    tracing::info!(stats = ?metrics.snapshot(), "Delivery metrics at shutdown");
    result.context("Subscriber terminated with error")?;

    Ok(())
}
