// Shared app state for API routes

use std::sync::Arc;

use freshwire_core::DeliveryConfig;
use freshwire_store::{Broadcaster, EventStore, SiteRegistry, SnapshotService};

/// App state shared across routes
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<EventStore>,
    pub registry: Arc<SiteRegistry>,
    pub broadcaster: Broadcaster,
    pub snapshots: SnapshotService,
    pub config: Arc<DeliveryConfig>,
    /// Bearer secret protecting the cleanup endpoint
    pub cleanup_secret: Arc<str>,
}

impl ApiState {
    pub fn new(
        store: Arc<EventStore>,
        registry: Arc<SiteRegistry>,
        snapshots: SnapshotService,
        config: DeliveryConfig,
        cleanup_secret: impl Into<Arc<str>>,
    ) -> Self {
        let broadcaster = Broadcaster::new(store.clone(), registry.clone());
        Self {
            store,
            registry,
            broadcaster,
            snapshots,
            config: Arc::new(config),
            cleanup_secret: cleanup_secret.into(),
        }
    }
}
