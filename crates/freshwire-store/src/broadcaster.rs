// Broadcaster - the only write path into the event store
//
// Validates the tenant, lets the store assign the per-site monotonic
// timestamp, and appends. The record is immediately visible to the push
// channel through the store's change notification; there is no separate
// publish step.

use std::collections::HashMap;
use std::sync::Arc;

use freshwire_core::{EventRecord, EventType, Result};

use crate::event_store::{EventStore, NewEvent};
use crate::registry::SiteRegistry;

/// A mutation notification as submitted by the content store
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub site_id: String,
    pub event_type: EventType,
    pub collection: String,
    pub item_id: String,
    pub slug: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Validating write path into the event store
#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<EventStore>,
    registry: Arc<SiteRegistry>,
}

impl Broadcaster {
    pub fn new(store: Arc<EventStore>, registry: Arc<SiteRegistry>) -> Self {
        Self { store, registry }
    }

    /// Append a mutation record for a registered site
    ///
    /// Fails with `UnknownSite` for unregistered tenants; the shared store
    /// must never accept writes for a tenant that does not exist.
    pub fn append(&self, request: AppendRequest) -> Result<EventRecord> {
        self.registry.get(&request.site_id)?;

        let record = self.store.append(NewEvent {
            site_id: request.site_id,
            event_type: request.event_type,
            collection: request.collection,
            item_id: request.item_id,
            slug: request.slug,
            metadata: request.metadata,
        });

        tracing::debug!(
            site_id = %record.site_id,
            event_type = %record.event_type,
            collection = %record.collection,
            item_id = %record.item_id,
            "Broadcast event record"
        );

        Ok(record)
    }
}
