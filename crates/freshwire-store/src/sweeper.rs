// Sweeper - periodic eviction of expired event records
//
// Runs on a fixed interval independent of write traffic. The cutoff is
// computed at sweep start, so a record appended while the sweep runs is
// never at risk of premature eviction. Shutdown follows the watch-channel
// pattern used by the other long-lived tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::event_store::EventStore;

/// Evict records older than the retention window, returning the count removed
///
/// Safe to call at any frequency; a pass over an already-swept store removes
/// nothing.
pub fn evict_expired(store: &EventStore, retention: Duration) -> usize {
    let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::zero());
    let removed = store.evict(cutoff);
    if removed > 0 {
        info!(removed, cutoff = %cutoff, "Swept expired event records");
    } else {
        debug!(cutoff = %cutoff, "Sweep pass removed nothing");
    }
    removed
}

/// Spawn the periodic sweep loop
pub fn spawn_sweeper(
    store: Arc<EventStore>,
    retention: Duration,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would sweep an empty store
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    evict_expired(&store, retention);
                }
            }
        }
    })
}
