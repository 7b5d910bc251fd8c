// In-memory event store
// Decision: Use parking_lot for thread-safe access
// Decision: One partition per site; the outer map lock is held only to look
//           up or create a partition, never while touching records
//
// The store is an append-only, site-partitioned, time-bounded buffer. Records
// are held in ascending timestamp order per partition, so eviction pops from
// the front and window queries read from the back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use freshwire_core::{EventRecord, EventType};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the store-change notification channel; subscribers that lag
/// behind simply re-query the window, so losing notifications is harmless
const CHANGE_QUEUE_SIZE: usize = 64;

/// Fields of a record not assigned by the store
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub site_id: String,
    pub event_type: EventType,
    pub collection: String,
    pub item_id: String,
    pub slug: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Default)]
struct Partition {
    /// Ascending by timestamp
    records: VecDeque<EventRecord>,
    /// High-water mark for timestamp assignment, survives eviction
    last_timestamp: Option<DateTime<Utc>>,
}

/// Append-only, site-partitioned, time-bounded buffer of event records
pub struct EventStore {
    partitions: RwLock<HashMap<String, Arc<Mutex<Partition>>>>,
    changes: broadcast::Sender<String>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            changes: broadcast::channel(CHANGE_QUEUE_SIZE).0,
        }
    }

    fn partition(&self, site_id: &str) -> Arc<Mutex<Partition>> {
        if let Some(partition) = self.partitions.read().get(site_id) {
            return partition.clone();
        }
        self.partitions
            .write()
            .entry(site_id.to_string())
            .or_default()
            .clone()
    }

    /// Append a record, assigning its timestamp
    ///
    /// The assigned timestamp is clamped to be strictly greater than the
    /// partition's previous one, so per-site order survives clock steps and
    /// equal-timestamp records can never collide on the watermark.
    pub fn append(&self, event: NewEvent) -> EventRecord {
        let partition = self.partition(&event.site_id);
        let record = {
            let mut partition = partition.lock();
            let mut timestamp = Utc::now();
            if let Some(last) = partition.last_timestamp {
                if timestamp <= last {
                    timestamp = last + ChronoDuration::microseconds(1);
                }
            }
            partition.last_timestamp = Some(timestamp);

            let record = EventRecord {
                id: Uuid::now_v7(),
                site_id: event.site_id,
                event_type: event.event_type,
                collection: event.collection,
                item_id: event.item_id,
                slug: event.slug,
                metadata: event.metadata,
                timestamp,
            };
            partition.records.push_back(record.clone());
            record
        };

        // No receivers is fine; push subscribers come and go
        let _ = self.changes.send(record.site_id.clone());
        record
    }

    /// Records with `timestamp > since`, most recent first, bounded by `limit`
    pub fn query(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Vec<EventRecord> {
        let partition = match self.partitions.read().get(site_id) {
            Some(p) => p.clone(),
            None => return Vec::new(),
        };
        let partition = partition.lock();
        partition
            .records
            .iter()
            .rev()
            .filter(|r| r.timestamp > since)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Remove every record with `timestamp < cutoff`, returning the count
    ///
    /// The cutoff is computed by the caller at sweep start; records appended
    /// while the sweep runs carry later timestamps and are never touched.
    /// Partitions are locked one at a time, so appends to other sites (and to
    /// the partition being swept, once its lock is released) proceed freely.
    pub fn evict(&self, cutoff: DateTime<Utc>) -> usize {
        let partitions: Vec<Arc<Mutex<Partition>>> =
            self.partitions.read().values().cloned().collect();

        let mut removed = 0;
        for partition in partitions {
            let mut partition = partition.lock();
            while partition
                .records
                .front()
                .is_some_and(|r| r.timestamp < cutoff)
            {
                partition.records.pop_front();
                removed += 1;
            }
        }
        removed
    }

    /// Subscribe to store-change notifications (the payload is the site id)
    pub fn subscribe_changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    /// Total records currently retained across all sites
    pub fn record_count(&self) -> usize {
        let partitions: Vec<Arc<Mutex<Partition>>> =
            self.partitions.read().values().cloned().collect();
        partitions.iter().map(|p| p.lock().records.len()).sum()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_event(site_id: &str, item_id: &str) -> NewEvent {
        NewEvent {
            site_id: site_id.to_string(),
            event_type: EventType::Updated,
            collection: "blog".to_string(),
            item_id: item_id.to_string(),
            slug: Some("my-post".to_string()),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_append_and_query() {
        let store = EventStore::new();
        store.append(new_event("site-1", "item-42"));

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let records = store.query("site-1", epoch, 50);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, "item-42");

        // Other sites see nothing
        assert!(store.query("site-2", epoch, 50).is_empty());
    }

    #[test]
    fn test_timestamps_strictly_increase_per_site() {
        let store = EventStore::new();
        let mut last = None;
        for i in 0..100 {
            let record = store.append(new_event("site-1", &format!("item-{i}")));
            if let Some(last) = last {
                assert!(record.timestamp > last);
            }
            last = Some(record.timestamp);
        }
    }

    #[test]
    fn test_query_most_recent_first_and_limited() {
        let store = EventStore::new();
        for i in 0..10 {
            store.append(new_event("site-1", &format!("item-{i}")));
        }

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let records = store.query("site-1", epoch, 3);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].item_id, "item-9");
        assert_eq!(records[2].item_id, "item-7");
        for pair in records.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp);
        }
    }

    #[test]
    fn test_query_since_is_exclusive() {
        let store = EventStore::new();
        let first = store.append(new_event("site-1", "item-1"));
        let second = store.append(new_event("site-1", "item-2"));

        let records = store.query("site-1", first.timestamp, 50);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, "item-2");

        assert!(store.query("site-1", second.timestamp, 50).is_empty());
    }

    #[test]
    fn test_evict_by_cutoff() {
        let store = EventStore::new();
        let first = store.append(new_event("site-1", "item-1"));
        let second = store.append(new_event("site-1", "item-2"));

        // Cutoff between the two records: only the first goes
        let removed = store.evict(second.timestamp);
        assert_eq!(removed, 1);

        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let records = store.query("site-1", epoch, 50);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_id, "item-2");
        assert!(records[0].timestamp >= first.timestamp);
    }

    #[test]
    fn test_evict_is_idempotent() {
        let store = EventStore::new();
        store.append(new_event("site-1", "item-1"));
        let cutoff = Utc::now() + ChronoDuration::seconds(1);
        assert_eq!(store.evict(cutoff), 1);
        assert_eq!(store.evict(cutoff), 0);
    }

    #[test]
    fn test_monotonicity_survives_eviction() {
        let store = EventStore::new();
        let first = store.append(new_event("site-1", "item-1"));
        store.evict(Utc::now() + ChronoDuration::seconds(1));

        // The high-water mark persists, so a new record still sorts after
        let second = store.append(new_event("site-1", "item-2"));
        assert!(second.timestamp > first.timestamp);
    }

    #[tokio::test]
    async fn test_change_notification() {
        let store = EventStore::new();
        let mut changes = store.subscribe_changes();
        store.append(new_event("site-1", "item-1"));
        assert_eq!(changes.recv().await.unwrap(), "site-1");
    }

    #[test]
    fn test_concurrent_appends_across_sites() {
        let store = Arc::new(EventStore::new());
        let mut handles = Vec::new();
        for site in 0..4 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..250 {
                    store.append(new_event(&format!("site-{site}"), &format!("item-{i}")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.record_count(), 1000);
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        for site in 0..4 {
            let records = store.query(&format!("site-{site}"), epoch, 1000);
            assert_eq!(records.len(), 250);
            // Per-site order is total and strictly increasing
            for pair in records.windows(2) {
                assert!(pair[0].timestamp > pair[1].timestamp);
            }
        }
    }

    #[test]
    fn test_evict_races_with_appends() {
        let store = Arc::new(EventStore::new());
        for i in 0..100 {
            store.append(new_event("site-1", &format!("old-{i}")));
        }
        let cutoff = Utc::now();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    store.append(new_event("site-1", &format!("new-{i}")));
                }
            })
        };
        let removed = store.evict(cutoff);
        writer.join().unwrap();

        // Nothing written after the cutoff was computed may be evicted
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let remaining = store.query("site-1", epoch, 1000);
        assert_eq!(remaining.len() + removed, 200);
        for record in &remaining {
            if record.item_id.starts_with("new-") {
                assert!(record.timestamp >= cutoff);
            }
        }
        assert!(remaining.iter().all(|r| r.timestamp >= cutoff));
    }
}
