// Reconnecting subscriber
//
// One long-lived logical task per subscribing process. Consumes the push
// channel (SSE), dedups by watermark, and hands each new record to the
// revalidator exactly once. When push capability is unavailable past a
// failure threshold, drops into the polling fallback and stays there until
// the process restarts - the two transports never depend on each other's
// state.
//
// The watermark advances to the max timestamp seen even when dispatch
// fails: delivery-notification and cache-invalidation are decoupled failure
// domains.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eventsource_stream::Eventsource;
use freshwire_core::{DeliveryConfig, EventRecord, FreshwireError, Result};
use futures::StreamExt;
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatcher::Revalidator;
use crate::metrics::DeliveryMetrics;
use crate::poll_client::{PollClient, SnapshotDiffer};

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const BACKOFF_JITTER_MS: u64 = 250;

/// Connection lifecycle of the push consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Entered when push is unavailable; exited only by process restart
    PollingFallback,
}

/// Subscriber process configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Base URL of the Freshwire API server
    pub api_url: String,
    pub site_id: String,
    pub api_key: String,
    /// Base URL of the subscriber application exposing /api/revalidate
    pub revalidate_url: String,
    pub delivery: DeliveryConfig,
}

impl SubscriberConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .map_err(|_| FreshwireError::config(format!("{} is required", name)))
        };
        Ok(Self {
            api_url: required("FRESHWIRE_API_URL")?,
            site_id: required("FRESHWIRE_SITE_ID")?,
            api_key: required("FRESHWIRE_API_KEY")?,
            revalidate_url: required("FRESHWIRE_REVALIDATE_URL")?,
            delivery: DeliveryConfig::from_env(),
        })
    }
}

/// Watermark-deduplicating consumer of the push channel with poll fallback
pub struct ReconnectingSubscriber {
    config: SubscriberConfig,
    http: reqwest::Client,
    revalidator: Arc<dyn Revalidator>,
    metrics: Arc<DeliveryMetrics>,
    state: RwLock<ConnectionState>,
    watermark: RwLock<DateTime<Utc>>,
}

impl ReconnectingSubscriber {
    pub fn new(
        config: SubscriberConfig,
        revalidator: Arc<dyn Revalidator>,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            revalidator,
            metrics,
            state: RwLock::new(ConnectionState::Disconnected),
            watermark: RwLock::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Timestamp boundary below which all events count as already processed
    pub fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.read()
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(state = ?state, "Subscriber state change");
        *self.state.write() = state;
    }

    /// Evaluate one delivered record against the watermark
    ///
    /// Records at or below the watermark are duplicates (reconnects, window
    /// shifts) and are never re-dispatched. New records are dispatched
    /// exactly once and the watermark advances regardless of dispatch
    /// outcome.
    fn process_record(&self, record: EventRecord) {
        let watermark = *self.watermark.read();
        if record.timestamp <= watermark {
            DeliveryMetrics::incr(&self.metrics.events_deduped);
            return;
        }

        self.revalidator.dispatch(
            &record.site_id,
            &record.collection,
            record.slug.as_deref(),
        );
        DeliveryMetrics::incr(&self.metrics.events_dispatched);
        *self.watermark.write() = record.timestamp;

        debug!(
            site_id = %record.site_id,
            event_type = %record.event_type,
            item_id = %record.item_id,
            timestamp = %record.timestamp,
            "Dispatched event"
        );
    }

    /// Run until shutdown; returns an error only for conditions that cannot
    /// heal by retrying (bad credentials, broken configuration)
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let mut failures: u32 = 0;
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.consume_push(&mut shutdown_rx, &mut failures).await {
                Ok(()) => break, // shutdown requested
                Err(FreshwireError::Unauthorized) => {
                    error!(site_id = %self.config.site_id, "Credentials rejected, giving up");
                    self.set_state(ConnectionState::Disconnected);
                    return Err(FreshwireError::Unauthorized);
                }
                Err(e) => {
                    failures += 1;
                    DeliveryMetrics::incr(&self.metrics.reconnects);
                    warn!(
                        site_id = %self.config.site_id,
                        failures,
                        "Push channel error: {}",
                        e
                    );

                    if failures >= self.config.delivery.fallback_threshold {
                        self.set_state(ConnectionState::PollingFallback);
                        let result = self.run_polling(&mut shutdown_rx).await;
                        self.set_state(ConnectionState::Disconnected);
                        return result;
                    }

                    // A watermark older than the retention window cannot be
                    // caught up incrementally; the next connected window
                    // simply starts from what the store still holds
                    let watermark = self.watermark();
                    if watermark > DateTime::<Utc>::MIN_UTC
                        && Utc::now() - watermark
                            > chrono::Duration::seconds(self.config.delivery.retention_secs as i64)
                    {
                        warn!(
                            watermark = %watermark,
                            "Watermark is older than the retention window; incremental catch-up may be incomplete"
                        );
                    }

                    self.set_state(ConnectionState::Reconnecting);
                    let delay = backoff_delay(failures);
                    debug!(delay_ms = delay.as_millis() as u64, "Backing off before reconnect");
                    tokio::select! {
                        _ = shutdown_rx.changed() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Open the SSE subscription and consume windows until shutdown or error
    ///
    /// Resets the failure counter once a connection is established.
    pub(crate) async fn consume_push(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
        failures: &mut u32,
    ) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let url = format!("{}/v1/subscribe", self.config.api_url.trim_end_matches('/'));
        let limit = self.config.delivery.push_window.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("site_id", self.config.site_id.as_str()),
                ("limit", limit.as_str()),
            ])
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| FreshwireError::transport(format!("Subscribe failed: {}", e)))?;

        if response.status().as_u16() == 401 {
            return Err(FreshwireError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(FreshwireError::transport(format!(
                "Subscribe returned HTTP {}",
                response.status().as_u16()
            )));
        }

        self.set_state(ConnectionState::Connected);
        *failures = 0;
        info!(site_id = %self.config.site_id, "Push channel connected");

        let mut stream = response.bytes_stream().eventsource();
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // A closed channel means the owner is gone: shut down
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Subscriber shutting down");
                        return Ok(());
                    }
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => match serde_json::from_str::<EventRecord>(&event.data) {
                        Ok(record) => self.process_record(record),
                        Err(e) => debug!("Skipping undecodable event: {}", e),
                    },
                    Some(Err(e)) => {
                        return Err(FreshwireError::transport(format!("Push stream error: {}", e)));
                    }
                    None => {
                        return Err(FreshwireError::transport("Push stream ended"));
                    }
                }
            }
        }
    }

    /// Poll-fallback loop: fetch, diff fingerprints, dispatch inferred
    /// changes. Only a shutdown or a credential rejection ends it.
    async fn run_polling(&self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<()> {
        info!(
            site_id = %self.config.site_id,
            interval_secs = self.config.delivery.poll_interval_secs,
            "Entering polling fallback"
        );

        let client = PollClient::new(
            self.config.api_url.clone(),
            self.config.site_id.clone(),
            self.config.api_key.clone(),
            self.config.delivery.revalidation_timeout(),
        );
        let mut differ = SnapshotDiffer::new();
        let mut ticker = tokio::time::interval(self.config.delivery.poll_interval());

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Polling fallback shutting down");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    match client.fetch_snapshot().await {
                        Ok(snapshot) => {
                            for change in differ.diff(snapshot) {
                                self.revalidator.dispatch(
                                    &self.config.site_id,
                                    &change.item.collection,
                                    change.item.slug.as_deref(),
                                );
                                DeliveryMetrics::incr(&self.metrics.events_dispatched);
                                debug!(
                                    event_type = %change.event_type,
                                    item_id = %change.item.item_id,
                                    "Dispatched inferred change"
                                );
                            }
                        }
                        Err(FreshwireError::Unauthorized) => {
                            error!(site_id = %self.config.site_id, "Poll credentials rejected, giving up");
                            return Err(FreshwireError::Unauthorized);
                        }
                        Err(e) => {
                            warn!("Poll fetch failed, will retry: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Capped exponential backoff with jitter; never busy-loops
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(10));
    let capped = Duration::from_millis(exp).min(BACKOFF_CAP);
    capped + Duration::from_millis(rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Captures dispatch calls instead of issuing HTTP
    #[derive(Default)]
    struct RecordingRevalidator {
        calls: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl Revalidator for RecordingRevalidator {
        fn dispatch(&self, site_id: &str, collection: &str, slug: Option<&str>) {
            self.calls.lock().push((
                site_id.to_string(),
                collection.to_string(),
                slug.map(str::to_string),
            ));
        }
    }

    fn config(api_url: &str) -> SubscriberConfig {
        SubscriberConfig {
            api_url: api_url.to_string(),
            site_id: "site-1".to_string(),
            api_key: "fw_test".to_string(),
            revalidate_url: "http://localhost:3000".to_string(),
            delivery: DeliveryConfig::default(),
        }
    }

    fn subscriber(
        api_url: &str,
    ) -> (Arc<ReconnectingSubscriber>, Arc<RecordingRevalidator>, Arc<DeliveryMetrics>) {
        subscriber_with(config(api_url))
    }

    fn subscriber_with(
        config: SubscriberConfig,
    ) -> (Arc<ReconnectingSubscriber>, Arc<RecordingRevalidator>, Arc<DeliveryMetrics>) {
        let revalidator = Arc::new(RecordingRevalidator::default());
        let metrics = Arc::new(DeliveryMetrics::default());
        let subscriber = Arc::new(ReconnectingSubscriber::new(
            config,
            revalidator.clone(),
            metrics.clone(),
        ));
        (subscriber, revalidator, metrics)
    }

    fn record(item_id: &str, timestamp: DateTime<Utc>) -> EventRecord {
        EventRecord {
            id: Uuid::now_v7(),
            site_id: "site-1".to_string(),
            event_type: freshwire_core::EventType::Updated,
            collection: "blog".to_string(),
            item_id: item_id.to_string(),
            slug: Some(item_id.to_string()),
            metadata: HashMap::new(),
            timestamp,
        }
    }

    #[test]
    fn test_watermark_advances_to_max_seen() {
        let (subscriber, revalidator, _) = subscriber("http://unused");
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);

        subscriber.process_record(record("item-1", t1));
        subscriber.process_record(record("item-2", t2));

        assert_eq!(subscriber.watermark(), t2);
        assert_eq!(revalidator.calls.lock().len(), 2);
    }

    #[test]
    fn test_no_double_dispatch_at_or_below_watermark() {
        let (subscriber, revalidator, metrics) = subscriber("http://unused");
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);

        subscriber.process_record(record("item-1", t2));
        // Replays: equal and older timestamps must never re-dispatch
        subscriber.process_record(record("item-1", t2));
        subscriber.process_record(record("item-0", t1));

        assert_eq!(revalidator.calls.lock().len(), 1);
        assert_eq!(metrics.snapshot().events_deduped, 2);
        // Watermark is monotonic: the stale record did not lower it
        assert_eq!(subscriber.watermark(), t2);
    }

    #[test]
    fn test_backoff_is_capped() {
        for attempt in 1..20 {
            let delay = backoff_delay(attempt);
            assert!(delay >= Duration::from_millis(BACKOFF_BASE_MS));
            assert!(delay < BACKOFF_CAP + Duration::from_millis(BACKOFF_JITTER_MS));
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/subscribe"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (subscriber, revalidator, _) = subscriber(&server.uri());
        let (_tx, rx) = watch::channel(false);

        let result = subscriber.run(rx).await;
        assert!(matches!(result, Err(FreshwireError::Unauthorized)));
        assert!(revalidator.calls.lock().is_empty());
        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_consume_push_processes_window_and_resets_failures() {
        let server = MockServer::start().await;
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);
        let body = format!(
            "event: updated\nid: {}\ndata: {}\n\nevent: published\nid: {}\ndata: {}\n\n",
            t1.to_rfc3339(),
            serde_json::to_string(&record("item-1", t1)).unwrap(),
            t2.to_rfc3339(),
            serde_json::to_string(&record("item-2", t2)).unwrap(),
        );
        Mock::given(method("GET"))
            .and(path("/v1/subscribe"))
            .and(query_param("site_id", "site-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let (subscriber, revalidator, metrics) = subscriber(&server.uri());
        let (_tx, mut rx) = watch::channel(false);
        let mut failures = 3;

        // The finite mock body ends the stream, which reads as a transport
        // error (a live channel never completes)
        let result = subscriber.consume_push(&mut rx, &mut failures).await;
        assert!(matches!(result, Err(FreshwireError::Transport(_))));

        assert_eq!(failures, 0);
        assert_eq!(metrics.snapshot().events_dispatched, 2);
        assert_eq!(subscriber.watermark(), t2);
        let calls = revalidator.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, "blog");
    }

    #[tokio::test]
    async fn test_falls_back_to_polling_and_dispatches_inferred_changes() {
        let server = MockServer::start().await;
        // Push is unavailable
        Mock::given(method("GET"))
            .and(path("/v1/subscribe"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let item = |hash: &str| {
            serde_json::json!({
                "item_id": "item-1",
                "slug": "item-1",
                "collection": "blog",
                "status": "published",
                "updated_at": Utc::now().to_rfc3339(),
                "content_hash": hash
            })
        };
        // First poll primes the differ, the second reports a changed hash
        Mock::given(method("GET"))
            .and(path("/v1/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [item("aaa")],
                "timestamp": Utc::now().to_rfc3339()
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/poll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [item("bbb")],
                "timestamp": Utc::now().to_rfc3339()
            })))
            .mount(&server)
            .await;

        let mut config = config(&server.uri());
        config.delivery.fallback_threshold = 1;
        config.delivery.poll_interval_secs = 1;
        let (subscriber, revalidator, _) = subscriber_with(config);

        let (tx, rx) = watch::channel(false);
        let handle = {
            let subscriber = subscriber.clone();
            tokio::spawn(async move { subscriber.run(rx).await })
        };

        // Prime tick plus at least one diff tick
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(subscriber.state(), ConnectionState::PollingFallback);

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let calls = revalidator.calls.lock();
        assert!(!calls.is_empty());
        assert_eq!(calls[0], (
            "site-1".to_string(),
            "blog".to_string(),
            Some("item-1".to_string())
        ));
    }
}
