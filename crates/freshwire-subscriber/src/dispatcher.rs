// Revalidation dispatcher
//
// Turns one delivered event into timeout-bounded HTTP callbacks against the
// subscriber application's own revalidation endpoint. Fire-and-forget from
// the caller's perspective: the consumption loop never waits on dispatch.
//
// A settling delay is applied before the callbacks to absorb read-after-write
// lag in the upstream content path the revalidation target will itself query.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use freshwire_core::{revalidation_paths, FreshwireError, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::metrics::DeliveryMetrics;

/// Paths of one event revalidated in parallel, per task
const MAX_CONCURRENT_CALLS: usize = 4;
/// Attempts per path before the failure is recorded and dropped
const MAX_ATTEMPTS: u32 = 3;

/// Seam between event consumption and HTTP dispatch
pub trait Revalidator: Send + Sync {
    /// Kick off revalidation for one delivered event; must not block
    fn dispatch(&self, site_id: &str, collection: &str, slug: Option<&str>);
}

/// One event's worth of revalidation work; discarded after success or after
/// exhausting retries
#[derive(Debug, Clone)]
pub struct RevalidationTask {
    pub site_id: String,
    pub paths: Vec<String>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

/// HTTP-calling dispatcher with settling delay, bounded concurrency and
/// bounded retry
#[derive(Clone)]
pub struct RevalidationDispatcher {
    http: reqwest::Client,
    /// Base URL of the subscriber application exposing /api/revalidate
    base_url: String,
    settling_delay: Duration,
    call_timeout: Duration,
    metrics: Arc<DeliveryMetrics>,
}

impl RevalidationDispatcher {
    pub fn new(
        base_url: impl Into<String>,
        settling_delay: Duration,
        call_timeout: Duration,
        metrics: Arc<DeliveryMetrics>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settling_delay,
            call_timeout,
            metrics,
        }
    }

    /// Run one task to completion: all paths in parallel, failed paths
    /// retried as a shrinking batch
    pub async fn run_task(&self, mut task: RevalidationTask) {
        tokio::time::sleep(self.settling_delay).await;

        while !task.paths.is_empty() && task.attempt < MAX_ATTEMPTS {
            task.attempt += 1;
            if task.attempt > 1 {
                DeliveryMetrics::incr(&self.metrics.calls_retried);
                tokio::time::sleep(Duration::from_millis(250) * task.attempt).await;
            }

            let failed: Vec<String> = stream::iter(task.paths.clone())
                .map(|path| {
                    let site_id = task.site_id.clone();
                    let attempt = task.attempt;
                    async move {
                        match self.revalidate_path(&path).await {
                            Ok(()) => {
                                DeliveryMetrics::incr(&self.metrics.calls_succeeded);
                                None
                            }
                            Err(reason) => {
                                debug!(
                                    site_id = %site_id,
                                    path = %path,
                                    attempt = attempt,
                                    "Revalidation call failed: {}",
                                    reason
                                );
                                Some(path)
                            }
                        }
                    }
                })
                .buffer_unordered(MAX_CONCURRENT_CALLS)
                .filter_map(|failed| async move { failed })
                .collect()
                .await;

            task.paths = failed;
        }

        for path in &task.paths {
            DeliveryMetrics::incr(&self.metrics.calls_failed);
            warn!(
                site_id = %task.site_id,
                path = %path,
                attempts = task.attempt,
                "Giving up on revalidation path"
            );
        }
    }

    async fn revalidate_path(&self, path: &str) -> Result<()> {
        let url = format!("{}/api/revalidate", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("path", path)])
            .timeout(self.call_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FreshwireError::DispatchTimeout {
                        path: path.to_string(),
                        timeout_ms: self.call_timeout.as_millis() as u64,
                    }
                } else {
                    FreshwireError::transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(FreshwireError::DispatchHttp {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

impl Revalidator for RevalidationDispatcher {
    fn dispatch(&self, site_id: &str, collection: &str, slug: Option<&str>) {
        let task = RevalidationTask {
            site_id: site_id.to_string(),
            paths: revalidation_paths(collection, slug),
            attempt: 0,
            created_at: Utc::now(),
        };
        debug!(
            site_id = %task.site_id,
            paths = task.paths.len(),
            "Queueing revalidation task"
        );

        // Self-contained clone so the spawned task outlives the caller
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run_task(task).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(base_url: &str, metrics: Arc<DeliveryMetrics>) -> RevalidationDispatcher {
        RevalidationDispatcher::new(
            base_url,
            Duration::ZERO,
            Duration::from_secs(1),
            metrics,
        )
    }

    fn task(paths: Vec<&str>) -> RevalidationTask {
        RevalidationTask {
            site_id: "site-1".to_string(),
            paths: paths.into_iter().map(str::to_string).collect(),
            attempt: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_all_paths_called() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(4)
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        let dispatcher = dispatcher(&server.uri(), metrics.clone());
        dispatcher
            .run_task(task(vec!["/", "/blog", "/blog/hello", "/sitemap.xml"]))
            .await;

        assert_eq!(metrics.snapshot().calls_succeeded, 4);
        assert_eq!(metrics.snapshot().calls_failed, 0);
    }

    #[tokio::test]
    async fn test_path_is_passed_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .and(query_param("path", "/blog"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        dispatcher(&server.uri(), metrics).run_task(task(vec!["/blog"])).await;
    }

    #[tokio::test]
    async fn test_failures_are_retried_then_counted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        dispatcher(&server.uri(), metrics.clone()).run_task(task(vec!["/"])).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.calls_failed, 1);
        assert_eq!(snap.calls_retried, 2);
        assert_eq!(snap.calls_succeeded, 0);
    }

    #[tokio::test]
    async fn test_recovery_on_retry() {
        let server = MockServer::start().await;
        // First attempt fails, the mock then expires and the retry succeeds
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        dispatcher(&server.uri(), metrics.clone()).run_task(task(vec!["/"])).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.calls_succeeded, 1);
        assert_eq!(snap.calls_failed, 0);
    }

    #[tokio::test]
    async fn test_timeout_is_a_soft_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/revalidate"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        let dispatcher = RevalidationDispatcher::new(
            server.uri(),
            Duration::ZERO,
            Duration::from_millis(50),
            metrics.clone(),
        );
        dispatcher.run_task(task(vec!["/"])).await;

        assert_eq!(metrics.snapshot().calls_failed, 1);
    }

    #[tokio::test]
    async fn test_dispatch_does_not_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let metrics = Arc::new(DeliveryMetrics::default());
        let dispatcher = dispatcher(&server.uri(), metrics.clone());

        let started = std::time::Instant::now();
        dispatcher.dispatch("site-1", "blog", Some("hello"));
        // Returns immediately; the work runs on a spawned task
        assert!(started.elapsed() < Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(metrics.snapshot().calls_succeeded, 4);
    }
}
