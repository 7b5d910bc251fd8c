// Poll-fallback client
//
// Fetches fingerprint snapshots and diffs them against the previous one to
// detect change without an event log. The event-type inference here is an
// approximation: this path has no concept of event type, so an
// updated-then-unpublished sequence reads as a plain delete. Subscribers
// needing precise event semantics should stay on the push channel.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use freshwire_core::{EventType, FreshwireError, PollSnapshotItem, Result};
use serde::Deserialize;

/// HTTP client for the poll snapshot endpoint
pub struct PollClient {
    http: reqwest::Client,
    base_url: String,
    site_id: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    items: Vec<PollSnapshotItem>,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
}

impl PollClient {
    pub fn new(
        base_url: impl Into<String>,
        site_id: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            site_id: site_id.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    /// Fetch the current snapshot for the site
    pub async fn fetch_snapshot(&self) -> Result<Vec<PollSnapshotItem>> {
        let url = format!("{}/v1/poll", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("site_id", self.site_id.as_str())])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FreshwireError::transport(format!("Poll fetch failed: {}", e)))?;

        if response.status().as_u16() == 401 {
            return Err(FreshwireError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(FreshwireError::transport(format!(
                "Poll fetch returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: PollResponse = response
            .json()
            .await
            .map_err(|e| FreshwireError::transport(format!("Bad poll response: {}", e)))?;
        Ok(body.items)
    }
}

/// A change inferred from two consecutive snapshots
#[derive(Debug, Clone)]
pub struct InferredChange {
    pub event_type: EventType,
    pub item: PollSnapshotItem,
}

/// Stateful hash differ; holds the previous snapshot keyed by item id
#[derive(Default)]
pub struct SnapshotDiffer {
    previous: HashMap<String, PollSnapshotItem>,
    primed: bool,
}

impl SnapshotDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a fresh snapshot against the previous one
    ///
    /// Inference rules: an item id never seen before is `created`; a changed
    /// hash for a known id is `updated`; a previously-seen id that
    /// disappeared is `deleted`. The first snapshot primes the baseline and
    /// emits nothing - a fresh subscriber has no stale cache to invalidate.
    pub fn diff(&mut self, snapshot: Vec<PollSnapshotItem>) -> Vec<InferredChange> {
        let mut current: HashMap<String, PollSnapshotItem> = snapshot
            .into_iter()
            .map(|item| (item.item_id.clone(), item))
            .collect();

        if !self.primed {
            self.primed = true;
            self.previous = current;
            return Vec::new();
        }

        let mut changes = Vec::new();

        for (item_id, item) in &current {
            match self.previous.get(item_id) {
                None => changes.push(InferredChange {
                    event_type: EventType::Created,
                    item: item.clone(),
                }),
                Some(prev) if prev.content_hash != item.content_hash => {
                    changes.push(InferredChange {
                        event_type: EventType::Updated,
                        item: item.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for (item_id, prev) in &self.previous {
            if !current.contains_key(item_id) {
                changes.push(InferredChange {
                    event_type: EventType::Deleted,
                    item: prev.clone(),
                });
            }
        }

        std::mem::swap(&mut self.previous, &mut current);
        changes
    }
}
