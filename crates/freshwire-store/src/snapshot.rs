// Poll snapshot service
//
// Stateless per call: projects the site's most recently updated items into
// fingerprint records. The caller keeps the previous snapshot and diffs
// content hashes itself; this service holds no subscriber state at all, which
// is what makes the poll path a self-healing fallback.

use std::sync::Arc;

use freshwire_core::{ContentSource, PollSnapshotItem, Result};

/// Bound on items per snapshot (most recently updated first)
pub const SNAPSHOT_LIMIT: usize = 200;

/// Stateless projection of content items into poll snapshot records
#[derive(Clone)]
pub struct SnapshotService {
    source: Arc<dyn ContentSource>,
}

impl SnapshotService {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// Fingerprint the site's current items
    pub async fn snapshot(&self, site_id: &str) -> Result<Vec<PollSnapshotItem>> {
        let items = self.source.list_items(site_id, SNAPSHOT_LIMIT).await?;
        Ok(items.iter().map(|item| item.to_snapshot_item()).collect())
    }
}
