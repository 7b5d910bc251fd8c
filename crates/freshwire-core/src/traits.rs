// Trait seams for pluggable backends
//
// The poll snapshot service reads the authoritative content store, which is
// external to this pipeline. ContentSource is the seam: the API server wires
// in whatever backend holds the content, tests wire in an in-memory one.

use async_trait::async_trait;

use crate::error::Result;
use crate::fingerprint::ContentItem;

/// Read access to the authoritative content store
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// List a site's items, most recently updated first, bounded by `limit`
    async fn list_items(&self, site_id: &str, limit: usize) -> Result<Vec<ContentItem>>;
}
