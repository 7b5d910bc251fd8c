// Content fingerprints for the poll-fallback path
//
// A subscriber with no push connection detects change by diffing per-item
// content hashes between snapshots. The digest must cover every mutable
// field so that two snapshots of the same item differ in `content_hash`
// iff any observable field differs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Authoritative content item as read from the content store
///
/// This is the input to snapshot fingerprinting; the pipeline never mutates
/// or validates content itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Stable identifier, unique within site+collection
    pub item_id: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    /// Publication status (e.g. "published", "draft")
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// All custom fields of the item
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

/// Per-item change-detection record returned by the poll snapshot service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PollSnapshotItem {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub collection: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
    /// Deterministic digest of every mutable field
    pub content_hash: String,
}

impl ContentItem {
    /// Compute the deterministic fingerprint of this item's mutable fields
    ///
    /// Custom data is folded in sorted key order so the digest is independent
    /// of map iteration order. Field names and values are separated by
    /// sentinel bytes so adjacent fields cannot alias each other.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |name: &str, value: &str| {
            hasher.update(name.as_bytes());
            hasher.update([0x00]);
            hasher.update(value.as_bytes());
            hasher.update([0x1e]);
        };

        field("title", &self.title);
        field("status", &self.status);
        field("created_at", &self.created_at.to_rfc3339());
        field("updated_at", &self.updated_at.to_rfc3339());

        let mut keys: Vec<&String> = self.data.keys().collect();
        keys.sort();
        for key in keys {
            // serde_json serializes object keys in sorted order, so nested
            // values are deterministic too
            let value = serde_json::to_string(&self.data[key]).unwrap_or_default();
            field(key, &value);
        }

        hex::encode(hasher.finalize())
    }

    /// Project this item into its poll-snapshot form
    pub fn to_snapshot_item(&self) -> PollSnapshotItem {
        PollSnapshotItem {
            item_id: self.item_id.clone(),
            slug: self.slug.clone(),
            collection: self.collection.clone(),
            status: self.status.clone(),
            updated_at: self.updated_at,
            content_hash: self.content_hash(),
        }
    }
}
