// Event record entity
//
// One immutable notification of a content mutation. Records are append-only:
// they are never updated after the broadcaster assigns their timestamp.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Kind of content mutation an event record describes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Published,
    Deleted,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Created => write!(f, "created"),
            EventType::Updated => write!(f, "updated"),
            EventType::Published => write!(f, "published"),
            EventType::Deleted => write!(f, "deleted"),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "created" => EventType::Created,
            "published" => EventType::Published,
            "deleted" => EventType::Deleted,
            _ => EventType::Updated,
        }
    }
}

/// EventRecord - immutable notification of a committed content mutation
///
/// Within one `site_id`, `timestamp` values observed by any reader are
/// non-decreasing in insertion order. `timestamp` is the sole ordering and
/// dedup key; `metadata` is advisory and never required for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EventRecord {
    pub id: Uuid,
    /// Opaque tenant identifier
    pub site_id: String,
    pub event_type: EventType,
    /// Logical content-type name (e.g. "blog", "pages")
    pub collection: String,
    /// Stable item identifier, unique within site+collection
    pub item_id: String,
    /// Human-readable item identifier, absent for unkeyed items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Small opaque bag (title, author, tags)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Affected-path set for this record (site root, collection, optional
    /// slug page, global indexes)
    pub fn revalidation_paths(&self) -> Vec<String> {
        crate::paths::revalidation_paths(&self.collection, self.slug.as_deref())
    }
}
