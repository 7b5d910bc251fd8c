// Live Content-Update Distribution — core types
//
// This crate defines the shared vocabulary of the pipeline that propagates
// committed content mutations to independently-deployed subscriber
// applications.
//
// Key design decisions:
// - Event records are immutable; the timestamp is the sole ordering and
//   dedup key (per-site monotonic, no cross-site order)
// - Two delivery transports stay fully independent: a push channel (best
//   effort, duplicates allowed) and a stateless poll snapshot fallback that
//   detects change by content fingerprint alone
// - Notification is decoupled from content: a lost event degrades latency,
//   never correctness
// - The authoritative content store is behind the ContentSource trait

pub mod config;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod paths;
pub mod site;
pub mod traits;

// Re-exports for convenience
pub use config::DeliveryConfig;
pub use error::{FreshwireError, Result};
pub use event::{EventRecord, EventType};
pub use fingerprint::{ContentItem, PollSnapshotItem};
pub use paths::revalidation_paths;
pub use site::{generate_api_key, hash_api_key, GeneratedApiKey, Site, API_KEY_PREFIX};
pub use traits::ContentSource;
