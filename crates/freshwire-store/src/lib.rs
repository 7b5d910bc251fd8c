// Event Store and Write Path
//
// The event store is the only shared mutable resource in the pipeline: an
// append-only, site-partitioned, time-bounded buffer. Everything else in
// this crate is a thin, stateless layer over it — the validating broadcaster,
// the credential registry, the fingerprint snapshot service and the sweeper.
//
// Key design decisions:
// - Per-site partitions with their own locks; no operation needs a
//   multi-step transaction and the sweeper never blocks the broadcaster
// - Timestamps assigned under the partition lock, clamped strictly
//   increasing per site (clock steps cannot reorder a site's log)
// - Store changes fan out as site ids on a broadcast channel; the push
//   channel re-queries the window rather than forwarding records, so lost
//   notifications only cost latency

pub mod broadcaster;
pub mod content;
pub mod event_store;
pub mod registry;
pub mod snapshot;
pub mod sweeper;

// Re-exports for convenience
pub use broadcaster::{AppendRequest, Broadcaster};
pub use content::MemoryContentSource;
pub use event_store::{EventStore, NewEvent};
pub use registry::SiteRegistry;
pub use snapshot::{SnapshotService, SNAPSHOT_LIMIT};
pub use sweeper::{evict_expired, spawn_sweeper};
