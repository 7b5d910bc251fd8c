// Freshwire subscriber runtime
//
// Runs inside the subscriber application. Consumes the push channel with
// watermark dedup and reconnect backoff, falls back to fingerprint polling
// when push is unavailable, and drives retried, timeout-bounded revalidation
// callbacks into the application's own cache layer.
//
// Key design decisions:
// - The Revalidator trait separates event consumption from HTTP dispatch;
//   dispatch failures can never stall consumption
// - The watermark advances on every new record even if its dispatch fails -
//   notification delivery and cache invalidation are separate failure domains
// - The poll fallback carries no subscriber state server-side; it diffs
//   fingerprints locally and is entered only when push is unavailable

pub mod dispatcher;
pub mod metrics;
pub mod poll_client;
pub mod subscriber;

// Re-exports for convenience
pub use dispatcher::{RevalidationDispatcher, RevalidationTask, Revalidator};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use poll_client::{InferredChange, PollClient, SnapshotDiffer};
pub use subscriber::{ConnectionState, ReconnectingSubscriber, SubscriberConfig};
