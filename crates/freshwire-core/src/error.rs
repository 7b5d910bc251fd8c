// Error types for the delivery pipeline

use thiserror::Error;

/// Result type alias for delivery operations
pub type Result<T> = std::result::Result<T, FreshwireError>;

/// Errors that can occur across the distribution pipeline
///
/// `UnknownSite` and `Unauthorized` are caller errors and are never retried.
/// `Transport` drives the subscriber's reconnect backoff. Dispatch failures
/// are logged and counted, never propagated into the event-consumption loop.
#[derive(Debug, Error)]
pub enum FreshwireError {
    /// The site id does not resolve to a registered tenant
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    /// Credentials do not match the site
    #[error("Unauthorized")]
    Unauthorized,

    /// Push channel or poll fetch failure (triggers subscriber backoff)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Revalidation callback exceeded its deadline
    #[error("Dispatch timed out for path {path} after {timeout_ms}ms")]
    DispatchTimeout { path: String, timeout_ms: u64 },

    /// Revalidation callback returned a non-2xx status
    #[error("Dispatch failed for path {path}: HTTP {status}")]
    DispatchHttp { path: String, status: u16 },

    /// The event store rejected an append; the mutation is committed but the
    /// notification is lost (covered by the poll fallback)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FreshwireError {
    /// Create an unknown-site error
    pub fn unknown_site(site_id: impl Into<String>) -> Self {
        FreshwireError::UnknownSite(site_id.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        FreshwireError::Transport(msg.into())
    }

    /// Create a store-unavailable error
    pub fn store(msg: impl Into<String>) -> Self {
        FreshwireError::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        FreshwireError::Configuration(msg.into())
    }

    /// True for errors the caller must not retry
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FreshwireError::UnknownSite(_) | FreshwireError::Unauthorized
        )
    }
}
