// Bearer credential extraction
//
// Both read surfaces (poll, subscribe) and the cleanup endpoint authenticate
// with a bearer token. Extraction is header-only; verification happens
// against the site registry (api keys) or the configured cleanup secret.

use axum::http::{header, HeaderMap};

/// Pull the bearer token out of the Authorization header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
