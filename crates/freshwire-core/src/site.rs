// Site (tenant) entity and api-key credentials
// Decision: API keys are prefixed with "fw_" for identification
// Decision: Full key is shown only once at registration, stored hashed

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// API key prefix for identification
pub const API_KEY_PREFIX: &str = "fw_";
const API_KEY_LENGTH: usize = 32; // 32 random bytes = 64 hex chars

/// Registered tenant of the distribution pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Site {
    /// Opaque tenant identifier (matches EventRecord.site_id)
    pub id: String,
    pub name: String,
    /// SHA-256 hash of the site's api key
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Check a presented api key against the stored hash
    pub fn verify_api_key(&self, api_key: &str) -> bool {
        hash_api_key(api_key) == self.api_key_hash
    }
}

/// Generated API key (full key shown only at registration)
#[derive(Debug)]
pub struct GeneratedApiKey {
    /// Full API key (fw_<random>)
    pub key: String,
    /// SHA-256 hash for storage
    pub key_hash: String,
    /// Prefix for display (e.g., "fw_abc1...")
    pub key_prefix: String,
}

/// Generate a new API key
pub fn generate_api_key() -> GeneratedApiKey {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..API_KEY_LENGTH).map(|_| rng.gen()).collect();
    let random_hex = hex::encode(&random_bytes);

    let key = format!("{}{}", API_KEY_PREFIX, random_hex);
    let key_hash = hash_api_key(&key);
    let key_prefix = format!("{}{}...", API_KEY_PREFIX, &random_hex[..8]);

    GeneratedApiKey {
        key,
        key_hash,
        key_prefix,
    }
}

/// Hash an API key for storage/lookup
pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}

/// Validate API key format
pub fn is_valid_api_key_format(key: &str) -> bool {
    if !key.starts_with(API_KEY_PREFIX) {
        return false;
    }

    let key_part = &key[API_KEY_PREFIX.len()..];

    if key_part.len() != API_KEY_LENGTH * 2 {
        return false;
    }

    key_part.chars().all(|c| c.is_ascii_hexdigit())
}
