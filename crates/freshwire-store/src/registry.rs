// Site registry
// Decision: Registration returns the full api key exactly once; only the
//           hash is retained
//
// The registry is the multi-tenancy guard: the broadcaster refuses writes
// for unregistered sites, and the read surfaces refuse credentials that do
// not match.

use std::collections::HashMap;

use chrono::Utc;
use freshwire_core::{
    generate_api_key, hash_api_key, FreshwireError, GeneratedApiKey, Result, Site,
};
use parking_lot::RwLock;

/// Registered tenants and their credentials
#[derive(Default)]
pub struct SiteRegistry {
    sites: RwLock<HashMap<String, Site>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a site with a freshly generated api key
    pub fn register(&self, site_id: impl Into<String>, name: impl Into<String>) -> (Site, GeneratedApiKey) {
        let generated = generate_api_key();
        let site = Site {
            id: site_id.into(),
            name: name.into(),
            api_key_hash: generated.key_hash.clone(),
            created_at: Utc::now(),
        };
        self.sites.write().insert(site.id.clone(), site.clone());
        (site, generated)
    }

    /// Register a site with a pre-shared api key (env-provisioned tenants)
    pub fn register_with_key(
        &self,
        site_id: impl Into<String>,
        name: impl Into<String>,
        api_key: &str,
    ) -> Site {
        let site = Site {
            id: site_id.into(),
            name: name.into(),
            api_key_hash: hash_api_key(api_key),
            created_at: Utc::now(),
        };
        self.sites.write().insert(site.id.clone(), site.clone());
        site
    }

    /// Seed tenants from `FRESHWIRE_SITES` ("site-1=fw_abc...,site-2=fw_def...")
    pub fn seed_from_env(&self) -> usize {
        let Ok(raw) = std::env::var("FRESHWIRE_SITES") else {
            return 0;
        };
        let mut count = 0;
        for pair in raw.split(',') {
            let Some((site_id, api_key)) = pair.trim().split_once('=') else {
                tracing::warn!(entry = %pair, "Skipping malformed FRESHWIRE_SITES entry");
                continue;
            };
            self.register_with_key(site_id, site_id, api_key);
            count += 1;
        }
        count
    }

    /// Look up a site, failing with `UnknownSite` — the broadcaster's
    /// data-poisoning guard
    pub fn get(&self, site_id: &str) -> Result<Site> {
        self.sites
            .read()
            .get(site_id)
            .cloned()
            .ok_or_else(|| FreshwireError::unknown_site(site_id))
    }

    /// Verify a credential pair for the read surfaces
    ///
    /// Unknown sites and wrong keys both map to `Unauthorized` so the read
    /// path never discloses which tenants exist.
    pub fn authorize(&self, site_id: &str, api_key: &str) -> Result<Site> {
        let sites = self.sites.read();
        match sites.get(site_id) {
            Some(site) if site.verify_api_key(api_key) => Ok(site.clone()),
            _ => Err(FreshwireError::Unauthorized),
        }
    }

    pub fn len(&self) -> usize {
        self.sites.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.read().is_empty()
    }
}
