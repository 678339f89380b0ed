//! Caching module
//!
//! Providers that sign requests with a token obtained from their credential
//! (an OAuth bearer token, an app access token) keep the token here so a
//! login is not repeated for every page.

use moka::future::Cache;
use moka::policy::EvictionPolicy;

/// Most tokens a provider keeps at once
pub const TOKEN_CACHE_CAPACITY: u64 = 20;

/// Least-recently-used cache of access tokens, keyed by credential string
#[derive(Clone)]
pub struct TokenCache {
    cache: Cache<String, String>,
}

impl TokenCache {
    /// Create a token cache holding at most `max_capacity` tokens
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self { cache }
    }

    /// Get the cached token for a credential
    pub async fn get(&self, credential: &str) -> Option<String> {
        self.cache.get(credential).await
    }

    /// Remember the token for a credential
    pub async fn set(&self, credential: &str, token: String) {
        self.cache.insert(credential.to_string(), token).await;
    }

    /// Forget a token that the provider no longer accepts
    pub async fn remove(&self, credential: &str) {
        self.cache.invalidate(credential).await;
    }

    /// Number of cached tokens (approximate until pending evictions run)
    pub async fn size(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(TOKEN_CACHE_CAPACITY)
    }
}
