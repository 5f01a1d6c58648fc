//! Per-product assembly: one cache plus one upstream client.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::cache::{VersionCache, VersionKey};
use crate::config::{CacheConfig, UpstreamConfig};
use crate::telemetry;
use crate::upstream::UpstreamClient;
use crate::Result;

/// One configured logical upstream with its own cache and client.
///
/// Constructed once at startup; the dispatcher and both background
/// controllers share it by reference.
pub struct Product {
    name: String,
    path: String,
    cache: Arc<VersionCache>,
    upstream: Arc<UpstreamClient>,
}

impl Product {
    pub fn new(config: &UpstreamConfig, cache_config: &CacheConfig) -> Result<Self> {
        let name = config.label().to_string();
        let upstream = UpstreamClient::new(&name, config)?;

        Ok(Self {
            path: config.path.clone(),
            cache: Arc::new(VersionCache::new(cache_config.default_lifetime())),
            upstream: Arc::new(upstream),
            name,
        })
    }

    /// Metrics/log label of this product.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path prefix this product is served under.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cache(&self) -> &Arc<VersionCache> {
        &self.cache
    }

    pub fn upstream(&self) -> &Arc<UpstreamClient> {
        &self.upstream
    }

    /// Serve `key` from the cache, falling back to a synchronous upstream
    /// fetch-and-populate on miss. Failed fetches are not cached.
    pub async fn load(&self, key: &VersionKey) -> Result<Bytes> {
        if let Some(body) = self.cache.get(key) {
            debug!(product = %self.name, key = %key, "cache hit");
            self.triple_counter(telemetry::CACHE_HITS_TOTAL, key);
            return Ok(body);
        }

        debug!(product = %self.name, key = %key, "cache miss");
        self.triple_counter(telemetry::CACHE_MISSES_TOTAL, key);

        let body = self.upstream.load_version_info(key).await?;
        self.cache.set(key, body.clone());

        metrics::gauge!(telemetry::CACHE_ENTRIES, "product" => self.name.clone())
            .set(self.cache.size() as f64);

        Ok(body)
    }

    fn triple_counter(&self, metric: &'static str, key: &VersionKey) {
        metrics::counter!(
            metric,
            "product" => self.name.clone(),
            "arch" => key.arch.clone(),
            "channel" => key.channel.clone(),
            "version" => key.version.clone(),
        )
        .increment(1);
    }
}
