//! Background refresh of expired cache entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::{VersionCache, VersionKey};
use crate::product::Product;
use crate::telemetry;
use crate::upstream::UpstreamClient;

/// Re-fetches entries past their freshness deadline so popular triples
/// stay warm without depending on request timing.
///
/// A failed refresh leaves the stale entry untouched; it remains
/// servable with its last-known body until the next successful refresh
/// or until the cleanup controller evicts it for inactivity.
pub struct RefreshController {
    product: String,
    cache: Arc<VersionCache>,
    client: Arc<UpstreamClient>,
    cycle: Duration,
}

impl RefreshController {
    pub fn new(product: &Product, cycle: Duration) -> Self {
        Self {
            product: product.name().to_string(),
            cache: Arc::clone(product.cache()),
            client: Arc::clone(product.upstream()),
            cycle,
        }
    }

    /// Run the refresh loop until `shutdown` fires.
    ///
    /// Cancellation is honored mid-sweep: the in-flight fetch is raced
    /// against the shutdown signal and remaining entries are skipped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(product = %self.product, "starting refresh controller");

        loop {
            if !self.sweep(&mut shutdown).await {
                return;
            }

            metrics::gauge!(telemetry::CACHE_ENTRIES, "product" => self.product.clone())
                .set(self.cache.size() as f64);

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = sleep(self.cycle) => {}
            }
        }
    }

    /// One pass over the cache. Returns `false` if shutdown interrupted it.
    async fn sweep(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let now = Instant::now();
        let mut stale: Vec<VersionKey> = Vec::new();
        self.cache.for_each(|entry| {
            if now > entry.valid_until {
                stale.push(entry.key.clone());
            }
        });

        for key in stale {
            debug!(product = %self.product, key = %key, "refreshing entry");

            let fetched = tokio::select! {
                _ = shutdown.changed() => return false,
                result = self.client.load_version_info(&key) => result,
            };

            match fetched {
                Ok(body) => {
                    self.cache.refresh(&key, body);
                    self.triple_counter(telemetry::REFRESH_TOTAL, &key);
                    info!(product = %self.product, key = %key, "refreshed entry");
                }
                Err(err) => {
                    self.triple_counter(telemetry::REFRESH_ERRORS_TOTAL, &key);
                    warn!(product = %self.product, key = %key, %err, "failed to refresh entry, keeping stale body");
                }
            }
        }

        true
    }

    fn triple_counter(&self, metric: &'static str, key: &VersionKey) {
        metrics::counter!(
            metric,
            "product" => self.product.clone(),
            "arch" => key.arch.clone(),
            "channel" => key.channel.clone(),
            "version" => key.version.clone(),
        )
        .increment(1);
    }
}
