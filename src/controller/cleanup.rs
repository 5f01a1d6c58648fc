//! Eviction of entries nobody has asked for in a long time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cache::VersionCache;
use crate::product::Product;
use crate::telemetry;

/// Evicts entries whose `last_accessed` lies beyond the inactivity
/// horizon.
///
/// Relevance is independent of freshness: an entry may be refreshed many
/// times without ever being evicted, and a briefly-stale entry that is
/// still being queried never qualifies.
pub struct CleanupController {
    product: String,
    cache: Arc<VersionCache>,
    evict_after: Duration,
    cycle: Duration,
}

impl CleanupController {
    pub fn new(product: &Product, evict_after: Duration, cycle: Duration) -> Self {
        Self {
            product: product.name().to_string(),
            cache: Arc::clone(product.cache()),
            evict_after,
            cycle,
        }
    }

    /// Run the eviction loop until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(product = %self.product, "starting cleanup controller");

        loop {
            let now = Instant::now();
            let evicted = self
                .cache
                .delete_all(|entry| now > entry.last_accessed + self.evict_after);

            if evicted > 0 {
                info!(product = %self.product, evicted, "evicted idle entries");
                metrics::counter!(telemetry::EVICTIONS_TOTAL, "product" => self.product.clone())
                    .increment(evicted as u64);
            }

            metrics::gauge!(telemetry::CACHE_ENTRIES, "product" => self.product.clone())
                .set(self.cache.size() as f64);

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = sleep(self.cycle) => {}
            }
        }
    }
}
