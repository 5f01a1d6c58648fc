//! Upstream liveness probing.
//!
//! A single probe loop polls the configured health URL (or the first
//! upstream endpoint when none is set) and maintains one boolean the
//! liveness endpoint reads lock-free. The loop runs at a coarse interval
//! while healthy; a failed probe switches it to a tight retry cadence
//! until the probe succeeds again or the failure threshold is reached.

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Url;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::HealthConfig;
use crate::{ProxyError, Result};

/// Liveness state fed by a background probe loop.
pub struct HealthMonitor {
    alive: AtomicBool,
    config: HealthConfig,
    target: Url,
    http: reqwest::Client,
}

impl HealthMonitor {
    /// Build a monitor probing `config.url`, falling back to
    /// `fallback_url` (the first upstream endpoint) when none is set.
    pub fn new(config: &HealthConfig, fallback_url: &str) -> Result<Self> {
        let raw_target = match config.url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => fallback_url,
        };
        let target = Url::parse(raw_target).map_err(|e| {
            ProxyError::Configuration(format!("invalid health URL {raw_target:?}: {e}"))
        })?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            alive: AtomicBool::new(true),
            config: config.clone(),
            target,
            http: builder.build()?,
        })
    }

    /// Current liveness. Lock-free, callable from any task at any rate.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    async fn probe(&self) -> Result<()> {
        let response = self.http.get(self.target.clone()).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Run the probe loop until `shutdown` fires.
    ///
    /// Exactly `failure_threshold` consecutive probe failures flip the
    /// state to degraded; any success flips it back immediately and
    /// resets the streak. Probe failures are never fatal.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        debug!(target = %self.target, "starting health check loop");
        self.alive.store(true, Ordering::Relaxed);

        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = sleep(self.config.interval()) => {}
            }

            let mut failures: u32 = 0;
            loop {
                match self.probe().await {
                    Ok(()) => {
                        if failures > 0 || !self.alive() {
                            info!(target = %self.target, "health probe recovered");
                        }
                        self.alive.store(true, Ordering::Relaxed);
                        break;
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(%err, failures, threshold = self.config.failure_threshold, "health probe failed");

                        if failures >= self.config.failure_threshold {
                            self.alive.store(false, Ordering::Relaxed);
                            // Streak exhausted; resume the coarse cadence.
                            break;
                        }

                        tokio::select! {
                            _ = shutdown.changed() => return,
                            _ = sleep(self.config.retry_interval()) => {}
                        }
                    }
                }
            }
        }
    }
}
