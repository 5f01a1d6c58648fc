//! Outbound fetch client for one upstream update-graph endpoint.

use std::time::Instant;

use bytes::Bytes;
use reqwest::Url;
use tracing::debug;

use crate::cache::{PARAM_ARCH, PARAM_CHANNEL, PARAM_VERSION, VersionKey};
use crate::config::UpstreamConfig;
use crate::telemetry;
use crate::{ProxyError, Result};

/// HTTP client bound to a single configured upstream endpoint.
///
/// Holds its own transport configuration (timeout, optional TLS bypass)
/// and no other shared state. Retry policy belongs to the caller: the
/// refresh controller waits for its next cycle, the dispatcher surfaces
/// the failure to the client immediately.
pub struct UpstreamClient {
    product: String,
    endpoint: Url,
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Build a client for `config`, labelled `product` in metrics.
    ///
    /// When `config.insecure` is set, certificate validation is skipped
    /// for this client only, never globally.
    pub fn new(product: &str, config: &UpstreamConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ProxyError::Configuration(format!(
                "invalid endpoint {:?} for upstream {:?}: {e}",
                config.endpoint, product
            ))
        })?;

        let mut builder = reqwest::Client::builder().timeout(config.timeout());
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            product: product.to_string(),
            endpoint,
            http: builder.build()?,
        })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Fetch the update graph for `key` from upstream.
    ///
    /// Transport failures and HTTP statuses >= 400 are both errors; any
    /// other status yields the full response payload. Response latency is
    /// recorded start-to-completion regardless of outcome.
    pub async fn load_version_info(&self, key: &VersionKey) -> Result<Bytes> {
        let started = Instant::now();
        let result = self.fetch(key).await;

        metrics::histogram!(
            telemetry::UPSTREAM_RESPONSE_SECONDS,
            "product" => self.product.clone(),
            "arch" => key.arch.clone(),
            "channel" => key.channel.clone(),
            "version" => key.version.clone(),
        )
        .record(started.elapsed().as_secs_f64());

        result
    }

    async fn fetch(&self, key: &VersionKey) -> Result<Bytes> {
        // The outbound query carries exactly the triple. Anything else a
        // client sent (cluster ids in particular) stops here.
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(PARAM_ARCH, &key.arch)
            .append_pair(PARAM_CHANNEL, &key.channel)
            .append_pair(PARAM_VERSION, &key.version);

        debug!(%url, "fetching from upstream");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            debug!(%status, endpoint = %self.endpoint, key = %key, "got error response");
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}
