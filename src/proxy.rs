//! HTTP dispatch and process supervision.
//!
//! [`UpdateProxy`] owns every per-product instance (cache, upstream
//! client) plus the health monitor, builds the axum router over them,
//! and runs the whole assembly: background controllers, probe loop and
//! listener all share one shutdown signal, and `run` returns only after
//! all of them have stopped.

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::cache::{PARAM_ARCH, PARAM_CHANNEL, PARAM_VERSION, VersionKey};
use crate::config::Config;
use crate::controller::{CleanupController, RefreshController};
use crate::health::HealthMonitor;
use crate::product::Product;
use crate::telemetry;
use crate::{ProxyError, Result};

/// Content type of Cincinnati graph responses.
pub const GRAPH_CONTENT_TYPE: &str = "application/vnd.redhat.cincinnati.graph+json; version=1.0";

/// How long in-flight requests may keep draining after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The assembled proxy: products, health monitor and HTTP surface.
pub struct UpdateProxy {
    config: Config,
    products: Vec<Arc<Product>>,
    health: Arc<HealthMonitor>,
}

impl UpdateProxy {
    /// Validate `config` and construct every per-product instance.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let products = config
            .upstreams
            .iter()
            .map(|upstream| Product::new(upstream, &config.cache).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        // Probe target falls back to the first upstream endpoint.
        let health = Arc::new(HealthMonitor::new(
            &config.health,
            &config.upstreams[0].endpoint,
        )?);

        Ok(Self {
            config,
            products,
            health,
        })
    }

    pub fn products(&self) -> &[Arc<Product>] {
        &self.products
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Build the HTTP surface: one route per product plus the liveness
    /// endpoint. Unmatched paths fall through to axum's 404.
    pub fn router(&self) -> Router {
        let mut router = Router::new();
        for product in &self.products {
            router = router.route(
                product.path(),
                any(serve_product).with_state(Arc::clone(product)),
            );
        }

        if self.config.health.enabled {
            router = router.route(
                &self.config.health.path,
                any(serve_liveness).with_state(Arc::clone(&self.health)),
            );
        }

        router
    }

    /// Serve until `shutdown` fires, then drain and stop.
    ///
    /// Spawns the refresh and cleanup controllers for every product and
    /// the health probe loop, serves HTTP with graceful shutdown bounded
    /// by a grace period, and waits for all background tasks before
    /// returning.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = self.router();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        for product in &self.products {
            let refresh = RefreshController::new(product, self.config.cache.controller_cycle());
            tasks.push(tokio::spawn(refresh.run(shutdown.clone())));

            let cleanup = CleanupController::new(
                product,
                self.config.cache.evict_after(),
                self.config.cache.controller_cycle(),
            );
            tasks.push(tokio::spawn(cleanup.run(shutdown.clone())));
        }

        if self.config.health.enabled {
            let health = Arc::clone(&self.health);
            let rx = shutdown.clone();
            tasks.push(tokio::spawn(async move { health.run(rx).await }));
        }

        let listener = tokio::net::TcpListener::bind(self.config.listen.as_str()).await?;
        info!(address = %self.config.listen, "listening");

        let mut signal_rx = shutdown.clone();
        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = signal_rx.changed().await;
            })
            .into_future();
        tokio::pin!(serve);

        let mut drain_rx = shutdown.clone();
        tokio::select! {
            result = &mut serve => result?,
            _ = async {
                let _ = drain_rx.changed().await;
                sleep(SHUTDOWN_GRACE).await;
            } => {
                warn!("shutdown grace period elapsed, dropping in-flight requests");
            }
        }

        for task in tasks {
            let _ = task.await;
        }

        info!("proxy stopped");
        Ok(())
    }
}

/// Per-product request handler: method check, triple extraction, cache
/// or upstream, response metrics.
async fn serve_product(
    State(product): State<Arc<Product>>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let started = Instant::now();
    let response = dispatch(&product, &method, &params).await;

    metrics::histogram!(telemetry::RESPONSE_SECONDS, "product" => product.name().to_owned())
        .record(started.elapsed().as_secs_f64());

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!(
            telemetry::ERROR_RESPONSES_TOTAL,
            "product" => product.name().to_owned(),
            "status" => status.as_u16().to_string(),
        )
        .increment(1);
    }

    response
}

async fn dispatch(product: &Product, method: &Method, params: &HashMap<String, String>) -> Response {
    if !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        warn!(product = product.name(), %method, "rejecting disallowed method");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let key = match extract_key(params) {
        Ok(key) => key,
        Err(err) => {
            warn!(product = product.name(), %err, "rejecting malformed request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    metrics::counter!(
        telemetry::REQUESTS_TOTAL,
        "product" => product.name().to_owned(),
        "arch" => key.arch.clone(),
        "channel" => key.channel.clone(),
        "version" => key.version.clone(),
    )
    .increment(1);

    info!(product = product.name(), key = %key, "handling version request");

    match product.load(&key).await {
        Ok(body) => ([(header::CONTENT_TYPE, GRAPH_CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(product = product.name(), key = %key, %err, "cannot load version info");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn extract_key(params: &HashMap<String, String>) -> Result<VersionKey> {
    Ok(VersionKey::new(
        required_param(params, PARAM_ARCH)?,
        required_param(params, PARAM_CHANNEL)?,
        required_param(params, PARAM_VERSION)?,
    ))
}

fn required_param<'a>(params: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str> {
    match params.get(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ProxyError::MissingParam(name)),
    }
}

/// Liveness endpoint: 200 while the health monitor reports alive,
/// 500 while degraded. No side effects beyond a counter.
async fn serve_liveness(State(health): State<Arc<HealthMonitor>>) -> StatusCode {
    let alive = health.alive();
    let status = if alive { "alive" } else { "degraded" };
    debug!(alive, "serving liveness probe");
    metrics::counter!(telemetry::HEALTHCHECKS_TOTAL, "status" => status).increment(1);

    if alive {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
