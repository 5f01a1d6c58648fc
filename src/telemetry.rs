//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. The library only emits
//! through the `metrics` facade; the daemon (or any other consumer)
//! installs a recorder such as the prometheus exporter. Without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `product` — configured upstream name (e.g. "ocp", "okd")
//! - `arch`, `channel`, `version` — the requested triple
//! - `status` — HTTP status code, or "alive" / "degraded" for liveness

/// Total well-formed version requests received.
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Total cache hits.
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses (including expired entries).
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Current number of entries in a product's version cache.
///
/// Labels: `product`.
pub const CACHE_ENTRIES: &str = "muninn_cache_entries";

/// Total successful background refreshes.
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const REFRESH_TOTAL: &str = "muninn_refresh_total";

/// Total failed background refreshes.
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const REFRESH_ERRORS_TOTAL: &str = "muninn_refresh_errors_total";

/// Total entries evicted for inactivity.
///
/// Labels: `product`.
pub const EVICTIONS_TOTAL: &str = "muninn_evictions_total";

/// Upstream fetch duration in seconds, start to completion, any outcome.
///
/// Labels: `product`, `arch`, `channel`, `version`.
pub const UPSTREAM_RESPONSE_SECONDS: &str = "muninn_upstream_response_seconds";

/// Proxy response duration in seconds.
///
/// Labels: `product`.
pub const RESPONSE_SECONDS: &str = "muninn_response_seconds";

/// Total error responses returned to clients.
///
/// Labels: `product`, `status`.
pub const ERROR_RESPONSES_TOTAL: &str = "muninn_error_responses_total";

/// Total liveness probes served.
///
/// Labels: `status` ("alive" | "degraded").
pub const HEALTHCHECKS_TOTAL: &str = "muninn_healthchecks_total";
