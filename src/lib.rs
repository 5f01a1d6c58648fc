//! Muninn - Caching reverse proxy for Cincinnati update-graph APIs
//!
//! Muninn sits in front of one or more upstream update-graph endpoints
//! (queried by `arch`/`channel`/`version` triples, the way OpenShift
//! clusters poll for upgrade paths) and shields them from redundant load.
//! Responses are answered from an in-memory per-product cache; misses are
//! fetched and populated transparently; background controllers keep
//! popular entries fresh and evict entries nobody asks for anymore.
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{Config, UpdateProxy};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let config = Config::load(Some("config.toml".as_ref()))?;
//!     let proxy = UpdateProxy::new(config)?;
//!
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         shutdown_tx.send(true).ok();
//!     });
//!
//!     proxy.run(shutdown_rx).await
//! }
//! ```

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod product;
pub mod proxy;
pub mod telemetry;
pub mod upstream;
pub mod version;

// Re-export main types at crate root
pub use cache::{VersionCache, VersionEntry, VersionKey};
pub use config::Config;
pub use error::{ProxyError, Result};
pub use health::HealthMonitor;
pub use product::Product;
pub use proxy::UpdateProxy;
pub use upstream::UpstreamClient;
pub use version::{PKG_VERSION, version_string};
