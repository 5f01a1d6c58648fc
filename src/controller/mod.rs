//! Background controllers operating on a product's version cache.
//!
//! - [`RefreshController`] keeps entries fresh by re-fetching any entry
//!   past its `valid_until`, independent of request traffic.
//! - [`CleanupController`] evicts entries unused for longer than the
//!   inactivity horizon, independent of freshness.
//!
//! Each runs as its own task on a fixed tick, honors the shared shutdown
//! signal within one tick, and never escalates failures.

mod cleanup;
mod refresh;

pub use cleanup::CleanupController;
pub use refresh::RefreshController;
