//! Concurrent TTL-aware version cache.
//!
//! One [`VersionCache`] exists per configured product. Entries are keyed
//! by the `(arch, channel, version)` triple and carry two independent
//! clocks: `valid_until` (freshness, advanced by `set` and `refresh`)
//! and `last_accessed` (relevance, advanced only by `get` hits). The
//! refresh controller keeps entries fresh; the cleanup controller evicts
//! entries past the inactivity horizon. `get` itself never evicts.
//!
//! All operations go through a single mutex. Entry bodies are [`Bytes`],
//! so snapshots and hit responses clone a refcount, not the payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Query parameter carrying the cluster architecture.
pub const PARAM_ARCH: &str = "arch";
/// Query parameter carrying the update channel.
pub const PARAM_CHANNEL: &str = "channel";
/// Query parameter carrying the current cluster version.
pub const PARAM_VERSION: &str = "version";

/// Logical identity of one update-graph query.
///
/// Two keys are equal iff all three fields match exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionKey {
    pub arch: String,
    pub channel: String,
    pub version: String,
}

impl VersionKey {
    pub fn new(
        arch: impl Into<String>,
        channel: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            arch: arch.into(),
            channel: channel.into(),
            version: version.into(),
        }
    }

    /// Canonical query-string encoding of the triple.
    ///
    /// Parameters appear sorted by name (`arch`, `channel`, `version`)
    /// and form-urlencoded, so the encoding is stable across callers.
    pub fn canonical_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair(PARAM_ARCH, &self.arch)
            .append_pair(PARAM_CHANNEL, &self.channel)
            .append_pair(PARAM_VERSION, &self.version)
            .finish()
    }

    /// Fixed-length storage key: hex SHA-256 of [`canonical_query`](Self::canonical_query).
    pub fn storage_key(&self) -> String {
        let digest = Sha256::digest(self.canonical_query().as_bytes());
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.arch, self.channel, self.version)
    }
}

/// One cached upstream response.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub key: VersionKey,
    /// Raw upstream response payload.
    pub body: Bytes,
    /// Last time a `get` hit returned this entry. Sole basis for eviction.
    pub last_accessed: Instant,
    /// Freshness deadline. The refresh controller re-fetches past it.
    pub valid_until: Instant,
}

impl VersionEntry {
    /// An entry is valid while it is fresh and carries a non-empty body.
    pub fn is_valid(&self, now: Instant) -> bool {
        now < self.valid_until && !self.body.is_empty()
    }
}

/// Concurrent-safe store of `(arch, channel, version) → entry`.
pub struct VersionCache {
    default_lifetime: Duration,
    entries: Mutex<HashMap<String, VersionEntry>>,
}

impl VersionCache {
    /// Create an empty cache whose entries stay fresh for `default_lifetime`.
    pub fn new(default_lifetime: Duration) -> Self {
        Self {
            default_lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    // No operation can panic while holding the lock, so a poisoned map
    // is still consistent; recover rather than propagate.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VersionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the entry for `key`.
    ///
    /// A valid hit updates `last_accessed` and returns the body. An
    /// expired or empty entry returns `None` and is left in place (only
    /// the cleanup controller evicts). A miss returns `None`.
    pub fn get(&self, key: &VersionKey) -> Option<Bytes> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&key.storage_key())?;
        if !entry.is_valid(Instant::now()) {
            return None;
        }

        entry.last_accessed = Instant::now();
        Some(entry.body.clone())
    }

    /// Insert or overwrite the entry for `key`.
    ///
    /// Both clocks restart: `last_accessed = now`,
    /// `valid_until = now + default_lifetime`.
    pub fn set(&self, key: &VersionKey, body: Bytes) {
        let now = Instant::now();
        let entry = VersionEntry {
            key: key.clone(),
            body,
            last_accessed: now,
            valid_until: now + self.default_lifetime,
        };

        self.lock().insert(key.storage_key(), entry);
    }

    /// Replace the body of an existing entry and advance `valid_until`,
    /// leaving `last_accessed` untouched — a refresh is not an access.
    ///
    /// No-op if the entry was deleted in the meantime.
    pub fn refresh(&self, key: &VersionKey, body: Bytes) {
        let now = Instant::now();
        if let Some(entry) = self.lock().get_mut(&key.storage_key()) {
            entry.body = body;
            entry.valid_until = now + self.default_lifetime;
        }
    }

    /// Remove the entry for `key` if present.
    pub fn delete(&self, key: &VersionKey) {
        self.lock().remove(&key.storage_key());
    }

    /// Visit a snapshot of all currently-stored entries.
    ///
    /// The snapshot is taken under the lock; the visitor runs outside it,
    /// so it may call back into the cache (refresh, delete) freely. It
    /// observes entry state as of the snapshot, which may lag concurrent
    /// mutations by one traversal.
    pub fn for_each(&self, mut visitor: impl FnMut(&VersionEntry)) {
        let snapshot: Vec<VersionEntry> = self.lock().values().cloned().collect();
        for entry in &snapshot {
            visitor(entry);
        }
    }

    /// Atomically remove every entry matching `predicate`, returning the
    /// number removed.
    pub fn delete_all(&self, predicate: impl Fn(&VersionEntry) -> bool) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !predicate(entry));
        before - entries.len()
    }

    /// Current entry count. Observability only.
    pub fn size(&self) -> usize {
        self.lock().len()
    }
}
