//! In-memory emulation of the platform Cache API.
//!
//! Entries expire lazily: there is no sweeper, expiry is checked when an entry
//! is read through [`MockCache::get`] or [`MockCache::match_key`]. A byte quota
//! is tracked for reporting only and is never enforced.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Response headers, ordered for stable serialization.
pub type Headers = BTreeMap<String, String>;

/// Default quota reported by [`MockCache::new`] (matches the platform's 10 MB tier).
pub const DEFAULT_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

fn default_status() -> u16 {
    200
}

/// Arguments to [`MockCache::put`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePutOptions {
    /// Time to live in seconds. `0` means the entry never expires.
    #[serde(default)]
    pub ttl: u64,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: Headers,

    #[serde(default)]
    pub body: String,
}

impl CachePutOptions {
    /// A 200 response with the given body and TTL.
    pub fn new(body: impl Into<String>, ttl: u64) -> Self {
        Self {
            ttl,
            status: default_status(),
            headers: Headers::new(),
            body: body.into(),
        }
    }
}

/// An owned copy of a cached response handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

/// Absolute expiry of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Compute the expiry for a TTL starting at `now`.
    ///
    /// A TTL of zero, or one too large to represent, never expires.
    pub fn from_ttl(now: DateTime<Utc>, ttl_seconds: u64) -> Self {
        if ttl_seconds == 0 {
            return Expiry::Never;
        }

        i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .map(Expiry::At)
            .unwrap_or(Expiry::Never)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => now >= *at,
        }
    }
}

/// A stored cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub ttl_seconds: u64,
    pub headers: Headers,
    pub status: u16,
    pub body: String,
    pub expires_at: Expiry,
    pub last_used: DateTime<Utc>,
}

impl CacheEntry {
    fn to_response(&self) -> CachedResponse {
        CachedResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }

    /// Approximate footprint used for quota accounting.
    fn size_bytes(&self) -> u64 {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        (self.key.len() + self.body.len() + headers) as u64
    }
}

/// Mock Cache API shared between the control channel and the orchestrator.
#[derive(Debug)]
pub struct MockCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    quota_bytes: u64,
}

impl MockCache {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Store a response under `key`, replacing any previous entry.
    pub fn put(&self, key: &str, options: CachePutOptions) {
        self.put_at(key, options, Utc::now());
    }

    /// Fetch a copy of the entry, refreshing its `last_used` time.
    ///
    /// Returns `None` when the key is missing or expired; expired entries are removed.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        self.get_at(key, Utc::now())
    }

    /// Read-only lookup with the same expiry rule as [`MockCache::get`].
    pub fn match_key(&self, key: &str) -> Option<CachedResponse> {
        self.match_at(key, Utc::now())
    }

    /// Remove the entry unconditionally. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub(crate) fn put_at(&self, key: &str, options: CachePutOptions, now: DateTime<Utc>) {
        let entry = CacheEntry {
            key: key.to_string(),
            ttl_seconds: options.ttl,
            headers: options.headers,
            status: options.status,
            body: options.body,
            expires_at: Expiry::from_ttl(now, options.ttl),
            last_used: now,
        };

        let mut entries = self.entries.write();
        entries.insert(key.to_string(), entry);

        let used: u64 = entries.values().map(CacheEntry::size_bytes).sum();
        if used > self.quota_bytes {
            tracing::debug!(
                used_bytes = used,
                quota_bytes = self.quota_bytes,
                "mock cache is over its quota (not enforced)"
            );
        }
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CachedResponse> {
        let mut entries = self.entries.write();
        let expired = entries.get(key)?.expires_at.is_expired(now);
        if expired {
            entries.remove(key);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.last_used = now;
        Some(entry.to_response())
    }

    pub(crate) fn match_at(&self, key: &str, now: DateTime<Utc>) -> Option<CachedResponse> {
        {
            let entries = self.entries.read();
            let entry = entries.get(key)?;
            if !entry.expires_at.is_expired(now) {
                return Some(entry.to_response());
            }
        }

        self.entries.write().remove(key);
        None
    }

    /// Snapshot of a stored entry without touching `last_used` or expiry.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Bytes currently held, including expired entries not yet collected.
    pub fn used_bytes(&self) -> u64 {
        self.entries.read().values().map(CacheEntry::size_bytes).sum()
    }

    pub fn quota_bytes(&self) -> u64 {
        self.quota_bytes
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}
