//! Quota-aware TTL cache for upstream odds.
//!
//! The fetch orchestrator asks `should_fetch_fresh` before every upstream
//! call and stores the result with `set`. Expired records are treated as
//! absent even while they still sit in the store; `sweep_expired` reclaims
//! them. Low quota only warns: availability wins over strict enforcement.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::CacheConfig;
use crate::feed::types::ApiQuota;

/// Source of "now". Injected so expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stored payload plus fetch metadata. Serialized as
/// `{data, timestamp, expiresAt, requestsRemaining}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub data: T,
    #[serde(rename = "timestamp")]
    pub stored_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "requestsRemaining")]
    pub quota_remaining_at_fetch: Option<u64>,
}

impl<T> CacheRecord<T> {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Upstream API budget. Only updated after a real upstream call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaState {
    pub requests_used: u64,
    /// Unknown until the upstream API reports it.
    pub requests_remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    pub fn is_low(&self, threshold: u64) -> bool {
        matches!(self.requests_remaining, Some(r) if r < threshold)
    }
}

/// Backing storage for cache records, keyed by string.
pub trait RecordStore<T>: Send {
    fn load(&self, key: &str) -> Option<CacheRecord<T>>;
    fn store(&mut self, key: &str, record: CacheRecord<T>) -> Result<()>;
    /// Drop records that expired at or before `now`. Returns how many were removed.
    fn sweep(&mut self, now: DateTime<Utc>) -> usize;
}

pub struct MemoryStore<T> {
    records: HashMap<String, CacheRecord<T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T: Clone + Send> RecordStore<T> for MemoryStore<T> {
    fn load(&self, key: &str) -> Option<CacheRecord<T>> {
        self.records.get(key).cloned()
    }

    fn store(&mut self, key: &str, record: CacheRecord<T>) -> Result<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.is_valid_at(now));
        before - self.records.len()
    }
}

/// One JSON file per key under a directory. Survives restarts; same semantics
/// as `MemoryStore`.
pub struct JsonFileStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache dir: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            _marker: PhantomData,
        })
    }

    /// Percent-encoded so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut file = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file.push(byte as char);
            } else {
                file.push_str(&format!("%{byte:02X}"));
            }
        }
        self.dir.join(format!("{file}.json"))
    }

    fn json_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok().map(|e| e.path()))
                    .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<T: Serialize + DeserializeOwned> JsonFileStore<T> {
    fn read(path: &Path) -> Option<CacheRecord<T>> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable cache record");
                None
            }
        }
    }
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> for JsonFileStore<T> {
    fn load(&self, key: &str) -> Option<CacheRecord<T>> {
        Self::read(&self.path_for(key))
    }

    fn store(&mut self, key: &str, record: CacheRecord<T>) -> Result<()> {
        let path = self.path_for(key);
        let json = serde_json::to_string(&record).context("Failed to serialize cache record")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;
        Ok(())
    }

    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for path in self.json_files() {
            let keep = Self::read(&path).is_some_and(|r| r.is_valid_at(now));
            if !keep && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }
}

pub struct QuotaAwareCache<T> {
    store: Box<dyn RecordStore<T>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    low_quota_threshold: u64,
    quota: QuotaState,
}

impl<T: Clone + Send + 'static> QuotaAwareCache<T> {
    /// In-memory cache.
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Box::new(MemoryStore::new()), config, clock)
    }
}

impl<T> QuotaAwareCache<T> {
    pub fn with_store(
        store: Box<dyn RecordStore<T>>,
        config: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            ttl: ttl_from_secs(config.ttl_secs).unwrap_or(Duration::MAX),
            low_quota_threshold: config.low_quota_threshold,
            quota: QuotaState::default(),
        }
    }

    /// `sport:market_type`, with `%` and `:` escaped in the sport so the
    /// first separator is unambiguous.
    pub fn cache_key(sport: &str, market_type: &str) -> String {
        let sport = sport.replace('%', "%25").replace(':', "%3A");
        format!("{sport}:{market_type}")
    }

    /// Valid record for the key, never a stale one.
    pub fn record(&self, sport: &str, market_type: &str) -> Option<CacheRecord<T>> {
        let now = self.clock.now();
        self.store
            .load(&Self::cache_key(sport, market_type))
            .filter(|r| r.is_valid_at(now))
    }

    pub fn get(&self, sport: &str, market_type: &str) -> Option<T> {
        self.record(sport, market_type).map(|r| r.data)
    }

    pub fn is_fresh(&self, sport: &str, market_type: &str) -> bool {
        self.record(sport, market_type).is_some()
    }

    /// Store `data` for one TTL. A reported `quota_remaining` also updates quota state.
    pub fn set(
        &mut self,
        sport: &str,
        market_type: &str,
        data: T,
        quota_remaining: Option<u64>,
    ) -> Result<()> {
        let now = self.clock.now();
        let record = CacheRecord {
            data,
            stored_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            quota_remaining_at_fetch: quota_remaining,
        };
        self.store.store(&Self::cache_key(sport, market_type), record)?;

        if let Some(remaining) = quota_remaining {
            self.quota.requests_remaining = Some(remaining);
        }
        tracing::debug!(sport, market_type, ttl_secs = self.ttl.num_seconds(), "cached odds");
        Ok(())
    }

    /// Full quota report from an upstream response.
    pub fn record_usage(&mut self, quota: &ApiQuota) {
        self.quota.requests_used = quota.requests_used;
        self.quota.requests_remaining = Some(quota.requests_remaining);
        self.quota.reset_at = next_month_start(self.clock.now());
    }

    pub fn quota(&self) -> &QuotaState {
        &self.quota
    }

    /// Whether the caller should hit the upstream API.
    pub fn should_fetch_fresh(&self, sport: &str, market_type: &str, force_refresh: bool) -> bool {
        if force_refresh {
            tracing::info!(sport, market_type, "forced refresh, bypassing cache");
            self.warn_if_low();
            return true;
        }
        if self.is_fresh(sport, market_type) {
            tracing::debug!(sport, market_type, "cache hit");
            return false;
        }
        self.warn_if_low();
        true
    }

    fn warn_if_low(&self) {
        if self.quota.is_low(self.low_quota_threshold) {
            tracing::warn!(
                remaining = ?self.quota.requests_remaining,
                threshold = self.low_quota_threshold,
                "odds API quota low; fetching anyway"
            );
        }
    }

    pub fn sweep_expired(&mut self) -> usize {
        let removed = self.store.sweep(self.clock.now());
        if removed > 0 {
            tracing::debug!(removed, "swept expired cache records");
        }
        removed
    }
}

/// Cache TTL as a chrono duration; `None` when chrono cannot represent it.
pub fn ttl_from_secs(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

/// the-odds-api quotas reset on the first of each month (UTC).
fn next_month_start(now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
