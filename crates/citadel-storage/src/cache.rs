//! # Checksum Cache
//!
//! TTL-bounded in-memory map of artifact path → digests. Entries are
//! created on the first complete read or write of an artifact, refreshed on
//! every write, and considered absent once older than the configured
//! lifetime — readers never see a stale digest even between sweeper passes.
//!
//! A single background sweeper task evicts expired entries every
//! `expired_check_interval`. The sweeper walks the map one entry at a time
//! (per-entry atomicity only), so foreground `get`/`put`/`invalidate`
//! never wait for a whole eviction pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use citadel_core::digest::{ChecksumAlgorithm, DigestSet};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    digests: HashMap<ChecksumAlgorithm, String>,
    last_refreshed: Instant,
}

impl CacheEntry {
    fn is_expired(&self, lifetime: Duration, now: Instant) -> bool {
        now.duration_since(self.last_refreshed) > lifetime
    }
}

/// Process-wide digest cache with an explicit start/stop lifecycle for its
/// eviction task.
pub struct ChecksumCache {
    entries: DashMap<String, CacheEntry>,
    lifetime: Duration,
    sweep_interval: Duration,
    stopped: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ChecksumCache {
    pub fn new(lifetime: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            lifetime,
            sweep_interval,
            stopped: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            Duration::from_millis(config.lifetime),
            Duration::from_millis(config.expired_check_interval),
        )
    }

    /// A fresh digest for the path, or `None` when absent or expired.
    pub fn get(&self, path_key: &str, algorithm: ChecksumAlgorithm) -> Option<String> {
        let entry = self.entries.get(path_key)?;
        if entry.is_expired(self.lifetime, Instant::now()) {
            return None;
        }
        entry.digests.get(&algorithm).cloned()
    }

    /// Store one digest, refreshing the entry's timestamp.
    pub fn put(&self, path_key: &str, algorithm: ChecksumAlgorithm, digest: String) {
        let mut entry = self
            .entries
            .entry(path_key.to_string())
            .or_insert_with(|| CacheEntry {
                digests: HashMap::new(),
                last_refreshed: Instant::now(),
            });
        entry.digests.insert(algorithm, digest);
        entry.last_refreshed = Instant::now();
    }

    /// Store a complete digest set, refreshing the entry's timestamp.
    pub fn put_all(&self, path_key: &str, digests: &DigestSet) {
        let mut entry = self
            .entries
            .entry(path_key.to_string())
            .or_insert_with(|| CacheEntry {
                digests: HashMap::new(),
                last_refreshed: Instant::now(),
            });
        entry
            .digests
            .insert(ChecksumAlgorithm::Md5, digests.md5.clone());
        entry
            .digests
            .insert(ChecksumAlgorithm::Sha1, digests.sha1.clone());
        entry.last_refreshed = Instant::now();
    }

    /// Drop all algorithms cached for the path.
    pub fn invalidate(&self, path_key: &str) {
        self.entries.remove(path_key);
    }

    /// One eviction pass. Returns the number of evicted entries.
    pub fn sweep_once(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(self.lifetime, now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the background sweeper on the current tokio runtime. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock().expect("sweeper lock poisoned");
        if guard.is_some() {
            return;
        }
        self.stopped.store(false, Ordering::SeqCst);
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            // The first tick fires immediately; skip it so a pass always
            // runs a full interval after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if cache.stopped.load(Ordering::SeqCst) {
                    break;
                }
                let evicted = cache.sweep_once();
                if evicted > 0 {
                    tracing::debug!(evicted, "checksum cache sweep");
                }
            }
        });
        *guard = Some(handle);
    }

    /// Stop the background sweeper. Cached entries remain; `get` still
    /// filters expired ones.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.sweeper.lock().expect("sweeper lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for ChecksumCache {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.sweeper.get_mut().expect("sweeper lock poisoned").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citadel_core::digest::digest_bytes;

    fn cache_with_lifetime(lifetime: Duration) -> ChecksumCache {
        ChecksumCache::new(lifetime, Duration::from_secs(3600))
    }

    #[test]
    fn get_returns_fresh_entry() {
        let cache = cache_with_lifetime(Duration::from_secs(60));
        cache.put("k", ChecksumAlgorithm::Md5, "abc".to_string());
        assert_eq!(cache.get("k", ChecksumAlgorithm::Md5).as_deref(), Some("abc"));
        assert_eq!(cache.get("k", ChecksumAlgorithm::Sha1), None);
    }

    #[test]
    fn get_filters_expired_entry() {
        let cache = cache_with_lifetime(Duration::from_millis(0));
        cache.put("k", ChecksumAlgorithm::Md5, "abc".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k", ChecksumAlgorithm::Md5), None);
    }

    #[test]
    fn put_refreshes_timestamp() {
        let cache = cache_with_lifetime(Duration::from_millis(50));
        cache.put("k", ChecksumAlgorithm::Md5, "v1".to_string());
        std::thread::sleep(Duration::from_millis(30));
        cache.put("k", ChecksumAlgorithm::Sha1, "v2".to_string());
        std::thread::sleep(Duration::from_millis(30));
        // 60ms after the first put, but only 30ms after the refresh.
        assert_eq!(cache.get("k", ChecksumAlgorithm::Md5).as_deref(), Some("v1"));
    }

    #[test]
    fn put_all_stores_both_algorithms() {
        let cache = cache_with_lifetime(Duration::from_secs(60));
        let digests = digest_bytes(b"abc");
        cache.put_all("k", &digests);
        assert_eq!(
            cache.get("k", ChecksumAlgorithm::Md5).as_deref(),
            Some(digests.md5.as_str())
        );
        assert_eq!(
            cache.get("k", ChecksumAlgorithm::Sha1).as_deref(),
            Some(digests.sha1.as_str())
        );
    }

    #[test]
    fn invalidate_removes_all_algorithms() {
        let cache = cache_with_lifetime(Duration::from_secs(60));
        cache.put_all("k", &digest_bytes(b"abc"));
        cache.invalidate("k");
        assert_eq!(cache.get("k", ChecksumAlgorithm::Md5), None);
        assert_eq!(cache.get("k", ChecksumAlgorithm::Sha1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_evicts_only_expired() {
        let cache = cache_with_lifetime(Duration::from_millis(20));
        cache.put("old", ChecksumAlgorithm::Md5, "x".to_string());
        std::thread::sleep(Duration::from_millis(40));
        cache.put("fresh", ChecksumAlgorithm::Md5, "y".to_string());

        let evicted = cache.sweep_once();
        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh", ChecksumAlgorithm::Md5).as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn background_sweeper_evicts() {
        let cache = Arc::new(ChecksumCache::new(
            Duration::from_millis(10),
            Duration::from_millis(20),
        ));
        cache.put("k", ChecksumAlgorithm::Md5, "x".to_string());
        cache.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.is_empty());
        cache.stop();
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_clears() {
        let cache = Arc::new(ChecksumCache::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        cache.start();
        cache.start();
        cache.stop();
        // A stopped cache still answers lookups.
        cache.put("k", ChecksumAlgorithm::Sha1, "z".to_string());
        assert_eq!(cache.get("k", ChecksumAlgorithm::Sha1).as_deref(), Some("z"));
    }

    #[test]
    fn concurrent_put_and_get() {
        let cache = Arc::new(cache_with_lifetime(Duration::from_secs(60)));
        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("k{}", i % 10);
                    cache.put(&key, ChecksumAlgorithm::Md5, format!("{t}-{i}"));
                    let _ = cache.get(&key, ChecksumAlgorithm::Md5);
                    if i % 7 == 0 {
                        cache.invalidate(&key);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
