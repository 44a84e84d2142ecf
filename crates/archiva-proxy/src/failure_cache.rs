//! Memo of URLs that failed recently
//!
//! Entries expire lazily: an entry older than the TTL is treated as absent and
//! dropped the next time it is looked at.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct FailureCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Instant>>,
}

impl FailureCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True if `url` failed within the TTL window
    pub fn has_failed_before(&self, url: &str) -> bool {
        let failed_at = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(url) {
                Some(at) => *at,
                None => return false,
            }
        };

        if failed_at.elapsed() < self.ttl {
            return true;
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have recorded a fresh failure in between
        if entries.get(url).is_some_and(|at| at.elapsed() >= self.ttl) {
            entries.remove(url);
        }
        false
    }

    /// Record a failure of `url` now
    pub fn cache_failure(&self, url: &str) {
        tracing::debug!("Caching failure of {}", url);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), Instant::now());
    }

    /// Forget a failure, e.g. after a successful transfer
    pub fn remove_failure(&self, url: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
    }

    /// Number of tracked entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, at| at.elapsed() < self.ttl);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const URL: &str = "https://repo.example.com/org/example/app/1.0/app-1.0.jar";

    #[test]
    fn test_cache_and_remove() {
        let cache = FailureCache::new(Duration::from_secs(60));
        assert!(!cache.has_failed_before(URL));

        cache.cache_failure(URL);
        assert!(cache.has_failed_before(URL));
        assert!(!cache.has_failed_before("https://repo.example.com/other.jar"));

        cache.remove_failure(URL);
        assert!(!cache.has_failed_before(URL));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let cache = FailureCache::new(Duration::from_millis(50));
        cache.cache_failure(URL);
        assert!(cache.has_failed_before(URL));

        std::thread::sleep(Duration::from_millis(80));
        assert!(!cache.has_failed_before(URL));
        // Lazy expiry dropped the entry
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_purge_expired() {
        let cache = FailureCache::new(Duration::from_millis(30));
        cache.cache_failure("a");
        cache.cache_failure("b");
        std::thread::sleep(Duration::from_millis(50));
        cache.cache_failure("c");

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.has_failed_before("c"));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(FailureCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let url = format!("https://repo/{}/{}", i, j);
                        cache.cache_failure(&url);
                        assert!(cache.has_failed_before(&url));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
