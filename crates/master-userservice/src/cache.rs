use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// A capacity-bounded, TTL-expiring cache.
///
/// The teacher's workspace already pulls in `lru = "0.12"` but nothing in
/// the retrieved pack depends on a ready-made TTL-cache crate (checked
/// `other_examples/` and all five example repos — see DESIGN.md), so a
/// stored [`Instant`] is paired with each entry instead of reaching for an
/// unfamiliar dependency.
pub struct TtlCache<K, V> {
    inner: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns a fresh cached value, if any. A stale entry is treated as a
    /// miss but left in place; `put` will overwrite it.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().unwrap();
        let (value, inserted_at) = inner.get(key)?;
        if inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        self.inner.lock().unwrap().put(key, (value, Instant::now()));
    }

    pub fn invalidate(&self, key: &K) {
        self.inner.lock().unwrap().pop(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_fresh_entries() {
        let cache: TtlCache<u64, &'static str> = TtlCache::new(4, Duration::from_secs(60));
        cache.put(1, "alice");
        assert_eq!(cache.get(&1), Some("alice"));
    }

    #[test]
    fn expires_after_ttl() {
        let cache: TtlCache<u64, &'static str> = TtlCache::new(4, Duration::from_millis(10));
        cache.put(1, "alice");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache: TtlCache<u64, &'static str> = TtlCache::new(4, Duration::from_secs(60));
        cache.put(1, "alice");
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }
}
