//! Process-local time-based cache.
//!
//! Used by the Parameter Store wrapper to avoid re-reading configuration
//! values on every call. Entries expire after a fixed time-to-live and are
//! evicted lazily on access; writes through the owning wrapper invalidate the
//! corresponding entry.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<V> {
    expires_at: Instant,
    value: V,
}

/// A time-based cache keyed by `K`, safe to share across threads.
///
/// ```rust
/// use aws_clients::common::cache::TimedCache;
/// use std::time::Duration;
///
/// let cache: TimedCache<String, String> = TimedCache::new(Duration::from_secs(60));
/// cache.insert("key".to_string(), "value".to_string());
/// assert_eq!(cache.get("key"), Some("value".to_string()));
/// ```
#[derive(Debug)]
pub struct TimedCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    time_to_live: Duration,
}

impl<K: Eq + Hash, V: Clone> TimedCache<K, V> {
    /// Create an empty cache whose entries live for `time_to_live`.
    pub fn new(time_to_live: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            time_to_live,
        }
    }

    /// Return a clone of the fresh value for `key`, evicting it when expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: K, value: V) {
        let expires_at = Instant::now() + self.time_to_live;
        self.entries
            .lock()
            .unwrap()
            .insert(key, Entry { expires_at, value });
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entry_hits() {
        let cache = TimedCache::new(Duration::from_secs(60));
        cache.insert("key".to_string(), 1);
        assert_eq!(cache.get("key"), Some(1));
    }

    #[test]
    fn test_expired_entry_misses_and_is_evicted() {
        let cache = TimedCache::new(Duration::ZERO);
        cache.insert("key".to_string(), 1);
        assert_eq!(cache.get("key"), None);
        assert!(cache.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_insert_replaces_previous_value() {
        let cache = TimedCache::new(Duration::from_secs(60));
        cache.insert("key".to_string(), 1);
        cache.insert("key".to_string(), 2);
        assert_eq!(cache.get("key"), Some(2));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = TimedCache::new(Duration::from_secs(60));
        cache.insert("key".to_string(), 1);
        cache.invalidate("key");
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn test_missing_key_misses() {
        let cache: TimedCache<String, i32> = TimedCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("key"), None);
    }
}
