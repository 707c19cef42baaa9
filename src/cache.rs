use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// In-memory key/value cache with per-entry expiry.
///
/// Expired entries are dropped on lookup and swept on every insert, so the
/// map never outgrows the live set by more than one TTL window.
pub struct TtlCache<V> {
    entries: HashMap<String, Entry<V>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let ttl = self.default_ttl;
        self.insert_at(key, value, ttl, Utc::now());
    }

    pub fn insert_at(&mut self, key: impl Into<String>, value: V, ttl: Duration, now: DateTime<Utc>) {
        self.purge_expired(now);
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.expires_at);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_before_expiry() {
        let now = Utc::now();
        let mut cache = TtlCache::new(Duration::seconds(300));
        cache.insert_at("prompt", "answer".to_string(), Duration::seconds(10), now);

        assert_eq!(cache.get_at("prompt", now + Duration::seconds(9)), Some("answer".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let now = Utc::now();
        let mut cache = TtlCache::new(Duration::seconds(300));
        cache.insert_at("prompt", 1u32, Duration::seconds(10), now);

        assert_eq!(cache.get_at("prompt", now + Duration::seconds(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let now = Utc::now();
        let mut cache = TtlCache::new(Duration::seconds(300));
        cache.insert_at("short", 1u32, Duration::seconds(1), now);
        cache.insert_at("long", 2u32, Duration::seconds(100), now);

        assert_eq!(cache.purge_expired(now + Duration::seconds(5)), 1);
        assert_eq!(cache.get_at("long", now + Duration::seconds(5)), Some(2));
    }

    #[test]
    fn test_default_ttl_and_remove() {
        let mut cache = TtlCache::new(Duration::seconds(300));
        cache.insert("k", 5u32);
        assert_eq!(cache.get("k"), Some(5));
        assert_eq!(cache.remove("k"), Some(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_insert_sweeps_other_expired_keys() {
        let now = Utc::now();
        let mut cache = TtlCache::new(Duration::seconds(300));
        cache.insert_at("first prompt", 1u32, Duration::seconds(10), now);
        cache.insert_at("second prompt", 2u32, Duration::seconds(10), now + Duration::seconds(5));
        assert_eq!(cache.len(), 2);

        cache.insert_at("third prompt", 3u32, Duration::seconds(10), now + Duration::seconds(11));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("first prompt", now + Duration::seconds(11)), None);
        assert_eq!(cache.get_at("second prompt", now + Duration::seconds(11)), Some(2));
    }
}
