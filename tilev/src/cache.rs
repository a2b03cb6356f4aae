//! Bounded LRU cache of decoded tiles.

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::trace;

use crate::tile::TileData;

/// Cache key: the expanded tile URL.
///
/// The URL already encodes column, row and zoom, so two requests for the same
/// tile of the same template always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey(String);

impl TileKey {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Least-recently-used tile cache.
///
/// A capacity of zero disables caching: `get` always misses and `put` drops
/// the tile.
#[derive(Debug)]
pub struct TileCache {
    capacity: usize,
    // None when capacity is zero
    entries: Option<LruCache<TileKey, TileData>>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Look up a tile, refreshing its recency on a hit.
    pub fn get(&mut self, key: &TileKey) -> Option<TileData> {
        self.entries.as_mut()?.get(key).cloned()
    }

    /// Whether a tile is cached, without touching its recency.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains(key))
    }

    /// Insert or overwrite a tile, evicting the least recently used one when
    /// full.
    pub fn put(&mut self, key: TileKey, data: TileData) {
        let Some(entries) = self.entries.as_mut() else {
            return;
        };
        let inserted = key.clone();
        if let Some((evicted, _)) = entries.push(key, data) {
            // `push` also hands back the old value of an overwritten key
            if evicted != inserted {
                trace!(key = %evicted, "evicting tile");
            }
        }
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> TileKey {
        TileKey::new(name)
    }

    fn tile(value: f32) -> TileData {
        TileData::new(2, vec![value; 4]).unwrap()
    }

    #[test]
    fn test_get_and_put() {
        let mut cache = TileCache::new(2);
        assert!(cache.get(&key("a")).is_none());

        let data = tile(1.0);
        cache.put(key("a"), data.clone());
        let cached = cache.get(&key("a")).unwrap();
        assert!(cached.ptr_eq(&data));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = TileCache::new(2);
        cache.put(key("a"), tile(1.0));
        cache.put(key("b"), tile(2.0));
        cache.put(key("c"), tile(3.0));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = TileCache::new(2);
        cache.put(key("a"), tile(1.0));
        cache.put(key("b"), tile(2.0));

        // Touch "a" so that "b" becomes the oldest
        assert!(cache.get(&key("a")).is_some());
        cache.put(key("c"), tile(3.0));

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let mut cache = TileCache::new(2);
        cache.put(key("a"), tile(1.0));
        cache.put(key("b"), tile(2.0));
        cache.put(key("a"), tile(5.0));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("a")).unwrap().get(0, 0), 5.0);

        // Overwriting refreshed "a", so "b" is evicted next
        cache.put(key("c"), tile(3.0));
        assert!(!cache.contains(&key("b")));
    }

    #[test]
    fn test_contains_does_not_refresh_recency() {
        let mut cache = TileCache::new(2);
        cache.put(key("a"), tile(1.0));
        cache.put(key("b"), tile(2.0));

        assert!(cache.contains(&key("a")));
        cache.put(key("c"), tile(3.0));

        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
    }

    #[test]
    fn test_overwrite_at_capacity_keeps_other_entries() {
        let mut cache = TileCache::new(1);
        cache.put(key("a"), tile(1.0));
        cache.put(key("a"), tile(2.0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a")).unwrap().get(0, 0), 2.0);
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let mut cache = TileCache::new(0);
        cache.put(key("a"), tile(1.0));
        assert!(cache.is_empty());
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut cache = TileCache::new(3);
        for i in 0..50 {
            cache.put(key(&format!("tile-{:02}", i)), tile(i as f32));
            assert!(cache.len() <= 3);
        }
        assert!(cache.contains(&key("tile-49")));
        assert!(cache.contains(&key("tile-47")));
        assert!(!cache.contains(&key("tile-46")));
        assert_eq!(cache.capacity(), 3);
    }
}
