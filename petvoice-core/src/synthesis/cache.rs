//! Bounded LRU cache of decoded clips.

use std::num::NonZeroUsize;
use std::time::Instant;

use lru::LruCache;

use crate::audio::AudioClip;

pub(crate) const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub(crate) clip: AudioClip,
    /// Refreshed on every hit.
    pub(crate) last_used: Instant,
}

/// Fixed-capacity clip cache. At capacity, inserting evicts exactly the
/// least recently used entry and hands it back so the caller can account
/// for it; dropping the entry releases the clip.
#[derive(Debug)]
pub(crate) struct ClipCache {
    entries: LruCache<String, CacheEntry>,
}

impl ClipCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a clip and mark it most recently used.
    pub(crate) fn get(&mut self, key: &str) -> Option<AudioClip> {
        let entry = self.entries.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(entry.clip.clone())
    }

    /// Insert or replace `key`. Returns the evicted entry, if any.
    pub(crate) fn insert(
        &mut self,
        key: String,
        clip: AudioClip,
    ) -> Option<(String, CacheEntry)> {
        let entry = CacheEntry {
            clip,
            last_used: Instant::now(),
        };
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = entry;
            return None;
        }
        self.entries.push(key, entry)
    }

    #[cfg(test)]
    fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Key that the next insertion at capacity would evict.
    #[cfg(test)]
    fn least_recent(&self) -> Option<&str> {
        self.entries.peek_lru().map(|(k, _)| k.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(tag: f32) -> AudioClip {
        AudioClip::new(vec![tag; 4], 16_000)
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let mut cache = ClipCache::new(DEFAULT_CAPACITY);
        for i in 0..20 {
            assert!(cache.insert(format!("v::{i}"), clip(i as f32)).is_none());
        }
        assert_eq!(cache.len(), 20);

        let (evicted, _) = cache.insert("v::20".into(), clip(20.0)).expect("eviction at capacity");
        assert_eq!(evicted, "v::0");
        assert_eq!(cache.len(), 20);
        assert!(!cache.contains("v::0"));
    }

    #[test]
    fn hit_refreshes_recency() {
        let mut cache = ClipCache::new(3);
        cache.insert("a".into(), clip(1.0));
        cache.insert("b".into(), clip(2.0));
        cache.insert("c".into(), clip(3.0));

        assert!(cache.get("a").is_some());
        assert_eq!(cache.least_recent(), Some("b"));

        let (evicted, _) = cache.insert("d".into(), clip(4.0)).expect("eviction");
        assert_eq!(evicted, "b");
        assert!(cache.contains("a"));
    }

    #[test]
    fn eviction_releases_clip() {
        let mut cache = ClipCache::new(1);
        let first = clip(1.0);
        cache.insert("a".into(), first.clone());
        assert_eq!(first.handle_count(), 2);

        let evicted = cache.insert("b".into(), clip(2.0));
        drop(evicted);
        assert_eq!(first.handle_count(), 1);
    }

    #[test]
    fn reinserting_same_key_does_not_evict() {
        let mut cache = ClipCache::new(2);
        cache.insert("a".into(), clip(1.0));
        cache.insert("b".into(), clip(2.0));
        assert!(cache.insert("a".into(), clip(9.0)).is_none());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").expect("present").samples()[0], 9.0);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let cache = ClipCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
