use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Errors from cache lookups.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache key not found: {0}")]
    KeyNotFound(String),
}

/// Keyed store for objects that are expensive to create and safe to share,
/// such as compiled shader modules and sampler states.
///
/// Owned by a renderer context and passed by reference; not thread safe.
#[derive(Debug)]
pub struct ResourceCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for ResourceCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Debug, V> ResourceCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Insert only when the key is absent. Returns whether the value was stored.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Result<&V, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.entries
            .get(key)
            .ok_or_else(|| CacheError::KeyNotFound(format!("{key:?}")))
    }

    /// Return the cached value, creating it on first use.
    pub fn get_or_insert_with(&mut self, key: K, create: impl FnOnce() -> V) -> &V {
        self.entries.entry(key).or_insert_with(|| {
            tracing::trace!("populating resource cache entry");
            create()
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_keeps_first_value() {
        let mut cache: ResourceCache<String, u32> = ResourceCache::new();
        assert!(cache.insert_if_absent("linear".into(), 1));
        assert!(!cache.insert_if_absent("linear".into(), 2));
        assert_eq!(*cache.get("linear").unwrap(), 1);
    }

    #[test]
    fn insert_replaces() {
        let mut cache: ResourceCache<&'static str, u32> = ResourceCache::new();
        cache.insert("sky", 1);
        cache.insert("sky", 2);
        assert_eq!(*cache.get("sky").unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_key_fails() {
        let cache: ResourceCache<String, u32> = ResourceCache::new();
        assert!(!cache.contains("voxel"));
        assert!(matches!(cache.get("voxel"), Err(CacheError::KeyNotFound(_))));
    }

    #[test]
    fn get_or_insert_with_creates_once() {
        let mut cache: ResourceCache<&'static str, u32> = ResourceCache::new();
        let mut created = 0;
        cache.get_or_insert_with("voxel", || {
            created += 1;
            10
        });
        let v = *cache.get_or_insert_with("voxel", || {
            created += 1;
            20
        });
        assert_eq!(v, 10);
        assert_eq!(created, 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
