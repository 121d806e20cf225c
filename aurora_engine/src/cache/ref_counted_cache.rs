/// RefCountedCache - content-addressed arena with explicit reference counts
///
/// Values live in a SlotMap arena (`handle -> {value, refcount}`); a key index
/// maps normalized keys to arena handles. A key-index hit only counts if the
/// arena slot is still live: a handle invalidated out of band leaves a stale
/// index entry, which the next acquire detects and replaces.
///
/// Not thread-safe; callers serialize acquire/release.

use std::hash::Hash;

use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};

use crate::error::{Error, Result};

struct CacheSlot<K, V> {
    key: K,
    value: V,
    refcount: u32,
}

pub struct RefCountedCache<K, H: Key, V> {
    slots: SlotMap<H, CacheSlot<K, V>>,
    index: FxHashMap<K, H>,
    creations: u64,
}

impl<K, H, V> RefCountedCache<K, H, V>
where
    K: Eq + Hash + Clone,
    H: Key,
{
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            index: FxHashMap::default(),
            creations: 0,
        }
    }

    /// Return the live value for `key` (refcount + 1), or create it
    ///
    /// `create` runs only on a miss, including a stale hit. A failed creation
    /// leaves no entry behind.
    pub fn acquire_with<F>(&mut self, key: K, create: F) -> Result<H>
    where
        F: FnOnce(&K) -> Result<V>,
    {
        if let Some(&handle) = self.index.get(&key) {
            if let Some(slot) = self.slots.get_mut(handle) {
                slot.refcount += 1;
                return Ok(handle);
            }
            // stale: destroyed out of band
            self.index.remove(&key);
        }

        let value = create(&key)?;
        let handle = self.slots.insert(CacheSlot { key: key.clone(), value, refcount: 1 });
        self.index.insert(key, handle);
        self.creations += 1;
        Ok(handle)
    }

    /// Drop one reference
    ///
    /// Returns the evicted value when the count reaches zero, so the caller
    /// controls when its destructor runs.
    ///
    /// # Errors
    ///
    /// `Error::InvalidResource` if `handle` is not live.
    pub fn release(&mut self, handle: H) -> Result<Option<V>> {
        let slot = self
            .slots
            .get_mut(handle)
            .ok_or_else(|| Error::InvalidResource(format!("release of unknown cache handle {:?}", handle)))?;

        slot.refcount -= 1;
        if slot.refcount > 0 {
            return Ok(None);
        }

        Ok(self.evict(handle))
    }

    /// Destroy a value regardless of its reference count
    ///
    /// The key index is left untouched; the next acquire of the same key sees
    /// a dead handle and recreates.
    pub fn invalidate(&mut self, handle: H) -> Option<V> {
        self.slots.remove(handle).map(|slot| slot.value)
    }

    pub fn get(&self, handle: H) -> Option<&V> {
        self.slots.get(handle).map(|slot| &slot.value)
    }

    pub fn refcount(&self, handle: H) -> Option<u32> {
        self.slots.get(handle).map(|slot| slot.refcount)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.get(key).is_some_and(|&handle| self.slots.contains_key(handle))
    }

    /// Live values
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Successful creations since the cache was built
    pub fn creations(&self) -> u64 {
        self.creations
    }

    /// Remove every value, returning them for ordered destruction
    pub fn drain(&mut self) -> Vec<V> {
        self.index.clear();
        self.slots.drain().map(|(_, slot)| slot.value).collect()
    }

    fn evict(&mut self, handle: H) -> Option<V> {
        let slot = self.slots.remove(handle)?;
        if self.index.get(&slot.key) == Some(&handle) {
            self.index.remove(&slot.key);
        }
        Some(slot.value)
    }
}

impl<K, H, V> Default for RefCountedCache<K, H, V>
where
    K: Eq + Hash + Clone,
    H: Key,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "ref_counted_cache_tests.rs"]
mod tests;
