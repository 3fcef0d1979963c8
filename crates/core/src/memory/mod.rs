//! Process-local, capacity-bounded caches.
//!
//! [`BoundedCache`] is a plain LRU map. [`CompressingImageCache`] keeps the
//! same contract but stores decoded images zlib-compressed.
//!
//! Neither type is synchronised. Callers sharing one across threads wrap it
//! in a mutex.

pub mod compressed;

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Error;

pub use compressed::{ColorMode, CompressingImageCache, MapTile, PaletteImage, RawImage, RawPixels};

/// Default number of entries held by a bounded cache.
pub const DEFAULT_CAPACITY: usize = 32;

/// Access sequence shared by every cache in the process.
static ACCESS_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    ACCESS_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

struct Entry<V> {
    value: V,
    sequence: u64,
}

/// Fixed-capacity map evicting the least recently used key.
///
/// Every read or write stamps the key with a fresh sequence number, so
/// recency is a strict total order.
pub struct BoundedCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
    /// sequence -> key, oldest first.
    recency: BTreeMap<u64, K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns `Error::Capacity` if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::Capacity(capacity));
        }
        Ok(Self { capacity, entries: HashMap::new(), recency: BTreeMap::new() })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a key, marking it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.get_mut(key)?;
        let sequence = next_sequence();
        if let Some(owner) = self.recency.remove(&entry.sequence) {
            self.recency.insert(sequence, owner);
        }
        entry.sequence = sequence;
        Some(&entry.value)
    }

    /// Insert or overwrite a key, marking it most recently used.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry, which is returned.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        let sequence = next_sequence();

        if let Some(entry) = self.entries.get_mut(&key) {
            self.recency.remove(&entry.sequence);
            entry.value = value;
            entry.sequence = sequence;
            self.recency.insert(sequence, key);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity { self.evict_oldest() } else { None };

        self.recency.insert(sequence, key.clone());
        self.entries.insert(key, Entry { value, sequence });
        evicted
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Remove a key and its recency bookkeeping.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.sequence);
        Some(entry.value)
    }

    /// Keys currently held, least recently used first.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.recency.values()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn evict_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        tracing::trace!("evicted least recently used entry");
        Some((key, entry.value))
    }
}

impl<K, V> Default for BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY, entries: HashMap::new(), recency: BTreeMap::new() }
    }
}
