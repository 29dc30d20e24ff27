//! Ordered lookup from an entity key to its `EntityQueue` arena slot.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::arena::{arena_id, Arena, ArenaId};

/// Number of buckets servers are sharded across (spec §4.3). A crate
/// constant here, overridable per-instance via `ShardedKeyedIndex::new` for
/// tests that want to exercise collisions with a tiny cluster.
pub const DEFAULT_SERVER_BUCKET_COUNT: usize = 128;

/// Ordered map from an entity key to its queue, backed by an [`Arena`] so
/// handles stay stable across insert/remove.
#[derive(Debug)]
pub struct KeyedIndex<K: Ord, V, Id: ArenaId> {
    index: BTreeMap<K, Id>,
    arena: Arena<V, Id>,
}

impl<K: Ord + Clone, V, Id: ArenaId> Default for KeyedIndex<K, V, Id> {
    fn default() -> Self {
        Self {
            index: BTreeMap::new(),
            arena: Arena::new(),
        }
    }
}

impl<K: Ord + Clone, V, Id: ArenaId> KeyedIndex<K, V, Id> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_id(&self, key: &K) -> Option<Id> {
        self.index.get(key).copied()
    }

    #[must_use]
    pub fn get(&self, id: Id) -> Option<&V> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut V> {
        self.arena.get_mut(id)
    }

    /// Insert a freshly-created queue for `key`, returning its handle.
    pub fn insert(&mut self, key: K, value: V) -> Id {
        let id = self.arena.insert(value);
        self.index.insert(key, id);
        id
    }

    /// Remove the queue for `key`, dropping it from both the index and the
    /// arena.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let id = self.index.remove(key)?;
        self.arena.remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The first entry in key order, used for orderly shutdown traversal.
    pub fn first(&self) -> Option<(&K, Id)> {
        self.index.iter().next().map(|(k, id)| (k, *id))
    }
}

fn bucket_hash(key: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

arena_id!(
    /// Handle into one bucket's own arena. Never leaves this module — callers
    /// only ever see the bucket-qualified [`ShardedId`].
    BucketSlot
);

/// Handle into a [`ShardedKeyedIndex`], self-describing which bucket it lives
/// in so `get`/`get_mut` never need the key back (the `FairQueue` only ever
/// carries this handle, not the server name it was minted from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardedId {
    bucket: u16,
    slot: BucketSlot,
}

/// A `KeyedIndex` sharded across a fixed number of buckets by
/// `hash(key) % bucket_count`, reducing per-bucket tree depth and
/// contention (spec §4.3). Modeled on the same "spread one logical index
/// across buckets" idea as the consistent-hash ring in
/// `neuroquantum_cluster::sharding::ShardManager`, applied to a lookup
/// table instead of a replica-placement ring.
#[derive(Debug)]
pub struct ShardedKeyedIndex<K: Ord + Clone + AsRef<str>, V> {
    buckets: Vec<KeyedIndex<K, V, BucketSlot>>,
}

impl<K: Ord + Clone + AsRef<str>, V> ShardedKeyedIndex<K, V> {
    #[must_use]
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: (0..bucket_count).map(|_| KeyedIndex::new()).collect(),
        }
    }

    fn bucket_of(&self, key: &K) -> usize {
        (bucket_hash(key.as_ref()) % self.buckets.len() as u64) as usize
    }

    #[must_use]
    pub fn get_id(&self, key: &K) -> Option<ShardedId> {
        let bucket = self.bucket_of(key);
        self.buckets[bucket].get_id(key).map(|slot| ShardedId {
            bucket: bucket as u16,
            slot,
        })
    }

    #[must_use]
    pub fn get(&self, id: ShardedId) -> Option<&V> {
        self.buckets.get(id.bucket as usize)?.get(id.slot)
    }

    pub fn get_mut(&mut self, id: ShardedId) -> Option<&mut V> {
        self.buckets.get_mut(id.bucket as usize)?.get_mut(id.slot)
    }

    /// Insert a freshly-created queue for `key`, returning its handle.
    pub fn insert(&mut self, key: K, value: V) -> ShardedId {
        let bucket = self.bucket_of(&key);
        let slot = self.buckets[bucket].insert(key, value);
        ShardedId {
            bucket: bucket as u16,
            slot,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(KeyedIndex::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(KeyedIndex::is_empty)
    }

    /// First entry overall, in bucket order then key order, used for orderly
    /// shutdown traversal.
    pub fn first(&self) -> Option<ShardedId> {
        self.buckets.iter().enumerate().find_map(|(bucket, b)| {
            b.first().map(|(_, slot)| ShardedId {
                bucket: bucket as u16,
                slot,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::arena_id;

    arena_id!(TestId);

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut index: KeyedIndex<String, &str, TestId> = KeyedIndex::new();
        let id = index.insert("t1".to_string(), "queue-for-t1");
        assert_eq!(index.get_id(&"t1".to_string()), Some(id));
        assert_eq!(index.get(id), Some(&"queue-for-t1"));
        assert_eq!(index.remove(&"t1".to_string()), Some("queue-for-t1"));
        assert_eq!(index.get_id(&"t1".to_string()), None);
    }

    #[test]
    fn sharded_index_distributes_across_buckets() {
        let mut index: ShardedKeyedIndex<String, u32> = ShardedKeyedIndex::new(4);
        for i in 0..20u32 {
            index.insert(format!("server-{i}"), i);
        }
        assert_eq!(index.len(), 20);
        for i in 0..20u32 {
            let key = format!("server-{i}");
            let id = index.get_id(&key).unwrap();
            assert_eq!(index.get(id), Some(&i));
        }
    }

    #[test]
    fn sharded_get_and_get_mut_need_no_key() {
        let mut index: ShardedKeyedIndex<String, u32> = ShardedKeyedIndex::new(8);
        let id = index.insert("server-7".to_string(), 7);
        *index.get_mut(id).unwrap() += 1;
        assert_eq!(index.get(id), Some(&8));
    }

    #[test]
    fn default_bucket_count_matches_spec() {
        assert_eq!(DEFAULT_SERVER_BUCKET_COUNT, 128);
    }
}
