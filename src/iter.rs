use crate::shard::Shard;
use std::slice;
use std::sync::Arc;
use std::vec;

type Entry<K, V> = (K, Arc<V>);

/// Copy one shard's entries under its read lock.
fn copy_shard<K: Clone, V>(shard: &Shard<K, V>) -> Vec<Entry<K, V>> {
    shard
        .read_lock()
        .iter()
        .map(|(k, v)| (k.clone(), Arc::clone(v)))
        .collect()
}

/// Iterator over a copy of the whole map taken when it was created.
///
/// Shards are copied one after another, each under its own read lock, and no
/// lock is held while the iterator is consumed. Writes that land after a
/// shard was copied are not observed.
pub struct SnapshotIter<K, V> {
    entries: vec::IntoIter<Entry<K, V>>,
}

impl<K: Clone, V> SnapshotIter<K, V> {
    pub(crate) fn new(shards: &[Shard<K, V>]) -> Self {
        let entries: Vec<_> = shards.iter().flat_map(copy_shard).collect();
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl<K, V> Iterator for SnapshotIter<K, V> {
    type Item = Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for SnapshotIter<K, V> {}

/// Iterator that copies the next shard only once the current one is drained.
///
/// Shards not yet reached reflect writes made during iteration.
pub struct ConcurrentIter<'a, K, V> {
    remaining: slice::Iter<'a, Shard<K, V>>,
    current: vec::IntoIter<Entry<K, V>>,
}

impl<'a, K: Clone, V> ConcurrentIter<'a, K, V> {
    pub(crate) fn new(shards: &'a [Shard<K, V>]) -> Self {
        Self {
            remaining: shards.iter(),
            current: Vec::new().into_iter(),
        }
    }
}

impl<K: Clone, V> Iterator for ConcurrentIter<'_, K, V> {
    type Item = Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            // Empty shards just loop around.
            self.current = copy_shard(self.remaining.next()?).into_iter();
        }
    }
}
