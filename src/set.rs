//! Lock-free ordered set.
//!
//! A sorted singly-linked list in the style of Harris: removal first marks a
//! node's outgoing link (logical deletion), then tries to unlink it. Any
//! traversal that meets a marked node helps finish the unlink. Unlinked nodes
//! are reclaimed through `crossbeam-epoch`, so a node is freed only after every
//! thread that could still be reading it has moved on.

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use std::cmp::Ordering as KeyOrdering;
use std::fmt;
use std::sync::atomic::{AtomicIsize, Ordering};

/// Tag bit on a node's `next` link meaning "this node is deleted".
const MARKED: usize = 1;

struct Node<T, K> {
    key: K,
    item: T,
    next: Atomic<Node<T, K>>,
}

/// Insertion point for a key: `curr` is the first live node with a key not
/// less than the target, and `pred` is the link that points at it.
struct Window<'g, T, K> {
    pred: &'g Atomic<Node<T, K>>,
    curr: Shared<'g, Node<T, K>>,
    found: bool,
}

/// Lock-free set of items kept in ascending order of a derived key.
///
/// Items are ordered (and deduplicated) by the key `F` extracts from them.
/// All operations are lock-free: a thread that loses a race retries, and some
/// thread always makes progress.
///
/// # Example
///
/// ```rust
/// use shardkit::LockFreeSet;
///
/// let set = LockFreeSet::new();
/// assert!(set.add(3));
/// assert!(set.add(1));
/// assert!(!set.add(3));
/// assert!(set.contains(&1));
/// assert!(set.remove(&1));
/// assert_eq!(set.to_vec(), vec![3]);
/// ```
pub struct LockFreeSet<T, K = T, F = fn(&T) -> K> {
    head: Atomic<Node<T, K>>,
    key_fn: F,
    len: AtomicIsize,
}

impl<T> LockFreeSet<T>
where
    T: Ord + Clone + Send + 'static,
{
    /// Create an empty set ordered by the items themselves.
    pub fn new() -> Self {
        let key_fn: fn(&T) -> T = T::clone;
        Self::with_key(key_fn)
    }
}

impl<T> Default for LockFreeSet<T>
where
    T: Ord + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K, F> LockFreeSet<T, K, F>
where
    T: Send + 'static,
    K: Ord + Send + 'static,
    F: Fn(&T) -> K,
{
    /// Create an empty set ordered by `key_fn(item)`.
    ///
    /// ```rust
    /// use shardkit::LockFreeSet;
    ///
    /// #[derive(Clone)]
    /// struct Job { id: u64, name: &'static str }
    ///
    /// let jobs = LockFreeSet::with_key(|job: &Job| job.id);
    /// jobs.add(Job { id: 7, name: "flush" });
    /// assert!(jobs.contains(&Job { id: 7, name: "other" }));
    /// ```
    pub fn with_key(key_fn: F) -> Self {
        Self {
            head: Atomic::null(),
            key_fn,
            len: AtomicIsize::new(0),
        }
    }

    /// Locate the window for `key`, unlinking marked nodes on the way.
    ///
    /// A failed unlink means `pred` changed under us; the walk restarts from
    /// the head instead of trusting the stale position.
    fn find<'g>(&'g self, key: &K, guard: &'g Guard) -> Window<'g, T, K> {
        'retry: loop {
            let mut pred = &self.head;
            let mut curr = pred.load(Ordering::Acquire, guard);

            loop {
                // SAFETY: nodes reachable under a pinned guard are not freed.
                let node = match unsafe { curr.as_ref() } {
                    Some(node) => node,
                    None => {
                        return Window {
                            pred,
                            curr,
                            found: false,
                        }
                    }
                };
                let succ = node.next.load(Ordering::Acquire, guard);

                if succ.tag() == MARKED {
                    let succ = succ.with_tag(0);
                    match pred.compare_exchange(
                        curr,
                        succ,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            // SAFETY: this CAS is the unique unlink of `curr`.
                            unsafe { guard.defer_destroy(curr) };
                            curr = succ;
                            continue;
                        }
                        Err(_) => continue 'retry,
                    }
                }

                if node.key >= *key {
                    return Window {
                        pred,
                        curr,
                        found: node.key == *key,
                    };
                }
                pred = &node.next;
                curr = succ;
            }
        }
    }

    /// Insert `item`. Returns `false` if an item with the same key is present.
    pub fn add(&self, item: T) -> bool {
        let key = (self.key_fn)(&item);
        let guard = &epoch::pin();
        let mut node = Owned::new(Node {
            key,
            item,
            next: Atomic::null(),
        });

        loop {
            let window = self.find(&node.key, guard);
            if window.found {
                return false;
            }
            node.next.store(window.curr, Ordering::Relaxed);
            match window.pred.compare_exchange(
                window.curr,
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(err) => node = err.new,
            }
        }
    }

    /// Remove the item with `item`'s key. Returns `false` if none was present.
    ///
    /// The removal takes effect when the node's link is marked; unlinking it
    /// afterwards is best-effort and otherwise done by a later traversal.
    pub fn remove(&self, item: &T) -> bool {
        let key = (self.key_fn)(item);
        let guard = &epoch::pin();

        loop {
            let window = self.find(&key, guard);
            if !window.found {
                return false;
            }
            // SAFETY: `found` implies `curr` is non-null and protected by `guard`.
            let node = unsafe { window.curr.deref() };
            let succ = node.next.load(Ordering::Acquire, guard);
            if succ.tag() == MARKED {
                continue;
            }
            if node
                .next
                .compare_exchange(
                    succ,
                    succ.with_tag(MARKED),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                )
                .is_err()
            {
                continue;
            }
            self.len.fetch_sub(1, Ordering::Relaxed);

            if window
                .pred
                .compare_exchange(
                    window.curr,
                    succ,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                )
                .is_ok()
            {
                // SAFETY: this CAS is the unique unlink of `curr`.
                unsafe { guard.defer_destroy(window.curr) };
            }
            return true;
        }
    }

    /// Check for a live item with `item`'s key. Never modifies the list.
    pub fn contains(&self, item: &T) -> bool {
        let key = (self.key_fn)(item);
        let guard = &epoch::pin();
        let mut curr = self.head.load(Ordering::Acquire, guard);

        // SAFETY: nodes reachable under a pinned guard are not freed.
        while let Some(node) = unsafe { curr.as_ref() } {
            let succ = node.next.load(Ordering::Acquire, guard);
            match node.key.cmp(&key) {
                KeyOrdering::Less => curr = succ,
                KeyOrdering::Equal => return succ.tag() != MARKED,
                KeyOrdering::Greater => return false,
            }
        }
        false
    }

    /// Number of live items. Exact when no operation is in flight.
    pub fn len(&self) -> usize {
        // A remove can be counted before the matching add is.
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    /// Whether the set holds no live items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone the live items in ascending key order.
    ///
    /// One traversal under a single guard; items added or removed while it
    /// runs may or may not appear.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let guard = &epoch::pin();
        let mut items = Vec::with_capacity(self.len());
        let mut curr = self.head.load(Ordering::Acquire, guard);

        // SAFETY: nodes reachable under a pinned guard are not freed.
        while let Some(node) = unsafe { curr.as_ref() } {
            let succ = node.next.load(Ordering::Acquire, guard);
            if succ.tag() != MARKED {
                items.push(node.item.clone());
            }
            curr = succ;
        }
        items
    }
}

impl<T, K, F> Drop for LockFreeSet<T, K, F> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread can reach the list.
        unsafe {
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Ordering::Relaxed, guard);
            while !curr.is_null() {
                let succ = curr.deref().next.load(Ordering::Relaxed, guard);
                drop(curr.into_owned());
                curr = succ.with_tag(0);
            }
        }
    }
}

impl<T, K, F> fmt::Debug for LockFreeSet<T, K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeSet")
            .field("len", &self.len.load(Ordering::Relaxed).max(0))
            .finish_non_exhaustive()
    }
}
