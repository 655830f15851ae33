//! Lock-free unbounded FIFO queue.
//!
//! Michael–Scott queue over a dummy head node. An enqueue first links its node
//! onto the last node's `next` and only then swings `tail`, helping a lagging
//! tail forward when it sees one, so any number of producers and consumers may
//! run at once. Nodes retired by dequeue are reclaimed through
//! `crossbeam-epoch`.

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::thread;

struct Node<T> {
    /// Uninitialized in the dummy node; moved out exactly once otherwise.
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn dummy() -> Self {
        Self {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }
}

/// Unbounded multi-producer multi-consumer lock-free queue.
///
/// # Example
///
/// ```rust
/// use shardkit::LockFreeQueue;
///
/// let queue = LockFreeQueue::new();
/// assert_eq!(queue.dequeue(), None);
/// queue.enqueue(0);
/// queue.enqueue(1);
/// assert_eq!(queue.dequeue(), Some(0));
/// assert_eq!(queue.dequeue(), Some(1));
/// assert_eq!(queue.dequeue(), None);
/// ```
pub struct LockFreeQueue<T> {
    head: Atomic<Node<T>>,
    tail: Atomic<Node<T>>,
    len: AtomicIsize,
}

unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        // SAFETY: the dummy is not shared with anyone yet.
        let dummy = Owned::new(Node::dummy()).into_shared(unsafe { epoch::unprotected() });
        Self {
            head: Atomic::from(dummy),
            tail: Atomic::from(dummy),
            len: AtomicIsize::new(0),
        }
    }

    /// Append `value` at the tail. Never fails and never blocks.
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let mut node = Owned::new(Node {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        });

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: `tail` is never null and is protected by `guard`.
            let last = unsafe { tail.deref() };
            let next = last.next.load(Ordering::Acquire, guard);

            if !next.is_null() {
                // Tail is lagging behind; help it along and look again.
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                continue;
            }

            match last.next.compare_exchange(
                Shared::null(),
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(new) => {
                    let _ = self.tail.compare_exchange(
                        tail,
                        new,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(err) => {
                    node = err.new;
                    thread::yield_now();
                }
            }
        }
    }

    /// Take the value at the head, or `None` if the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            // SAFETY: `head` is never null and is protected by `guard`.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
            // SAFETY: as above for any node reachable from `head`.
            let first = unsafe { next.as_ref() }?;

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // Keep tail from pointing at the node we are about to retire.
                let tail = self.tail.load(Ordering::Relaxed, guard);
                if tail == head {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::Release,
                        Ordering::Relaxed,
                        guard,
                    );
                }
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: winning the head CAS makes us the only reader of
                // `first.value`, and `first` is now the dummy, whose value is
                // never read or dropped again. The old head is unreachable.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(first.value.assume_init_read());
                }
            }
            thread::yield_now();
        }
    }

    /// Approximate number of queued values. Exact when no operation is in flight.
    pub fn len(&self) -> usize {
        // A dequeue can be counted before the matching enqueue is.
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    /// Whether the queue currently has no values.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: `head` is never null and is protected by `guard`.
        unsafe { head.deref() }
            .next
            .load(Ordering::Acquire, guard)
            .is_null()
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
        // SAFETY: `&mut self` means no other thread can reach the dummy.
        unsafe {
            let guard = epoch::unprotected();
            let dummy = self.head.load(Ordering::Relaxed, guard);
            drop(dummy.into_owned());
        }
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
