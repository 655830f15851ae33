//! Pull-based event buffer.
//!
//! Producers [`put`](EventBuffer::put) without ever blocking; a consumer reads
//! from a capacity-1 channel and calls [`load`](EventBuffer::load) after each
//! value to ask for the next one. Depending on [`EventMode`] the buffer keeps
//! only the freshest undelivered value or every value in arrival order.
//!
//! ```rust
//! use shardkit::EventBuffer;
//!
//! let events = EventBuffer::latest();
//! let rx = events.subscribe();
//!
//! events.put(1);
//! events.put(2);
//! events.put(3);
//! assert_eq!(rx.try_recv(), Ok(1));
//!
//! // Nothing more is delivered until the consumer asks for it.
//! assert!(rx.try_recv().is_err());
//! events.load();
//! assert_eq!(rx.try_recv(), Ok(3));
//! ```

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};

/// What an [`EventBuffer`] does with values the consumer has not taken yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMode {
    /// Keep only the most recent undelivered value; older ones are dropped.
    Latest,
    /// Keep every undelivered value, in arrival order.
    Backlog,
}

enum Pending<T> {
    Latest {
        value: Option<T>,
        /// Set by a `load` that found nothing to deliver.
        ready: bool,
    },
    Backlog(VecDeque<T>),
}

/// Single-consumer notification buffer with an explicit refill protocol.
///
/// After receiving a value from the channel returned by
/// [`subscribe`](Self::subscribe), the consumer must call
/// [`load`](Self::load) before anything else becomes visible on it. Skipping
/// `load` never blocks producers; it only stops deliveries.
pub struct EventBuffer<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    pending: Mutex<Pending<T>>,
    mode: EventMode,
}

impl<T> EventBuffer<T> {
    /// Buffer that keeps only the latest value, ready to deliver the first put.
    pub fn latest() -> Self {
        Self::latest_with_ready(true)
    }

    /// Buffer that keeps only the latest value.
    ///
    /// With `ready == false`, nothing is delivered until the first
    /// [`load`](Self::load).
    pub fn latest_with_ready(ready: bool) -> Self {
        Self::from_pending(EventMode::Latest, Pending::Latest { value: None, ready })
    }

    /// Buffer that keeps every undelivered value in order.
    pub fn backlog() -> Self {
        Self::from_pending(EventMode::Backlog, Pending::Backlog(VecDeque::new()))
    }

    /// Buffer in the given mode, with default settings for it.
    pub fn new(mode: EventMode) -> Self {
        match mode {
            EventMode::Latest => Self::latest(),
            EventMode::Backlog => Self::backlog(),
        }
    }

    fn from_pending(mode: EventMode, pending: Pending<T>) -> Self {
        let (tx, rx) = flume::bounded(1);
        debug!(?mode, "event buffer created");
        Self {
            tx,
            rx,
            pending: Mutex::new(pending),
            mode,
        }
    }

    /// The retention mode chosen at construction.
    pub fn mode(&self) -> EventMode {
        self.mode
    }

    /// Publish `value`. Never blocks and never fails.
    ///
    /// In latest mode the value replaces any undelivered one unless it can go
    /// straight to a waiting consumer. In backlog mode it goes straight to the
    /// channel only when nothing is queued ahead of it.
    pub fn put(&self, value: T) {
        let mut pending = self.pending.lock();
        match &mut *pending {
            Pending::Latest { value: slot, ready } => {
                if !*ready {
                    if slot.replace(value).is_some() {
                        trace!("overwrote undelivered event");
                    }
                    return;
                }
                match self.tx.try_send(value) {
                    Ok(()) => {
                        *ready = false;
                        *slot = None;
                    }
                    Err(err) => *slot = Some(err.into_inner()),
                }
            }
            Pending::Backlog(backlog) => {
                let value = if backlog.is_empty() {
                    match self.tx.try_send(value) {
                        Ok(()) => return,
                        Err(err) => err.into_inner(),
                    }
                } else {
                    value
                };
                backlog.push_back(value);
                trace!(backlog = backlog.len(), "event queued");
            }
        }
    }

    /// Move the next pending value into the channel, if there is room.
    ///
    /// Call once after every receive. Does nothing when the channel already
    /// holds a value or nothing is pending (in latest mode, the latter marks
    /// the consumer as ready so the next put is delivered directly).
    pub fn load(&self) {
        let mut pending = self.pending.lock();
        match &mut *pending {
            Pending::Latest { value: slot, ready } => match slot.take() {
                Some(value) => match self.tx.try_send(value) {
                    Ok(()) => *ready = false,
                    Err(err) => *slot = Some(err.into_inner()),
                },
                None => *ready = true,
            },
            Pending::Backlog(backlog) => {
                if let Some(value) = backlog.pop_front() {
                    if let Err(err) = self.tx.try_send(value) {
                        backlog.push_front(err.into_inner());
                    }
                }
            }
        }
    }

    /// The channel on which values are delivered.
    ///
    /// All subscribers share one channel; each value goes to exactly one of
    /// them. Use `recv_timeout` on it for bounded waits.
    pub fn subscribe(&self) -> Receiver<T> {
        self.rx.clone()
    }

    /// Number of values held back, not counting the one in the channel.
    pub fn pending_len(&self) -> usize {
        match &*self.pending.lock() {
            Pending::Latest { value, .. } => usize::from(value.is_some()),
            Pending::Backlog(backlog) => backlog.len(),
        }
    }
}

impl<T> fmt::Debug for EventBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("mode", &self.mode)
            .field("pending", &self.pending_len())
            .field("delivered", &self.tx.len())
            .finish()
    }
}
