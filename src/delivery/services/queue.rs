//! Bounded per-connection event queue and its single draining stream.

use crate::delivery::domain::{ConnectionId, Event, OverflowPolicy};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Default number of pending events per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Outcome of enqueuing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The event was queued without loss.
    Queued,
    /// The queue was full and its oldest event was evicted.
    DroppedOldest,
    /// The queue was full and the new event was discarded.
    DroppedNewest,
    /// The connection was removed; the event was discarded.
    Closed,
}

impl EnqueueOutcome {
    /// Returns whether the new event is now in the queue.
    #[must_use]
    pub const fn is_enqueued(self) -> bool {
        matches!(self, Self::Queued | Self::DroppedOldest)
    }

    /// Returns whether an event was lost to overflow.
    #[must_use]
    pub const fn is_overflow(self) -> bool {
        matches!(self, Self::DroppedOldest | Self::DroppedNewest)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    events: VecDeque<Event>,
    closed: bool,
}

/// Bounded FIFO owned by one connection entry.
#[derive(Debug)]
pub struct EventQueue {
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<QueueState>,
    ready: Notify,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Creates an empty queue; a zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let bounded = capacity.max(1);
        Self {
            capacity: bounded,
            policy,
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(bounded),
                closed: false,
            }),
            ready: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends an event, applying the overflow policy when full.
    pub fn push(&self, event: Event) -> EnqueueOutcome {
        let outcome = {
            let mut state = self.lock();
            if state.closed {
                return EnqueueOutcome::Closed;
            }
            if state.events.len() < self.capacity {
                state.events.push_back(event);
                EnqueueOutcome::Queued
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        state.events.pop_front();
                        state.events.push_back(event);
                        EnqueueOutcome::DroppedOldest
                    }
                    OverflowPolicy::DropNewest => EnqueueOutcome::DroppedNewest,
                }
            }
        };

        if outcome.is_overflow() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.is_enqueued() {
            self.ready.notify_one();
        }
        outcome
    }

    /// Closes the queue, discarding pending events and waking the consumer.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.events.clear();
        }
        self.ready.notify_one();
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Returns whether no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns how many events were lost to overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns whether the queue was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn pop(&self) -> Result<Option<Event>, QueueClosed> {
        let mut state = self.lock();
        match state.events.pop_front() {
            Some(event) => Ok(Some(event)),
            None if state.closed => Err(QueueClosed),
            None => Ok(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueClosed;

/// Receiving half handed to the transport loop serving one connection.
///
/// It is the only reader of its queue.
#[derive(Debug)]
pub struct EventStream {
    connection_id: ConnectionId,
    queue: Arc<EventQueue>,
}

impl EventStream {
    pub(super) const fn new(connection_id: ConnectionId, queue: Arc<EventQueue>) -> Self {
        Self {
            connection_id,
            queue,
        }
    }

    /// Returns the connection this stream drains.
    #[must_use]
    pub const fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Waits for the next event; `None` once the connection was removed.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.queue.pop() {
                Ok(Some(event)) => return Some(event),
                Err(QueueClosed) => return None,
                Ok(None) => self.queue.ready.notified().await,
            }
        }
    }

    /// Returns the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.queue.pop().ok().flatten()
    }

    /// Drains every pending event without waiting.
    pub fn drain_ready(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Returns how many events this connection lost to overflow.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.queue.dropped_count()
    }
}
