//! Producer and consumer endpoints bound to a ring's configured modes

use std::{cell::Cell, fmt, marker::PhantomData};

use super::{config::SyncMode, headtail::Behavior, queue::Ring};

/// Producer handle for enqueueing into a ring
///
/// Uses the ring's producer mode. Endpoints are `Send` but not `Sync`, so a
/// single-producer endpoint cannot be driven from two threads at once.
pub struct Producer<'a, T> {
    ring: &'a Ring<T>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a, T> Producer<'a, T> {
    pub(crate) fn new(ring: &'a Ring<T>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    /// Try to enqueue one item; a full ring returns it back
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        self.ring.enqueue_one(item, self.mode())
    }

    /// Enqueue all of `items` or nothing; returns the number moved
    pub fn enqueue_bulk(&self, items: &mut Vec<T>) -> usize {
        self.ring.enqueue_from(items, Behavior::Fixed, self.mode())
    }

    /// Enqueue the longest prefix of `items` that fits
    pub fn enqueue_burst(&self, items: &mut Vec<T>) -> usize {
        self.ring.enqueue_from(items, Behavior::Variable, self.mode())
    }

    pub fn ring(&self) -> &'a Ring<T> {
        self.ring
    }

    fn mode(&self) -> SyncMode {
        self.ring.producer_mode()
    }
}

impl<T> Drop for Producer<'_, T> {
    fn drop(&mut self) {
        self.ring.release_producer();
    }
}

impl<T> fmt::Debug for Producer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("ring", &self.ring.name())
            .field("mode", &self.mode())
            .finish()
    }
}

/// Consumer handle for dequeueing from a ring
pub struct Consumer<'a, T> {
    ring: &'a Ring<T>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'a, T> Consumer<'a, T> {
    pub(crate) fn new(ring: &'a Ring<T>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    /// Try to dequeue one item
    pub fn dequeue(&self) -> Option<T> {
        self.ring.dequeue_one(self.mode())
    }

    /// Dequeue exactly `n` items into `out`, or none
    pub fn dequeue_bulk(&self, out: &mut Vec<T>, n: usize) -> usize {
        self.ring.dequeue_into(out, n, Behavior::Fixed, self.mode())
    }

    /// Dequeue whatever is available, up to `n`
    pub fn dequeue_burst(&self, out: &mut Vec<T>, n: usize) -> usize {
        self.ring.dequeue_into(out, n, Behavior::Variable, self.mode())
    }

    pub fn ring(&self) -> &'a Ring<T> {
        self.ring
    }

    fn mode(&self) -> SyncMode {
        self.ring.consumer_mode()
    }
}

impl<T> Drop for Consumer<'_, T> {
    fn drop(&mut self) {
        self.ring.release_consumer();
    }
}

impl<T> fmt::Debug for Consumer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("ring", &self.ring.name())
            .field("mode", &self.mode())
            .finish()
    }
}
