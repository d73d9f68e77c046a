//! Bounded lock-free ring of opaque handles

use std::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_utils::CachePadded;

use crate::error::{MbufError, Result};

use super::{
    config::{RingConfig, SyncMode},
    endpoint::{Consumer, Producer},
    headtail::{Behavior, HeadTail},
};

/// Lock-free bounded ring with single/multi producer and consumer modes
///
/// Entries are moved in and out by value. A full ring hands the item back
/// (`Err(item)`), an empty ring returns `None`; nothing here ever waits for
/// space or data.
pub struct Ring<T> {
    name: String,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Storage slots (power of 2)
    size: u32,
    mask: u32,
    /// Usable entries, `<= size`
    capacity: u32,
    producer_mode: SyncMode,
    consumer_mode: SyncMode,
    prod: CachePadded<HeadTail>,
    cons: CachePadded<HeadTail>,
    /// Live endpoints per side
    producers: AtomicUsize,
    consumers: AtomicUsize,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    /// Create a new ring from a configuration
    pub fn new(config: RingConfig) -> Result<Self> {
        config.validate()?;

        let size = config.storage_size();
        let slots = (0..size)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::debug!(
            "Created ring {}: capacity {}, size {}, {}-producer/{}-consumer",
            config.name,
            config.capacity,
            size,
            config.producer.name(),
            config.consumer.name(),
        );

        Ok(Self {
            name: config.name,
            slots,
            size: size as u32,
            mask: (size - 1) as u32,
            capacity: config.capacity as u32,
            producer_mode: config.producer,
            consumer_mode: config.consumer,
            prod: CachePadded::new(HeadTail::new()),
            cons: CachePadded::new(HeadTail::new()),
            producers: AtomicUsize::new(0),
            consumers: AtomicUsize::new(0),
        })
    }

    /// Create a multi-producer multi-consumer ring
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Result<Self> {
        Self::new(RingConfig::new(name, capacity))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the storage (NOT the usable space)
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Number of entries the ring can hold
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn producer_mode(&self) -> SyncMode {
        self.producer_mode
    }

    pub fn consumer_mode(&self) -> SyncMode {
        self.consumer_mode
    }

    /// Number of entries in the ring (snapshot)
    pub fn count(&self) -> usize {
        // Consumer tail first: it never overtakes a later producer tail read.
        let cons_tail = self.cons.tail();
        let prod_tail = self.prod.tail();
        let count = prod_tail.wrapping_sub(cons_tail);
        count.min(self.capacity) as usize
    }

    /// Number of free entries (snapshot)
    pub fn free_count(&self) -> usize {
        self.capacity() - self.count()
    }

    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Enqueue one item, safe with concurrent producers
    ///
    /// On a single-producer ring the call holds the producer side for its
    /// duration; while a [`Producer`] endpoint or another call holds it, the
    /// item comes straight back.
    pub fn mp_enqueue(&self, item: T) -> std::result::Result<(), T> {
        match self.hold_producer() {
            Some(side) => self.enqueue_one(item, side.mode),
            None => Err(item),
        }
    }

    /// Enqueue one item without producer synchronization
    ///
    /// # Safety
    /// No other thread may enqueue on this ring while the call runs.
    pub unsafe fn sp_enqueue(&self, item: T) -> std::result::Result<(), T> {
        self.enqueue_one(item, SyncMode::Single)
    }

    /// Dequeue one item, safe with concurrent consumers
    ///
    /// On a single-consumer ring this returns `None` while a [`Consumer`]
    /// endpoint is live.
    pub fn mc_dequeue(&self) -> Option<T> {
        let side = self.hold_consumer()?;
        self.dequeue_one(side.mode)
    }

    /// Dequeue one item without consumer synchronization
    ///
    /// # Safety
    /// No other thread may dequeue from this ring while the call runs.
    pub unsafe fn sc_dequeue(&self) -> Option<T> {
        self.dequeue_one(SyncMode::Single)
    }

    /// Enqueue every item of `items` or none of them; returns the number moved
    pub fn mp_enqueue_bulk(&self, items: &mut Vec<T>) -> usize {
        match self.hold_producer() {
            Some(side) => self.enqueue_from(items, Behavior::Fixed, side.mode),
            None => 0,
        }
    }

    /// Enqueue as many items as fit, from the front of `items`
    pub fn mp_enqueue_burst(&self, items: &mut Vec<T>) -> usize {
        match self.hold_producer() {
            Some(side) => self.enqueue_from(items, Behavior::Variable, side.mode),
            None => 0,
        }
    }

    /// Dequeue exactly `n` items into `out`, or none
    pub fn mc_dequeue_bulk(&self, out: &mut Vec<T>, n: usize) -> usize {
        match self.hold_consumer() {
            Some(side) => self.dequeue_into(out, n, Behavior::Fixed, side.mode),
            None => 0,
        }
    }

    /// Dequeue up to `n` items into `out`
    pub fn mc_dequeue_burst(&self, out: &mut Vec<T>, n: usize) -> usize {
        match self.hold_consumer() {
            Some(side) => self.dequeue_into(out, n, Behavior::Variable, side.mode),
            None => 0,
        }
    }

    fn hold_producer(&self) -> Option<SideHold<'_>> {
        SideHold::acquire(&self.producers, self.producer_mode)
    }

    fn hold_consumer(&self) -> Option<SideHold<'_>> {
        SideHold::acquire(&self.consumers, self.consumer_mode)
    }

    /// Create a producer endpoint using the configured producer mode
    ///
    /// A single-producer ring hands out one live producer at a time.
    pub fn producer(&self) -> Result<Producer<'_, T>> {
        claim(&self.producers, self.producer_mode, &self.name, "producer")?;
        Ok(Producer::new(self))
    }

    /// Create a consumer endpoint using the configured consumer mode
    pub fn consumer(&self) -> Result<Consumer<'_, T>> {
        claim(&self.consumers, self.consumer_mode, &self.name, "consumer")?;
        Ok(Consumer::new(self))
    }

    pub(crate) fn release_producer(&self) {
        self.producers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn release_consumer(&self) {
        self.consumers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn enqueue_one(&self, item: T, mode: SyncMode) -> std::result::Result<(), T> {
        let capacity = self.capacity;
        let reservation = self.prod.reserve(&self.cons, 1, Behavior::Fixed, mode, |head, cons_tail| {
            capacity.wrapping_add(cons_tail).wrapping_sub(head)
        });

        match reservation {
            Some(r) => {
                unsafe { self.write_slot(r.old_head, item) };
                self.prod.publish(&r, mode);
                Ok(())
            }
            None => Err(item),
        }
    }

    pub(crate) fn dequeue_one(&self, mode: SyncMode) -> Option<T> {
        let r = self.cons.reserve(&self.prod, 1, Behavior::Fixed, mode, |head, prod_tail| {
            prod_tail.wrapping_sub(head)
        })?;

        let item = unsafe { self.read_slot(r.old_head) };
        self.cons.publish(&r, mode);
        Some(item)
    }

    /// Move entries from the front of `items` into the ring
    pub(crate) fn enqueue_from(&self, items: &mut Vec<T>, behavior: Behavior, mode: SyncMode) -> usize {
        if items.is_empty() {
            return 0;
        }

        let capacity = self.capacity;
        let requested = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let reservation = self.prod.reserve(&self.cons, requested, behavior, mode, |head, cons_tail| {
            capacity.wrapping_add(cons_tail).wrapping_sub(head)
        });

        let Some(r) = reservation else {
            return 0;
        };

        let n = r.len() as usize;
        for (i, item) in items.drain(..n).enumerate() {
            unsafe { self.write_slot(r.old_head.wrapping_add(i as u32), item) };
        }
        self.prod.publish(&r, mode);

        n
    }

    /// Append up to `n` entries to `out`
    pub(crate) fn dequeue_into(
        &self,
        out: &mut Vec<T>,
        n: usize,
        behavior: Behavior,
        mode: SyncMode,
    ) -> usize {
        if n == 0 {
            return 0;
        }

        let requested = u32::try_from(n).unwrap_or(u32::MAX);
        let reservation = self.cons.reserve(&self.prod, requested, behavior, mode, |head, prod_tail| {
            prod_tail.wrapping_sub(head)
        });

        let Some(r) = reservation else {
            return 0;
        };

        let n = r.len();
        out.reserve(n as usize);
        for i in 0..n {
            out.push(unsafe { self.read_slot(r.old_head.wrapping_add(i)) });
        }
        self.cons.publish(&r, mode);

        n as usize
    }

    /// # Safety
    /// `index` must be inside a producer reservation held by the caller.
    unsafe fn write_slot(&self, index: u32, item: T) {
        let slot = self.slots.get_unchecked((index & self.mask) as usize);
        (*slot.get()).write(item);
    }

    /// # Safety
    /// `index` must be inside a consumer reservation held by the caller, so the
    /// slot was written and published and is read exactly once.
    unsafe fn read_slot(&self, index: u32) -> T {
        let slot = self.slots.get_unchecked((index & self.mask) as usize);
        (*slot.get()).assume_init_read()
    }
}

fn claim(live: &AtomicUsize, mode: SyncMode, ring: &str, side: &str) -> Result<()> {
    match mode {
        SyncMode::Multi => {
            live.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }
        SyncMode::Single => live
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                MbufError::concurrency(format!(
                    "ring {} is single-{} and already has a live {}",
                    ring, side, side
                ))
            }),
    }
}

/// One side of a ring held for a single ring-level call
///
/// A multi side needs no hold. A single side is taken the same way an
/// endpoint takes it, so the call and any endpoint never overlap.
struct SideHold<'a> {
    live: Option<&'a AtomicUsize>,
    mode: SyncMode,
}

impl<'a> SideHold<'a> {
    fn acquire(live: &'a AtomicUsize, mode: SyncMode) -> Option<Self> {
        match mode {
            SyncMode::Multi => Some(Self { live: None, mode }),
            SyncMode::Single => live
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .ok()
                .map(|_| Self {
                    live: Some(live),
                    mode,
                }),
        }
    }
}

impl Drop for SideHold<'_> {
    fn drop(&mut self) {
        if let Some(live) = self.live {
            live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let mut pos = self.cons.tail();
        let end = self.prod.tail();
        let remaining = end.wrapping_sub(pos);

        while pos != end {
            unsafe { drop(self.read_slot(pos)) };
            pos = pos.wrapping_add(1);
        }

        log::debug!("Dropping ring {} ({} entries left)", self.name, remaining);
    }
}

impl<T> fmt::Debug for Ring<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("name", &self.name)
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("count", &self.count())
            .field("free_count", &self.free_count())
            .field("is_full", &self.is_full())
            .field("is_empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
impl<T> Ring<T> {
    /// Start both sides at `pos` to exercise index wrap-around.
    pub(crate) fn set_positions(&mut self, pos: u32) {
        self.prod.reset(pos);
        self.cons.reset(pos);
    }
}
