//! Fixed-size mbuf pool over a pre-sized arena

use std::{
    fmt,
    sync::{
        atomic::{fence, AtomicU16, Ordering},
        Arc,
    },
};

use crate::{
    error::{MbufError, Result},
    memory::Arena,
    ring::{Ring, RingConfig},
};

use super::{
    buffer::Mbuf,
    config::MempoolConfig,
    stats::{AtomicMempoolStats, MempoolStats},
};

/// A pool of fixed-size packet buffers
///
/// The free set is a multi-producer multi-consumer [`Ring`] of slot indices,
/// so allocation and release are lock-free. Cloning a `Mempool` is cheap and
/// yields another handle to the same pool.
#[derive(Clone)]
pub struct Mempool {
    shared: Arc<PoolShared>,
}

/// State shared by the pool and every mbuf it issued
pub(crate) struct PoolShared {
    name: String,
    arena: Arena,
    slot_size: usize,
    data_room: usize,
    headroom: usize,
    capacity: usize,
    /// Per-slot reference counts; 0 while the slot is free
    refcnts: Box<[AtomicU16]>,
    free: Ring<u32>,
    stats: AtomicMempoolStats,
}

impl Mempool {
    /// Create a pool backed by a freshly allocated arena
    pub fn new(config: MempoolConfig) -> Result<Self> {
        config.validate()?;
        let arena = Arena::new(config.total_memory_required(), config.alignment)?;
        Self::with_arena(config, arena)
    }

    /// Create a pool that partitions an arena provided by the caller
    pub fn with_arena(config: MempoolConfig, arena: Arena) -> Result<Self> {
        config.validate()?;

        let slot_size = config.slot_size();
        let slots = arena.slots_for(slot_size);
        if slots < config.capacity {
            return Err(MbufError::insufficient_space(
                config.total_memory_required(),
                arena.len(),
            ));
        }

        if arena.as_ptr() as usize % config.alignment != 0 {
            return Err(MbufError::invalid_parameter(
                "arena",
                format!("Arena base is not aligned to {}", config.alignment),
            ));
        }

        let free = Ring::new(RingConfig::new(
            format!("{}_free", config.name),
            config.capacity,
        ))?;
        let mut indices: Vec<u32> = (0..config.capacity as u32).collect();
        let filled = free.mp_enqueue_bulk(&mut indices);
        debug_assert_eq!(filled, config.capacity);

        let refcnts = (0..config.capacity)
            .map(|_| AtomicU16::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::debug!(
            "Created mempool {}: {} mbufs, data room {}, headroom {}, slot size {}",
            config.name,
            config.capacity,
            config.data_room,
            config.headroom,
            slot_size,
        );

        Ok(Self {
            shared: Arc::new(PoolShared {
                name: config.name,
                arena,
                slot_size,
                data_room: config.data_room,
                headroom: config.headroom,
                capacity: config.capacity,
                refcnts,
                free,
                stats: AtomicMempoolStats::new(),
            }),
        })
    }

    /// Allocate one mbuf with refcount 1 and an empty data window after the headroom
    ///
    /// An exhausted pool returns [`MbufError::PoolExhausted`].
    pub fn alloc(&self) -> Result<Mbuf> {
        let shared = &self.shared;
        match shared.free.mc_dequeue() {
            Some(slot) => {
                shared.claim(slot);
                shared.stats.record_allocation(shared.in_use());
                Ok(Mbuf::new(Arc::clone(shared), slot))
            }
            None => {
                shared.stats.record_failure();
                Err(MbufError::PoolExhausted)
            }
        }
    }

    /// Allocate exactly `n` mbufs or none
    pub fn alloc_bulk(&self, n: usize) -> Result<Vec<Mbuf>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let shared = &self.shared;
        let mut slots = Vec::with_capacity(n);
        if shared.free.mc_dequeue_bulk(&mut slots, n) == 0 {
            shared.stats.record_failure();
            return Err(MbufError::PoolExhausted);
        }

        shared.stats.record_bulk_allocation(n, shared.in_use());
        Ok(slots
            .into_iter()
            .map(|slot| {
                shared.claim(slot);
                Mbuf::new(Arc::clone(shared), slot)
            })
            .collect())
    }

    /// Allocate an mbuf and copy `data` into it after the headroom
    pub fn alloc_from_bytes(&self, data: &[u8]) -> Result<Mbuf> {
        let mut mbuf = self.alloc()?;
        if data.len() > mbuf.tailroom() {
            return Err(MbufError::WritePastBuffer);
        }
        mbuf.extend_from_slice(data)?;
        Ok(mbuf)
    }

    /// Release one reference; the slot returns to the pool when the last goes
    pub fn release(&self, mbuf: Mbuf) -> Result<()> {
        if !mbuf.belongs_to(&self.shared) {
            return Err(MbufError::invalid_parameter(
                "mbuf",
                format!("mbuf was not allocated from mempool {}", self.name()),
            ));
        }
        mbuf.free()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of mbufs in the pool
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Free mbufs (snapshot)
    pub fn available(&self) -> usize {
        self.shared.free.count()
    }

    /// Issued mbufs (snapshot)
    pub fn in_use(&self) -> usize {
        self.shared.in_use()
    }

    /// Buffer bytes per mbuf, headroom included
    pub fn data_room(&self) -> usize {
        self.shared.data_room
    }

    pub fn headroom(&self) -> usize {
        self.shared.headroom
    }

    /// Arena bytes per slot
    pub fn slot_size(&self) -> usize {
        self.shared.slot_size
    }

    pub fn stats(&self) -> MempoolStats {
        self.shared
            .stats
            .snapshot(self.shared.capacity, self.shared.in_use())
    }
}

impl PoolShared {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn data_room(&self) -> usize {
        self.data_room
    }

    pub(crate) fn headroom(&self) -> usize {
        self.headroom
    }

    pub(crate) fn refcnt(&self, slot: u32) -> &AtomicU16 {
        &self.refcnts[slot as usize]
    }

    /// Start of the buffer for `slot`
    pub(crate) fn slot_ptr(&self, slot: u32) -> *mut u8 {
        debug_assert!((slot as usize) < self.capacity);
        // Slot indices come from the free ring, all below capacity.
        unsafe { self.arena.slot_ptr(self.slot_size, slot as usize) }
    }

    fn in_use(&self) -> usize {
        self.capacity - self.free.count()
    }

    fn claim(&self, slot: u32) {
        let prev = self.refcnt(slot).swap(1, Ordering::Relaxed);
        debug_assert_eq!(prev, 0, "free slot {} had refcount {}", slot, prev);
    }

    /// Drop one reference to `slot`, recycling it on the 1 -> 0 transition.
    ///
    /// The CAS makes the transition a single step, so exactly one releaser
    /// sees the count go to zero.
    #[cfg(not(feature = "unchecked-refcnt"))]
    pub(crate) fn put(&self, slot: u32) -> Result<()> {
        let refcnt = self.refcnt(slot);
        let mut current = refcnt.load(Ordering::Relaxed);

        loop {
            if current == 0 {
                return Err(MbufError::UseAfterFree { slot });
            }

            match refcnt.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        if current == 1 {
            self.recycle(slot);
        }
        Ok(())
    }

    /// Unchecked release: no zero check before the decrement.
    #[cfg(feature = "unchecked-refcnt")]
    pub(crate) fn put(&self, slot: u32) -> Result<()> {
        if self.refcnt(slot).fetch_sub(1, Ordering::Release) == 1 {
            self.recycle(slot);
        }
        Ok(())
    }

    fn recycle(&self, slot: u32) {
        // Pairs with the release decrements of the other references.
        fence(Ordering::Acquire);

        if self.free.mp_enqueue(slot).is_err() {
            // Only reachable if a slot was returned twice.
            log::error!("mempool {}: free ring full while returning slot {}", self.name, slot);
            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("mempool {}: slot {} returned twice", self.name, slot);
            }
            return;
        }
        self.stats.record_free();
    }
}

impl fmt::Debug for Mempool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.name())
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .field("data_room", &self.data_room())
            .field("headroom", &self.headroom())
            .field("slot_size", &self.slot_size())
            .finish()
    }
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        log::debug!("Dropping mempool {}.", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool(capacity: usize) -> Mempool {
        Mempool::new(MempoolConfig::new("test", capacity, 64).with_headroom(0)).unwrap()
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let pool = small_pool(4);
        let mut held: Vec<Mbuf> = (0..4).map(|_| pool.alloc().unwrap()).collect();

        assert!(matches!(pool.alloc(), Err(MbufError::PoolExhausted)));
        assert_eq!(pool.available(), 0);

        pool.release(held.pop().unwrap()).unwrap();
        assert_eq!(pool.available(), 1);
        held.push(pool.alloc().unwrap());

        let stats = pool.stats();
        assert_eq!(stats.total_allocations, 5);
        assert_eq!(stats.allocation_failures, 1);
        assert_eq!(stats.total_frees, 1);
        assert_eq!(stats.peak_in_use, 4);
    }

    #[test]
    fn test_alloc_bulk_all_or_nothing() {
        let pool = small_pool(4);
        let first = pool.alloc_bulk(3).unwrap();
        assert_eq!(first.len(), 3);
        assert!(matches!(pool.alloc_bulk(2), Err(MbufError::PoolExhausted)));
        assert_eq!(pool.available(), 1);
        assert!(pool.alloc_bulk(0).unwrap().is_empty());
        drop(first);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_alloc_from_bytes() {
        let pool = small_pool(2);
        let mbuf = pool.alloc_from_bytes(b"hello").unwrap();
        assert_eq!(mbuf.data(), b"hello");

        let too_big = [0u8; 65];
        assert!(matches!(
            pool.alloc_from_bytes(&too_big),
            Err(MbufError::WritePastBuffer)
        ));
        // The failed attempt gave its slot back
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_release_to_foreign_pool() {
        let a = small_pool(2);
        let b = small_pool(2);
        let mbuf = a.alloc().unwrap();
        assert!(matches!(
            b.release(mbuf),
            Err(MbufError::InvalidParameter { .. })
        ));
        // The rejected mbuf was dropped normally
        assert_eq!(a.available(), 2);
    }

    #[test]
    fn test_with_arena_too_small() {
        let config = MempoolConfig::new("tiny", 8, 64).with_headroom(0);
        let arena = Arena::new(256, 64).unwrap();
        assert!(matches!(
            Mempool::with_arena(config, arena),
            Err(MbufError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn test_pool_outlives_handle() {
        let pool = small_pool(2);
        let mbuf = pool.alloc().unwrap();
        drop(pool);
        assert_eq!(mbuf.refcnt(), 1);
        drop(mbuf);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "returned twice")]
    fn test_double_return_panics_in_debug() {
        let pool = small_pool(1);
        let mbuf = pool.alloc().unwrap();
        let alias = mbuf.clone();

        // Forge the count so both handles see a 1 -> 0 transition.
        unsafe { mbuf.refcnt_update(-1).unwrap() };
        mbuf.free().unwrap();
        assert_eq!(pool.available(), 1);

        unsafe { alias.refcnt_update(1).unwrap() };
        let _ = alias.free();
    }

    #[test]
    fn test_slots_do_not_overlap() {
        let pool = small_pool(4);
        let mut bufs = pool.alloc_bulk(4).unwrap();
        for (i, mbuf) in bufs.iter_mut().enumerate() {
            mbuf.extend_from_slice(&[i as u8; 64]).unwrap();
        }
        for (i, mbuf) in bufs.iter().enumerate() {
            assert!(mbuf.data().iter().all(|b| *b == i as u8));
        }
    }
}
