//! Reference-counted packet buffer handle

use std::{
    fmt,
    mem::ManuallyDrop,
    ptr,
    slice,
    sync::{atomic::Ordering, Arc},
};

use crate::error::{MbufError, Result};

use super::pool::PoolShared;

/// A packet buffer.
///
/// An `Mbuf` is one reference to a pool slot plus its own data window
/// `[data_off, data_off + data_len)` inside the slot's `capacity` bytes.
/// `Clone` adds a reference to the same slot and copies the window; trimming
/// one alias leaves the others' windows alone. The slot goes back to the pool
/// when the last reference is dropped or freed.
///
/// Bytes can only be written through a handle that is the sole reference
/// (`refcnt() == 1`); shared buffers are read-only.
pub struct Mbuf {
    pool: Arc<PoolShared>,
    slot: u32,
    data_off: usize,
    data_len: usize,
}

impl Mbuf {
    pub(crate) fn new(pool: Arc<PoolShared>, slot: u32) -> Self {
        let data_off = pool.headroom();
        Self {
            pool,
            slot,
            data_off,
            data_len: 0,
        }
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolShared>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    /// Slot index inside the pool
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Name of the owning pool
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }

    /// Current reference count. Other threads may change it at any time.
    pub fn refcnt(&self) -> u16 {
        self.pool.refcnt(self.slot).load(Ordering::Relaxed)
    }

    /// True when this handle is the only reference to the slot
    pub fn is_unique(&self) -> bool {
        self.pool.refcnt(self.slot).load(Ordering::Acquire) == 1
    }

    /// Add `delta` to the reference count and return the previous count
    ///
    /// Fails with `RefcountUnderflow` if the count would go negative and
    /// `RefcountOverflow` if it would exceed `u16::MAX`; the count is left
    /// unchanged in both cases.
    ///
    /// # Safety
    /// Every increment must be paired with a later decrement (or an extra
    /// [`free`](Self::free)) and vice versa. An unpaired decrement can return
    /// the slot to the pool while other handles still use it.
    pub unsafe fn refcnt_update(&self, delta: i16) -> Result<u16> {
        let refcnt = self.pool.refcnt(self.slot);
        let mut current = refcnt.load(Ordering::Relaxed);

        loop {
            let next = current as i32 + delta as i32;
            if next < 0 {
                return Err(MbufError::RefcountUnderflow { current, delta });
            }
            if next > u16::MAX as i32 {
                return Err(MbufError::RefcountOverflow { current, delta });
            }

            match refcnt.compare_exchange_weak(
                current,
                next as u16,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(prev) => return Ok(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release this reference explicitly
    ///
    /// Same as dropping the handle, but a broken refcount comes back as
    /// `UseAfterFree` instead of a panic or log line.
    pub fn free(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        let result = this.pool.put(this.slot);
        // Move the pool reference out so it is still dropped.
        drop(unsafe { ptr::read(&this.pool) });
        result
    }

    /// Total buffer bytes of the slot
    pub fn capacity(&self) -> usize {
        self.pool.data_room()
    }

    /// Offset of the data start from the buffer start
    pub fn data_off(&self) -> usize {
        self.data_off
    }

    /// Length of the data window
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    /// Bytes available in front of the data
    pub fn headroom(&self) -> usize {
        self.data_off
    }

    /// Bytes available after the data
    pub fn tailroom(&self) -> usize {
        self.capacity() - self.data_off - self.data_len
    }

    /// Returns the contents of the data window
    pub fn data(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.data_ptr(), self.data_len) }
    }

    /// Mutable data window, `None` while the buffer is shared
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        if !self.is_unique() {
            return None;
        }
        Some(unsafe { slice::from_raw_parts_mut(self.data_ptr(), self.data_len) })
    }

    /// Returns `count` bytes of data starting at `offset` into the window
    pub fn get_data_slice(&self, offset: usize, count: usize) -> Result<&[u8]> {
        if offset >= self.data_len {
            return Err(MbufError::BadOffset);
        }
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= self.data_len)
            .ok_or(MbufError::ReadPastBuffer)?;
        Ok(&self.data()[offset..end])
    }

    /// Remove `len` bytes from the front of the window
    ///
    /// Returns the new data start offset. `trim_head(0)` is a no-op.
    pub fn trim_head(&mut self, len: usize) -> Result<usize> {
        if len > self.data_len {
            return Err(MbufError::invalid_trim(len, self.data_len));
        }
        self.data_off += len;
        self.data_len -= len;
        Ok(self.data_off)
    }

    /// Remove `len` bytes from the end of the window
    pub fn trim_tail(&mut self, len: usize) -> Result<()> {
        if len > self.data_len {
            return Err(MbufError::invalid_trim(len, self.data_len));
        }
        self.data_len -= len;
        Ok(())
    }

    /// Grow the window by `len` bytes into the headroom and return them
    pub fn prepend(&mut self, len: usize) -> Result<&mut [u8]> {
        self.ensure_unique()?;
        if len > self.data_off {
            return Err(MbufError::insufficient_space(len, self.data_off));
        }
        self.data_off -= len;
        self.data_len += len;
        Ok(unsafe { slice::from_raw_parts_mut(self.data_ptr(), len) })
    }

    /// Grow the window by `len` bytes into the tailroom and return them
    pub fn append(&mut self, len: usize) -> Result<&mut [u8]> {
        self.ensure_unique()?;
        let tailroom = self.tailroom();
        if len > tailroom {
            return Err(MbufError::insufficient_space(len, tailroom));
        }
        let start = self.data_len;
        self.data_len += len;
        Ok(unsafe { slice::from_raw_parts_mut(self.data_ptr().add(start), len) })
    }

    /// Append a copy of `bytes` to the window
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        self.append(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Empty the window and put it back after the pool's headroom
    pub fn reset(&mut self) {
        self.data_off = self.pool.headroom();
        self.data_len = 0;
    }

    fn ensure_unique(&self) -> Result<()> {
        if self.is_unique() {
            Ok(())
        } else {
            Err(MbufError::SharedBuffer {
                refcnt: self.refcnt(),
            })
        }
    }

    fn data_ptr(&self) -> *mut u8 {
        // data_off <= capacity holds for every window operation.
        unsafe { self.pool.slot_ptr(self.slot).add(self.data_off) }
    }
}

impl Clone for Mbuf {
    fn clone(&self) -> Self {
        let prev = self.pool.refcnt(self.slot).fetch_add(1, Ordering::Relaxed);
        if prev == u16::MAX {
            // The counter wrapped; nothing sound can follow.
            std::process::abort();
        }
        debug_assert_ne!(prev, 0, "clone of released mbuf slot {}", self.slot);

        Self {
            pool: Arc::clone(&self.pool),
            slot: self.slot,
            data_off: self.data_off,
            data_len: self.data_len,
        }
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        if let Err(e) = self.pool.put(self.slot) {
            log::error!("mempool {}: {}", self.pool.name(), e);
            if cfg!(debug_assertions) && !std::thread::panicking() {
                panic!("mbuf dropped with broken refcount: {}", e);
            }
        }
    }
}

impl AsRef<[u8]> for Mbuf {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mbuf")
            .field("pool", &self.pool_name())
            .field("slot", &self.slot)
            .field("refcnt", &self.refcnt())
            .field("capacity", &self.capacity())
            .field("data_off", &self.data_off)
            .field("data_len", &self.data_len)
            .finish()
    }
}

// displays the packet data, 16 bytes per line
impl fmt::Display for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.data().iter().enumerate() {
            write!(f, "{:02x} ", byte)?;
            if i % 16 == 15 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbuf::{Mempool, MempoolConfig};

    fn pool() -> Mempool {
        Mempool::new(MempoolConfig::new("buf", 4, 256).with_headroom(32)).unwrap()
    }

    #[test]
    fn test_fresh_mbuf_window() {
        let pool = pool();
        let mbuf = pool.alloc().unwrap();
        assert_eq!(mbuf.refcnt(), 1);
        assert_eq!(mbuf.data_off(), 32);
        assert_eq!(mbuf.data_len(), 0);
        assert_eq!(mbuf.capacity(), 256);
        assert_eq!(mbuf.tailroom(), 224);
        assert!(mbuf.is_empty());
    }

    #[test]
    fn test_trims() {
        let pool = pool();
        let mut mbuf = pool.alloc_from_bytes(b"0123456789").unwrap();

        assert_eq!(mbuf.trim_head(0).unwrap(), 32);
        mbuf.trim_tail(0).unwrap();
        assert_eq!(mbuf.data(), b"0123456789");

        assert_eq!(mbuf.trim_head(3).unwrap(), 35);
        assert_eq!(mbuf.data(), b"3456789");
        mbuf.trim_tail(2).unwrap();
        assert_eq!(mbuf.data(), b"34567");

        assert!(matches!(
            mbuf.trim_head(6),
            Err(MbufError::InvalidTrim { requested: 6, available: 5 })
        ));
        assert!(mbuf.trim_tail(6).is_err());
        assert_eq!(mbuf.data(), b"34567");

        mbuf.trim_tail(5).unwrap();
        assert!(mbuf.is_empty());
        assert!(mbuf.data_off() + mbuf.data_len() <= mbuf.capacity());
    }

    #[test]
    fn test_prepend_into_headroom() {
        let pool = pool();
        let mut mbuf = pool.alloc_from_bytes(b"payload").unwrap();
        mbuf.prepend(4).unwrap().copy_from_slice(b"hdr:");
        assert_eq!(mbuf.data(), b"hdr:payload");
        assert_eq!(mbuf.headroom(), 28);

        assert!(matches!(
            mbuf.prepend(29),
            Err(MbufError::InsufficientSpace { requested: 29, available: 28 })
        ));
    }

    #[test]
    fn test_append_bounds() {
        let pool = pool();
        let mut mbuf = pool.alloc().unwrap();
        assert_eq!(mbuf.append(224).unwrap().len(), 224);
        assert!(matches!(
            mbuf.append(1),
            Err(MbufError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn test_clone_shares_slot_not_window() {
        let pool = pool();
        let mut original = pool.alloc_from_bytes(b"abcdef").unwrap();
        let mut alias = original.clone();

        assert_eq!(original.refcnt(), 2);
        assert_eq!(alias.slot(), original.slot());

        alias.trim_head(2).unwrap();
        assert_eq!(alias.data(), b"cdef");
        assert_eq!(original.data(), b"abcdef");

        // Shared buffers are read-only
        assert!(original.data_mut().is_none());
        assert!(matches!(
            original.extend_from_slice(b"x"),
            Err(MbufError::SharedBuffer { refcnt: 2 })
        ));

        drop(alias);
        assert_eq!(original.refcnt(), 1);
        original.data_mut().unwrap()[0] = b'A';
        assert_eq!(original.data(), b"Abcdef");
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_refcnt_update() {
        let pool = pool();
        let mbuf = pool.alloc().unwrap();

        unsafe {
            assert_eq!(mbuf.refcnt_update(2).unwrap(), 1);
            assert_eq!(mbuf.refcnt(), 3);
            assert!(matches!(
                mbuf.refcnt_update(-4),
                Err(MbufError::RefcountUnderflow { current: 3, delta: -4 })
            ));
            assert_eq!(mbuf.refcnt_update(-2).unwrap(), 3);
        }
        assert_eq!(mbuf.refcnt(), 1);
    }

    #[test]
    fn test_refcnt_overflow_is_rejected() {
        let pool = pool();
        let mbuf = pool.alloc().unwrap();
        unsafe {
            assert_eq!(mbuf.refcnt_update(i16::MAX).unwrap(), 1);
            assert_eq!(mbuf.refcnt_update(i16::MAX).unwrap(), 1 + i16::MAX as u16);
            assert!(matches!(
                mbuf.refcnt_update(2),
                Err(MbufError::RefcountOverflow { .. })
            ));
            mbuf.refcnt_update(-i16::MAX).unwrap();
            mbuf.refcnt_update(-i16::MAX).unwrap();
        }
        assert_eq!(mbuf.refcnt(), 1);
    }

    #[cfg(not(feature = "unchecked-refcnt"))]
    #[test]
    fn test_free_with_zero_refcount_is_use_after_free() {
        let pool = pool();
        let mbuf = pool.alloc().unwrap();
        let slot = mbuf.slot();

        unsafe { mbuf.refcnt_update(-1).unwrap() };
        assert!(matches!(
            mbuf.free(),
            Err(MbufError::UseAfterFree { slot: s }) if s == slot
        ));
        // The slot was not pushed back a second time
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_get_data_slice() {
        let pool = pool();
        let mbuf = pool.alloc_from_bytes(b"abcdef").unwrap();
        assert_eq!(mbuf.get_data_slice(2, 3).unwrap(), b"cde");
        assert!(matches!(mbuf.get_data_slice(6, 1), Err(MbufError::BadOffset)));
        assert!(matches!(mbuf.get_data_slice(4, 3), Err(MbufError::ReadPastBuffer)));
        assert!(matches!(
            mbuf.get_data_slice(1, usize::MAX),
            Err(MbufError::ReadPastBuffer)
        ));
    }

    #[test]
    fn test_reset_and_display() {
        let pool = pool();
        let mut mbuf = pool.alloc_from_bytes(&[0xab; 17]).unwrap();
        let dump = format!("{}", mbuf);
        assert!(dump.starts_with("ab ab"));
        assert_eq!(dump.lines().count(), 2);

        mbuf.trim_head(4).unwrap();
        mbuf.reset();
        assert_eq!(mbuf.data_off(), 32);
        assert!(mbuf.is_empty());
    }
}
