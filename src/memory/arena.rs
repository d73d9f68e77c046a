//! Pre-sized backing arena for mempool slots

use std::{alloc::Layout, fmt, ptr::NonNull};

use crate::error::{MbufError, Result};

/// A contiguous byte region that a mempool partitions into fixed-size slots
///
/// The arena is either allocated here (zeroed, aligned) or handed in as a
/// raw region owned by someone else, e.g. a huge-page mapping.
pub struct Arena {
    base: NonNull<u8>,
    len: usize,
    /// Layout to deallocate with; `None` for borrowed memory
    owned: Option<Layout>,
}

impl Arena {
    /// Allocate a zeroed arena of `len` bytes aligned to `align`
    pub fn new(len: usize, align: usize) -> Result<Self> {
        if len == 0 {
            return Err(MbufError::invalid_parameter("len", "Arena size cannot be zero"));
        }

        let layout = Layout::from_size_align(len, align).map_err(|_| {
            MbufError::invalid_parameter("align", "Alignment must be a power of two")
        })?;

        let base = unsafe {
            let ptr = std::alloc::alloc_zeroed(layout);
            NonNull::new(ptr).ok_or_else(|| MbufError::memory("Failed to allocate arena"))?
        };

        log::debug!("Allocated arena of {} bytes at {:p}", len, base);

        Ok(Self {
            base,
            len,
            owned: Some(layout),
        })
    }

    /// Wrap memory owned elsewhere
    ///
    /// # Safety
    /// - `ptr` must be valid for reads and writes for `len` bytes
    /// - The region must outlive the arena and every mbuf issued from it
    /// - Nothing else may access the region while the arena is in use
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> Result<Self> {
        let base = NonNull::new(ptr)
            .ok_or_else(|| MbufError::invalid_parameter("ptr", "Arena pointer is null"))?;

        if len == 0 {
            return Err(MbufError::invalid_parameter("len", "Arena size cannot be zero"));
        }

        Ok(Self {
            base,
            len,
            owned: None,
        })
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub fn is_owned(&self) -> bool {
        self.owned.is_some()
    }

    /// Number of `slot_size` slots that fit
    pub fn slots_for(&self, slot_size: usize) -> usize {
        if slot_size == 0 {
            0
        } else {
            self.len / slot_size
        }
    }

    /// Start of slot `index`
    ///
    /// # Safety
    /// `(index + 1) * slot_size` must not exceed `len`.
    pub(crate) unsafe fn slot_ptr(&self, slot_size: usize, index: usize) -> *mut u8 {
        self.base.as_ptr().add(index * slot_size)
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Some(layout) = self.owned {
            unsafe { std::alloc::dealloc(self.base.as_ptr(), layout) };
        }
    }
}

// The arena is plain memory; access discipline is enforced by the mempool.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("len", &self.len)
            .field("owned", &self.is_owned())
            .finish()
    }
}
