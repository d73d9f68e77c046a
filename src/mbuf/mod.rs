//! Packet buffers and the pools that hand them out
//!
//! A [`Mempool`] carves an [`Arena`](crate::memory::Arena) into equally sized
//! slots and keeps the free slot indices in a lock-free [`Ring`](crate::ring::Ring).
//! Every [`Mbuf`] is a counted reference to one slot; the slot is recycled
//! when the last reference is released.
//!
//! ```
//! use pktring::mbuf::{Mempool, MempoolConfig};
//!
//! let pool = Mempool::new(MempoolConfig::new("rx", 64, 2048)).unwrap();
//! let mut mbuf = pool.alloc().unwrap();
//! mbuf.extend_from_slice(b"packet").unwrap();
//!
//! let copy = mbuf.clone();
//! assert_eq!(copy.refcnt(), 2);
//! drop(mbuf);
//! drop(copy);
//! assert_eq!(pool.available(), 64);
//! ```

pub mod buffer;
pub mod config;
pub mod pool;
pub mod stats;

pub use buffer::Mbuf;
pub use config::MempoolConfig;
pub use pool::Mempool;
pub use stats::{AtomicMempoolStats, MempoolStats};
