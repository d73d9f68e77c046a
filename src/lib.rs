//! # pktring - Lock-Free Rings and Packet Buffers
//!
//! pktring is the in-process core of a userspace packet pipeline: bounded
//! lock-free ring queues for handing work between cores, and fixed-size,
//! reference-counted packet buffers (mbufs) drawn from pre-sized pools.
//!
//! ## Features
//!
//! - **Ring queues**: single/multi producer and consumer modes, bulk (all or
//!   nothing) and burst (as many as possible) operations
//! - **Mempools**: fixed slots carved from one arena, lock-free alloc/free
//! - **Mbufs**: refcounted handles with headroom, trims and a per-handle
//!   data window
//! - **Burst I/O**: `TxBurst`/`RxBurst` traits and a loopback virtual port
//! - **No locks**: every shared index moves through atomics only
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  alloc   ┌────────────┐  enqueue  ┌────────────┐
//! │   Mempool    │ ───────► │    Mbuf    │ ────────► │  Ring<T>   │
//! │ free: Ring   │ ◄─────── │ refcounted │ ◄──────── │ SP/MP SC/MC│
//! └──────────────┘ last ref └────────────┘  dequeue  └────────────┘
//!        │                                                 │
//!        ▼                                                 ▼
//! ┌──────────────┐                              ┌─────────────────────┐
//! │    Arena     │                              │ TxBurst / RxBurst   │
//! │ fixed slots  │                              │ VirtualPort queues  │
//! └──────────────┘                              └─────────────────────┘
//! ```

pub mod burst;
pub mod config;
pub mod cycles;
pub mod error;
pub mod mbuf;
pub mod memory;
pub mod ring;

// Main API re-exports
pub use burst::{
    burst_receive, burst_transmit, BurstStats, PortConfig, PortId, QueueId, RxBurst, TxBurst,
    VirtualPort,
};
pub use config::{default_config, load_config, RuntimeConfig};
pub use error::{MbufError, Result};
pub use mbuf::{Mbuf, Mempool, MempoolConfig, MempoolStats};
pub use memory::Arena;
pub use ring::{Consumer, Producer, Ring, RingConfig, SyncMode, RING_MAX_CAPACITY};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 0;
