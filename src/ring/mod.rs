//! Lock-free bounded ring queue
//!
//! The ring keeps two head/tail index pairs, one for producers and one for
//! consumers. Enqueue reserves a range on the producer head, writes the
//! slots, then publishes by moving the producer tail; dequeue mirrors this on
//! the consumer side. Single mode moves a head with a plain store, multi
//! mode with a compare-and-swap loop plus an in-order tail publish.
//!
//! Memory ordering: the opposite side's tail is read with acquire, our own
//! tail is published with release. Indices are `u32` and compared with
//! wrapping arithmetic.
//!
//! The safe ring-level `mp_*`/`mc_*` calls take a single-mode side the same
//! way an endpoint does, for the length of the call. While an endpoint holds
//! that side they report a full or empty ring instead of racing it.
//!
//! A thread that stops between reserving and publishing blocks every later
//! reservation on its side from publishing. There is no recovery for that.

pub mod config;
pub mod endpoint;
pub(crate) mod headtail;
pub mod queue;


pub use config::{RingConfig, SyncMode, RING_MAX_CAPACITY};
pub use endpoint::{Consumer, Producer};
pub use queue::Ring;
