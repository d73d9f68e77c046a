//! Burst-oriented packet I/O
//!
//! Transports move packets in bursts: a transmit call takes a batch and
//! accepts the longest prefix it has room for, a receive call returns
//! whatever is ready, up to a limit. Partial completion is a normal outcome,
//! never an error.
//!
//! Rings, ring endpoints and [`VirtualPort`] queues all implement
//! [`TxBurst`] and [`RxBurst`].
//!
//! ```
//! use pktring::burst::{burst_receive, burst_transmit};
//! use pktring::ring::Ring;
//!
//! let ring = Ring::with_capacity("tx", 4).unwrap();
//! let mut pkts = vec![1, 2, 3, 4, 5, 6];
//!
//! assert_eq!(burst_transmit(&ring, &mut pkts), 4);
//! assert_eq!(pkts, vec![5, 6]); // still owned by the caller
//! assert_eq!(burst_receive(&ring, 32), vec![1, 2, 3, 4]);
//! ```

pub mod config;
pub mod port;
pub mod stats;

pub use config::PortConfig;
pub use port::{PortId, QueueId, RxQueue, TxQueue, VirtualPort};
pub use stats::{AtomicBurstStats, BurstStats};

use crate::ring::{Consumer, Producer, Ring};

/// Transmit side of a transport
pub trait TxBurst<T> {
    /// Send the longest prefix of `pkts` the transport accepts
    ///
    /// Sent packets are drained from the front of `pkts`; the rest stay with
    /// the caller. Returns the number sent.
    fn tx_burst(&self, pkts: &mut Vec<T>) -> usize;
}

/// Receive side of a transport
pub trait RxBurst<T> {
    /// Append up to `nb` immediately available packets to `out`
    fn rx_burst(&self, out: &mut Vec<T>, nb: usize) -> usize;
}

/// Send as many packets as `endpoint` accepts; unsent packets stay in `pkts`
pub fn burst_transmit<T, E>(endpoint: &E, pkts: &mut Vec<T>) -> usize
where
    E: TxBurst<T> + ?Sized,
{
    if pkts.is_empty() {
        return 0;
    }
    endpoint.tx_burst(pkts)
}

/// Receive up to `nb` packets from `endpoint`
pub fn burst_receive<T, E>(endpoint: &E, nb: usize) -> Vec<T>
where
    E: RxBurst<T> + ?Sized,
{
    let mut out = Vec::with_capacity(nb);
    endpoint.rx_burst(&mut out, nb);
    out
}

impl<T> TxBurst<T> for Ring<T> {
    fn tx_burst(&self, pkts: &mut Vec<T>) -> usize {
        self.mp_enqueue_burst(pkts)
    }
}

impl<T> RxBurst<T> for Ring<T> {
    fn rx_burst(&self, out: &mut Vec<T>, nb: usize) -> usize {
        self.mc_dequeue_burst(out, nb)
    }
}

impl<T> TxBurst<T> for Producer<'_, T> {
    fn tx_burst(&self, pkts: &mut Vec<T>) -> usize {
        self.enqueue_burst(pkts)
    }
}

impl<T> RxBurst<T> for Consumer<'_, T> {
    fn rx_burst(&self, out: &mut Vec<T>, nb: usize) -> usize {
        self.dequeue_burst(out, nb)
    }
}
