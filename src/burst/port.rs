//! In-process loopback port

use std::fmt;

use crate::{
    error::{MbufError, Result},
    mbuf::Mbuf,
    ring::{Ring, RingConfig},
};

use super::{
    config::PortConfig,
    stats::{AtomicBurstStats, BurstStats},
    RxBurst, TxBurst,
};

#[derive(Debug, Copy, Clone, Hash, Ord, Eq, PartialEq, PartialOrd)]
pub struct PortId(pub u16);

impl PortId {
    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Hash, Ord, Eq, PartialEq, PartialOrd)]
pub struct QueueId(pub u16);

impl QueueId {
    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loopback port: whatever is sent on queue `q` is received on queue `q`
///
/// Each queue is an MPMC ring, so any number of threads may transmit and
/// poll the same queue.
pub struct VirtualPort<T = Mbuf> {
    id: PortId,
    queues: Vec<Ring<T>>,
    burst_size: usize,
    stats: AtomicBurstStats,
}

impl<T> VirtualPort<T> {
    pub fn new(config: &PortConfig) -> Result<Self> {
        config.validate()?;

        let queues = (0..config.queues)
            .map(|q| {
                Ring::new(RingConfig::new(
                    format!("port{}_q{}", config.id, q),
                    config.queue_capacity,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Created virtual port {}: {} queues of {}",
            config.id,
            config.queues,
            config.queue_capacity
        );

        Ok(Self {
            id: PortId(config.id),
            queues,
            burst_size: config.effective_burst_size(),
            stats: AtomicBurstStats::new(),
        })
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn nb_queues(&self) -> usize {
        self.queues.len()
    }

    /// Default number of packets per RX poll
    pub fn burst_size(&self) -> usize {
        self.burst_size
    }

    /// TX side of queue `qid`
    pub fn tx_queue(&self, qid: QueueId) -> Result<TxQueue<'_, T>> {
        self.check_queue(qid)?;
        Ok(TxQueue { port: self, qid })
    }

    /// RX side of queue `qid`
    pub fn rx_queue(&self, qid: QueueId) -> Result<RxQueue<'_, T>> {
        self.check_queue(qid)?;
        Ok(RxQueue { port: self, qid })
    }

    /// Packets waiting on queue `qid`
    pub fn pending(&self, qid: QueueId) -> usize {
        self.queues
            .get(qid.0 as usize)
            .map(|ring| ring.count())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> BurstStats {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn check_queue(&self, qid: QueueId) -> Result<()> {
        if (qid.0 as usize) < self.queues.len() {
            Ok(())
        } else {
            Err(MbufError::invalid_parameter(
                "queue",
                format!("Port {} has no queue {}", self.id, qid),
            ))
        }
    }

    fn ring(&self, qid: QueueId) -> &Ring<T> {
        &self.queues[qid.0 as usize]
    }
}

impl<T> fmt::Debug for VirtualPort<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualPort")
            .field("id", &self.id)
            .field("queues", &self.queues.len())
            .field("burst_size", &self.burst_size)
            .finish()
    }
}

/// Transmit handle for one port queue
pub struct TxQueue<'a, T> {
    port: &'a VirtualPort<T>,
    qid: QueueId,
}

impl<T> TxQueue<'_, T> {
    pub fn id(&self) -> QueueId {
        self.qid
    }
}

impl<T> TxBurst<T> for TxQueue<'_, T> {
    fn tx_burst(&self, pkts: &mut Vec<T>) -> usize {
        let requested = pkts.len();
        let sent = self.port.ring(self.qid).mp_enqueue_burst(pkts);
        self.port.stats.record_tx(sent, requested);
        sent
    }
}

/// Receive handle for one port queue
pub struct RxQueue<'a, T> {
    port: &'a VirtualPort<T>,
    qid: QueueId,
}

impl<T> RxQueue<'_, T> {
    pub fn id(&self) -> QueueId {
        self.qid
    }
}

impl<T> RxBurst<T> for RxQueue<'_, T> {
    fn rx_burst(&self, out: &mut Vec<T>, nb: usize) -> usize {
        let received = self.port.ring(self.qid).mc_dequeue_burst(out, nb);
        self.port.stats.record_rx(received);
        received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burst::{burst_receive, burst_transmit};

    fn port(queues: u16, capacity: usize) -> VirtualPort<u32> {
        VirtualPort::new(&PortConfig::new(3, queues).with_queue_capacity(capacity)).unwrap()
    }

    #[test]
    fn test_loopback_per_queue() {
        let port = port(2, 8);
        let tx0 = port.tx_queue(QueueId(0)).unwrap();
        let tx1 = port.tx_queue(QueueId(1)).unwrap();

        let mut a = vec![1, 2, 3];
        let mut b = vec![10];
        assert_eq!(burst_transmit(&tx0, &mut a), 3);
        assert_eq!(burst_transmit(&tx1, &mut b), 1);
        assert_eq!(port.pending(QueueId(0)), 3);

        let rx0 = port.rx_queue(QueueId(0)).unwrap();
        let rx1 = port.rx_queue(QueueId(1)).unwrap();
        assert_eq!(burst_receive(&rx0, 32), vec![1, 2, 3]);
        assert_eq!(burst_receive(&rx1, 32), vec![10]);
        assert!(burst_receive(&rx1, 32).is_empty());
    }

    #[test]
    fn test_partial_transmit_leaves_tail() {
        let port = port(1, 4);
        let tx = port.tx_queue(QueueId(0)).unwrap();
        let mut pkts: Vec<u32> = (0..6).collect();

        assert_eq!(tx.tx_burst(&mut pkts), 4);
        assert_eq!(pkts, vec![4, 5]);

        let stats = port.stats();
        assert_eq!(stats.packets_tx, 4);
        assert_eq!(stats.partial_tx, 1);
    }

    #[test]
    fn test_unknown_queue() {
        let port = port(1, 4);
        assert!(port.tx_queue(QueueId(1)).is_err());
        assert!(port.rx_queue(QueueId(7)).is_err());
        assert_eq!(port.pending(QueueId(7)), 0);
    }

    #[test]
    fn test_rx_counts_empty_polls() {
        let port = port(1, 4);
        let rx = port.rx_queue(QueueId(0)).unwrap();
        let mut out = Vec::new();
        assert_eq!(rx.rx_burst(&mut out, 4), 0);
        assert_eq!(port.stats().empty_rx_polls, 1);
        port.reset_stats();
        assert_eq!(port.stats(), BurstStats::default());
    }
}
