//! Burst I/O counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of burst counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BurstStats {
    pub packets_tx: u64,
    pub packets_rx: u64,
    /// TX calls that sent at least one packet
    pub bursts_tx: u64,
    /// RX polls that returned at least one packet
    pub bursts_rx: u64,
    /// TX calls that left packets with the caller
    pub partial_tx: u64,
    /// RX polls that found nothing
    pub empty_rx_polls: u64,
}

impl BurstStats {
    /// Average packets per non-empty RX burst
    pub fn avg_rx_burst(&self) -> f64 {
        if self.bursts_rx == 0 {
            return 0.0;
        }
        self.packets_rx as f64 / self.bursts_rx as f64
    }

    /// Average packets per non-empty TX burst
    pub fn avg_tx_burst(&self) -> f64 {
        if self.bursts_tx == 0 {
            return 0.0;
        }
        self.packets_tx as f64 / self.bursts_tx as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "BurstStats {{ tx: {} pkts/{} bursts ({} partial), rx: {} pkts/{} bursts \
             ({} empty polls), avg tx: {:.1}, avg rx: {:.1} }}",
            self.packets_tx,
            self.bursts_tx,
            self.partial_tx,
            self.packets_rx,
            self.bursts_rx,
            self.empty_rx_polls,
            self.avg_tx_burst(),
            self.avg_rx_burst()
        )
    }
}

#[derive(Debug, Default)]
pub struct AtomicBurstStats {
    packets_tx: AtomicU64,
    packets_rx: AtomicU64,
    bursts_tx: AtomicU64,
    bursts_rx: AtomicU64,
    partial_tx: AtomicU64,
    empty_rx_polls: AtomicU64,
}

impl AtomicBurstStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one TX call that sent `sent` of `requested` packets
    pub fn record_tx(&self, sent: usize, requested: usize) {
        if sent > 0 {
            self.packets_tx.fetch_add(sent as u64, Ordering::Relaxed);
            self.bursts_tx.fetch_add(1, Ordering::Relaxed);
        }
        if sent < requested {
            self.partial_tx.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one RX poll that returned `received` packets
    pub fn record_rx(&self, received: usize) {
        if received == 0 {
            self.empty_rx_polls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.packets_rx.fetch_add(received as u64, Ordering::Relaxed);
            self.bursts_rx.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> BurstStats {
        BurstStats {
            packets_tx: self.packets_tx.load(Ordering::Relaxed),
            packets_rx: self.packets_rx.load(Ordering::Relaxed),
            bursts_tx: self.bursts_tx.load(Ordering::Relaxed),
            bursts_rx: self.bursts_rx.load(Ordering::Relaxed),
            partial_tx: self.partial_tx.load(Ordering::Relaxed),
            empty_rx_polls: self.empty_rx_polls.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.packets_tx.store(0, Ordering::Relaxed);
        self.packets_rx.store(0, Ordering::Relaxed);
        self.bursts_tx.store(0, Ordering::Relaxed);
        self.bursts_rx.store(0, Ordering::Relaxed);
        self.partial_tx.store(0, Ordering::Relaxed);
        self.empty_rx_polls.store(0, Ordering::Relaxed);
    }
}
