//! Burst I/O through the loopback port and rings

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Barrier,
    },
    thread,
};

use pktring::{
    burst::{burst_receive, burst_transmit, PortConfig, QueueId, RxBurst, TxBurst, VirtualPort},
    mbuf::{Mbuf, Mempool, MempoolConfig},
    ring::{Ring, RingConfig, SyncMode},
};

#[cfg(test)]
mod burst_tests {
    use super::*;

    /// RX workers poll one queue each and forward into a shared work ring
    #[test]
    fn test_rx_workers_forward_to_ring() {
        let queue_count = 4u16;
        let per_queue = 5_000u32;
        let pool = Mempool::new(MempoolConfig::new("pipeline", 1024, 256).with_headroom(32)).unwrap();
        let port: Arc<VirtualPort<Mbuf>> = Arc::new(
            VirtualPort::new(
                &PortConfig::new(0, queue_count)
                    .with_queue_capacity(128)
                    .with_burst_size(32),
            )
            .unwrap(),
        );
        let work: Arc<Ring<Mbuf>> = Arc::new(
            Ring::new(
                RingConfig::new("work", 512)
                    .with_producer(SyncMode::Multi)
                    .with_consumer(SyncMode::Single),
            )
            .unwrap(),
        );
        let stop = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(queue_count as usize + 1));

        // One RX worker per queue; the worker id selects the queue
        let mut workers = Vec::new();
        for worker_id in 0..queue_count {
            let port = port.clone();
            let work = work.clone();
            let stop = stop.clone();
            let barrier = barrier.clone();
            workers.push(thread::spawn(move || {
                let rx = port.rx_queue(QueueId(worker_id)).unwrap();
                barrier.wait();
                let mut pending: Vec<Mbuf> = Vec::new();
                loop {
                    rx.rx_burst(&mut pending, port.burst_size());
                    if pending.is_empty() {
                        if stop.load(Ordering::Acquire) && port.pending(QueueId(worker_id)) == 0 {
                            break;
                        }
                        thread::yield_now();
                        continue;
                    }
                    while !pending.is_empty() {
                        if burst_transmit(&*work, &mut pending) == 0 {
                            thread::yield_now();
                        }
                    }
                }
            }));
        }

        barrier.wait();

        // The collector owns the single consumer side of the work ring
        let collector = {
            let work = work.clone();
            let total = queue_count as usize * per_queue as usize;
            thread::spawn(move || {
                let consumer = work.consumer().unwrap();
                let mut seen = vec![0u32; queue_count as usize];
                let mut received = 0;
                let mut out = Vec::new();
                while received < total {
                    let n = consumer.dequeue_burst(&mut out, 64);
                    for mbuf in out.drain(..) {
                        let queue = mbuf.data()[0] as usize;
                        let seq = u32::from_be_bytes([
                            mbuf.data()[1],
                            mbuf.data()[2],
                            mbuf.data()[3],
                            mbuf.data()[4],
                        ]);
                        // One queue drains through one worker, so order holds
                        assert_eq!(seq, seen[queue]);
                        seen[queue] += 1;
                    }
                    received += n;
                    if n == 0 {
                        thread::yield_now();
                    }
                }
                seen
            })
        };

        for q in 0..queue_count {
            let tx = port.tx_queue(QueueId(q)).unwrap();
            let mut seq = 0;
            while seq < per_queue {
                let mut pkts = Vec::new();
                while pkts.len() < 16 && seq < per_queue {
                    let Ok(mut mbuf) = pool.alloc() else { break };
                    mbuf.extend_from_slice(&[q as u8]).unwrap();
                    mbuf.extend_from_slice(&seq.to_be_bytes()).unwrap();
                    pkts.push(mbuf);
                    seq += 1;
                }
                while !pkts.is_empty() {
                    if tx.tx_burst(&mut pkts) == 0 {
                        thread::yield_now();
                    }
                }
            }
        }
        stop.store(true, Ordering::Release);

        for worker in workers {
            worker.join().unwrap();
        }
        let seen = collector.join().unwrap();
        assert!(seen.iter().all(|&n| n == per_queue));

        let stats = port.stats();
        assert_eq!(stats.packets_tx, (queue_count as u64) * (per_queue as u64));
        assert_eq!(stats.packets_rx, stats.packets_tx);
        assert_eq!(pool.available(), pool.capacity());
    }

    /// Unsent packets stay with the caller and go back to the pool on drop
    #[test]
    fn test_partial_burst_ownership() {
        let pool = Mempool::new(MempoolConfig::new("partial", 16, 128).with_headroom(0)).unwrap();
        let port: VirtualPort<Mbuf> =
            VirtualPort::new(&PortConfig::new(1, 1).with_queue_capacity(5)).unwrap();
        let tx = port.tx_queue(QueueId(0)).unwrap();
        let rx = port.rx_queue(QueueId(0)).unwrap();

        let mut pkts = pool.alloc_bulk(8).unwrap();
        assert_eq!(burst_transmit(&tx, &mut pkts), 5);
        assert_eq!(pkts.len(), 3);
        assert_eq!(pool.in_use(), 8);

        drop(pkts);
        assert_eq!(pool.in_use(), 5);

        let got = burst_receive(&rx, 2);
        assert_eq!(got.len(), 2);
        let rest = burst_receive(&rx, 32);
        assert_eq!(rest.len(), 3);
        assert!(burst_receive(&rx, 32).is_empty());

        drop(got);
        drop(rest);
        assert_eq!(pool.available(), 16);

        let stats = port.stats();
        assert_eq!(stats.partial_tx, 1);
        assert_eq!(stats.bursts_rx, 2);
        assert_eq!(stats.empty_rx_polls, 1);
    }
}
