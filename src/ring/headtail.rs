//! Head/tail index pair for one side of a ring
//!
//! Each side owns a `head` (next index to reserve) and a `tail` (everything
//! before it is published to the opposite side). An operation reserves
//! `[old_head, new_head)` by moving the head, touches the slots, then
//! publishes by moving the tail. The tail store is the linearization point.

use std::sync::atomic::{fence, AtomicU32, Ordering};

use super::config::SyncMode;

/// How many entries an operation may settle for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// All requested entries or none (bulk)
    Fixed,
    /// As many as available, possibly zero (burst)
    Variable,
}

/// Index range reserved on one side
#[derive(Debug, Clone, Copy)]
pub(crate) struct Reservation {
    pub(crate) old_head: u32,
    pub(crate) new_head: u32,
}

impl Reservation {
    pub(crate) fn len(&self) -> u32 {
        self.new_head.wrapping_sub(self.old_head)
    }
}

#[derive(Debug, Default)]
pub(crate) struct HeadTail {
    head: AtomicU32,
    tail: AtomicU32,
}

impl HeadTail {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Published position, acquire so the slots behind it are visible
    pub(crate) fn tail(&self) -> u32 {
        self.tail.load(Ordering::Acquire)
    }

    /// Reserve up to `n` entries on this side.
    ///
    /// `entries(old_head, opposite_tail)` returns how many entries the opposite
    /// side currently leaves for us. Multi mode retries the CAS only after
    /// another thread moved the head, so some thread always makes progress.
    pub(crate) fn reserve<F>(
        &self,
        opposite: &HeadTail,
        n: u32,
        behavior: Behavior,
        mode: SyncMode,
        entries: F,
    ) -> Option<Reservation>
    where
        F: Fn(u32, u32) -> u32,
    {
        let mut old_head = self.head.load(Ordering::Relaxed);

        loop {
            // Keep the opposite tail load after the head load.
            fence(Ordering::Acquire);
            let opposite_tail = opposite.tail.load(Ordering::Acquire);
            let available = entries(old_head, opposite_tail);

            let n = if n > available {
                match behavior {
                    Behavior::Fixed => 0,
                    Behavior::Variable => available,
                }
            } else {
                n
            };

            if n == 0 {
                return None;
            }

            let new_head = old_head.wrapping_add(n);

            match mode {
                SyncMode::Single => {
                    self.head.store(new_head, Ordering::Relaxed);
                    return Some(Reservation { old_head, new_head });
                }
                SyncMode::Multi => {
                    match self.head.compare_exchange_weak(
                        old_head,
                        new_head,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => return Some(Reservation { old_head, new_head }),
                        Err(current) => {
                            old_head = current;
                            std::hint::spin_loop();
                        }
                    }
                }
            }
        }
    }

    /// Publish a finished reservation.
    ///
    /// In multi mode the tail must pass through every earlier reservation in
    /// order, so we wait until it reaches our `old_head`. The opposite side
    /// therefore never observes a window with unwritten slots in it.
    pub(crate) fn publish(&self, reservation: &Reservation, mode: SyncMode) {
        if mode == SyncMode::Multi {
            while self.tail.load(Ordering::Relaxed) != reservation.old_head {
                std::hint::spin_loop();
            }
        }

        self.tail.store(reservation.new_head, Ordering::Release);
    }

    /// Move both indices to `pos`; requires exclusive access.
    pub(crate) fn reset(&mut self, pos: u32) {
        *self.head.get_mut() = pos;
        *self.tail.get_mut() = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_entries(capacity: u32) -> impl Fn(u32, u32) -> u32 {
        move |head, cons_tail| capacity.wrapping_add(cons_tail).wrapping_sub(head)
    }

    #[test]
    fn test_fixed_reservation_all_or_nothing() {
        let prod = HeadTail::new();
        let cons = HeadTail::new();

        let r = prod
            .reserve(&cons, 3, Behavior::Fixed, SyncMode::Single, free_entries(4))
            .unwrap();
        assert_eq!((r.old_head, r.new_head), (0, 3));
        prod.publish(&r, SyncMode::Single);

        assert!(prod
            .reserve(&cons, 2, Behavior::Fixed, SyncMode::Single, free_entries(4))
            .is_none());
    }

    #[test]
    fn test_variable_reservation_takes_what_is_left() {
        let prod = HeadTail::new();
        let cons = HeadTail::new();

        let r = prod
            .reserve(&cons, 10, Behavior::Variable, SyncMode::Multi, free_entries(4))
            .unwrap();
        assert_eq!(r.len(), 4);
        prod.publish(&r, SyncMode::Multi);
        assert_eq!(prod.tail(), 4);
    }

    #[test]
    fn test_indices_wrap() {
        let mut prod = HeadTail::new();
        let mut cons = HeadTail::new();
        prod.reset(u32::MAX - 1);
        cons.reset(u32::MAX - 1);

        let r = prod
            .reserve(&cons, 4, Behavior::Fixed, SyncMode::Multi, free_entries(4))
            .unwrap();
        assert_eq!(r.new_head, 2);
        assert_eq!(r.len(), 4);
    }
}
