//! Cycle counter for cheap timing of hot paths
//!
//! On x86_64 this reads the time-stamp counter. Elsewhere it falls back to
//! nanoseconds since the first call, which is monotonic but slower. Counts
//! are only comparable on the same machine and should be treated as
//! approximate.

#[cfg(not(target_arch = "x86_64"))]
use std::time::Instant;

#[cfg(not(target_arch = "x86_64"))]
lazy_static::lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

/// Current cycle count
#[inline]
pub fn rdtsc() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        EPOCH.elapsed().as_nanos() as u64
    }
}

/// Measures cycles since it was started
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: u64,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { start: rdtsc() }
    }

    /// Cycles since start
    pub fn elapsed(&self) -> u64 {
        rdtsc().saturating_sub(self.start)
    }

    /// Return the cycles since start and restart the count
    pub fn lap(&mut self) -> u64 {
        let now = rdtsc();
        let elapsed = now.saturating_sub(self.start);
        self.start = now;
        elapsed
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = rdtsc();
        let b = rdtsc();
        assert!(b >= a);
    }

    #[test]
    fn test_stopwatch_lap() {
        let mut watch = Stopwatch::start();
        let mut sum = 0u64;
        for i in 0..10_000u64 {
            sum = sum.wrapping_add(i * i);
        }
        assert!(sum > 0);
        let before = watch.start;
        let first = watch.lap();
        assert_eq!(watch.start, before + first);
    }
}
