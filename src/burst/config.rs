//! Virtual port configuration

use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_BURST_SIZE, DEFAULT_PORT_QUEUE_CAPACITY},
    error::{MbufError, Result},
    ring::RING_MAX_CAPACITY,
};

/// Configuration for a [`VirtualPort`](super::VirtualPort)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port identifier
    #[serde(default)]
    pub id: u16,
    /// Number of queue pairs
    #[serde(default = "default_queues")]
    pub queues: u16,
    /// Entries per queue ring
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Packets requested per RX poll
    #[serde(default = "default_burst_size")]
    pub burst_size: usize,
}

fn default_queues() -> u16 {
    1
}

fn default_queue_capacity() -> usize {
    DEFAULT_PORT_QUEUE_CAPACITY
}

fn default_burst_size() -> usize {
    DEFAULT_BURST_SIZE
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            id: 0,
            queues: default_queues(),
            queue_capacity: default_queue_capacity(),
            burst_size: default_burst_size(),
        }
    }
}

impl PortConfig {
    pub fn new(id: u16, queues: u16) -> Self {
        Self {
            id,
            queues,
            ..Default::default()
        }
    }

    /// Set entries per queue
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the RX burst size
    pub fn with_burst_size(mut self, burst_size: usize) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Burst size actually used: never more than a queue can hold
    pub fn effective_burst_size(&self) -> usize {
        if self.burst_size > self.queue_capacity {
            log::warn!(
                "Port {}: burst size {} exceeds queue capacity {}, clamping",
                self.id,
                self.burst_size,
                self.queue_capacity
            );
            self.queue_capacity
        } else {
            self.burst_size
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.queues == 0 {
            return Err(MbufError::invalid_parameter(
                "queues",
                "Port needs at least one queue",
            ));
        }

        if self.queue_capacity == 0 || self.queue_capacity > RING_MAX_CAPACITY {
            return Err(MbufError::invalid_parameter(
                "queue_capacity",
                format!("Queue capacity must be in 1..={}", RING_MAX_CAPACITY),
            ));
        }

        if self.burst_size == 0 {
            return Err(MbufError::invalid_parameter(
                "burst_size",
                "Burst size cannot be zero",
            ));
        }

        Ok(())
    }
}
