//! Ring queue configuration

use serde::{Deserialize, Serialize};

use crate::error::{MbufError, Result};

/// Largest usable capacity: keeps `u32` index differences unambiguous.
pub const RING_MAX_CAPACITY: usize = (1 << 31) - 1;

/// Concurrency assumption for one side of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Exactly one thread uses this side; head moves with a plain store
    Single,
    /// Any number of threads; head moves with a compare-and-swap loop
    Multi,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::Multi
    }
}

impl SyncMode {
    pub fn name(&self) -> &'static str {
        match self {
            SyncMode::Single => "single",
            SyncMode::Multi => "multi",
        }
    }
}

/// Configuration for a [`Ring`](super::Ring)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Name used in logs and `Debug` output
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of entries the ring can hold
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Producer side mode
    #[serde(default)]
    pub producer: SyncMode,
    /// Consumer side mode
    #[serde(default)]
    pub consumer: SyncMode,
}

fn default_name() -> String {
    "ring".to_string()
}

fn default_capacity() -> usize {
    crate::config::DEFAULT_RING_CAPACITY
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            producer: SyncMode::Multi,
            consumer: SyncMode::Multi,
        }
    }
}

impl RingConfig {
    /// Create a MP/MC configuration
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            ..Default::default()
        }
    }

    /// Set the producer mode
    pub fn with_producer(mut self, mode: SyncMode) -> Self {
        self.producer = mode;
        self
    }

    /// Set the consumer mode
    pub fn with_consumer(mut self, mode: SyncMode) -> Self {
        self.consumer = mode;
        self
    }

    /// Single producer, single consumer
    pub fn spsc(self) -> Self {
        self.with_producer(SyncMode::Single)
            .with_consumer(SyncMode::Single)
    }

    /// Storage slots backing `capacity` entries
    pub fn storage_size(&self) -> usize {
        self.capacity.next_power_of_two()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MbufError::invalid_parameter(
                "capacity",
                "Ring capacity must be greater than 0",
            ));
        }

        if self.capacity > RING_MAX_CAPACITY {
            return Err(MbufError::invalid_parameter(
                "capacity",
                format!("Ring capacity cannot exceed {}", RING_MAX_CAPACITY),
            ));
        }

        Ok(())
    }
}
