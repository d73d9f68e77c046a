//! Mempool configuration

use serde::{Deserialize, Serialize};

use crate::{
    config::{DEFAULT_DATA_ROOM, DEFAULT_HEADROOM, DEFAULT_MEMPOOL_CAPACITY, DEFAULT_SLOT_ALIGN},
    error::{MbufError, Result},
    ring::RING_MAX_CAPACITY,
};

const ETHER_HDR_LEN: usize = 14;
const ETHER_CRC_LEN: usize = 4;
const VLAN_HDR_LEN: usize = 4;
const RX_BUF_ALIGN: usize = 1024;

/// Configuration for a [`Mempool`](super::Mempool)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Name of the pool
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of mbufs in the pool
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Buffer bytes per mbuf, headroom included
    #[serde(default = "default_data_room")]
    pub data_room: usize,
    /// Bytes reserved in front of the data on allocation
    #[serde(default = "default_headroom")]
    pub headroom: usize,
    /// Slot alignment inside the arena
    #[serde(default = "default_alignment")]
    pub alignment: usize,
}

fn default_name() -> String {
    "mempool_0".to_string()
}

fn default_capacity() -> usize {
    DEFAULT_MEMPOOL_CAPACITY
}

fn default_data_room() -> usize {
    DEFAULT_DATA_ROOM + DEFAULT_HEADROOM
}

fn default_headroom() -> usize {
    DEFAULT_HEADROOM
}

fn default_alignment() -> usize {
    DEFAULT_SLOT_ALIGN
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            data_room: default_data_room(),
            headroom: default_headroom(),
            alignment: default_alignment(),
        }
    }
}

impl MempoolConfig {
    /// Create a configuration with `capacity` mbufs of `data_room` bytes
    pub fn new(name: impl Into<String>, capacity: usize, data_room: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            data_room,
            ..Default::default()
        }
    }

    /// Size mbufs so one frame of `mtu` bytes fits after the headroom
    pub fn for_mtu(name: impl Into<String>, capacity: usize, mtu: usize) -> Self {
        let frame = mtu + ETHER_HDR_LEN + ETHER_CRC_LEN + 2 * VLAN_HDR_LEN;
        let data_room = round_up(frame, RX_BUF_ALIGN) + DEFAULT_HEADROOM;
        let data_room = data_room.max(default_data_room());
        Self::new(name, capacity, data_room)
    }

    /// Set headroom
    pub fn with_headroom(mut self, headroom: usize) -> Self {
        self.headroom = headroom;
        self
    }

    /// Set slot alignment
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Arena bytes per slot
    pub fn slot_size(&self) -> usize {
        round_up(self.data_room, self.alignment)
    }

    /// Arena bytes for the whole pool
    pub fn total_memory_required(&self) -> usize {
        self.slot_size() * self.capacity
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MbufError::invalid_parameter(
                "capacity",
                "Mempool capacity cannot be zero",
            ));
        }

        if self.capacity > RING_MAX_CAPACITY {
            return Err(MbufError::invalid_parameter(
                "capacity",
                format!("Mempool capacity cannot exceed {}", RING_MAX_CAPACITY),
            ));
        }

        if self.data_room == 0 {
            return Err(MbufError::invalid_parameter(
                "data_room",
                "Data room cannot be zero",
            ));
        }

        if self.headroom > self.data_room {
            return Err(MbufError::invalid_parameter(
                "headroom",
                format!(
                    "Headroom {} exceeds data room {}",
                    self.headroom, self.data_room
                ),
            ));
        }

        if self.alignment == 0 || !self.alignment.is_power_of_two() {
            return Err(MbufError::invalid_parameter(
                "alignment",
                "Alignment must be a power of two",
            ));
        }

        self.slot_size()
            .checked_mul(self.capacity)
            .ok_or_else(|| MbufError::invalid_parameter("capacity", "Pool size overflows usize"))?;

        Ok(())
    }
}

/// Rounds `n` up to the nearest multiple of `s`
fn round_up(n: usize, s: usize) -> usize {
    n.div_ceil(s) * s
}
