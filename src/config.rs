//! Runtime configuration and default constants
//!
//! A configuration file is TOML with one table per component; every field is
//! optional:
//!
//! ```toml
//! [mempool]
//! name = "rx_pool"
//! capacity = 8192
//!
//! [ring]
//! name = "workers"
//! capacity = 4096
//! producer = "multi"
//! consumer = "single"
//!
//! [port]
//! queues = 4
//! burst_size = 32
//! ```

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    burst::PortConfig,
    error::{MbufError, Result},
    mbuf::MempoolConfig,
    ring::RingConfig,
};

/// Default ring capacity
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// Default number of mbufs per pool
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 8192;

/// Default packet bytes per mbuf, not counting headroom
pub const DEFAULT_DATA_ROOM: usize = 2048;

/// Default bytes reserved in front of packet data
pub const DEFAULT_HEADROOM: usize = 128;

/// Default slot alignment (one cache line)
pub const DEFAULT_SLOT_ALIGN: usize = 64;

/// Default RX burst size
pub const DEFAULT_BURST_SIZE: usize = 32;

/// Default entries per virtual port queue
pub const DEFAULT_PORT_QUEUE_CAPACITY: usize = 1024;

/// Runtime configuration options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Packet buffer pool
    #[serde(default)]
    pub mempool: MempoolConfig,
    /// Work ring between pipeline stages
    #[serde(default)]
    pub ring: RingConfig,
    /// Loopback port
    #[serde(default)]
    pub port: PortConfig,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        self.mempool.validate()?;
        self.ring.validate()?;
        self.port.validate()?;

        if self.port.queue_capacity > self.mempool.capacity {
            log::warn!(
                "Port queues hold {} entries but mempool {} only has {} mbufs",
                self.port.queue_capacity,
                self.mempool.name,
                self.mempool.capacity
            );
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MbufError::config(e.to_string()))
    }
}

/// Loads a configuration file from `path`
///
/// Missing tables and fields take their defaults. The result is validated
/// before it is returned.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path)
        .map_err(|e| MbufError::from_io(e, &format!("reading {}", path.display())))?;
    let config: RuntimeConfig = toml::from_str(&config_str)?;

    config.validate()?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Default configuration, not tuned for anything
pub fn default_config() -> RuntimeConfig {
    RuntimeConfig::default()
}
