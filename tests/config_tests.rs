//! Configuration file loading

use std::fs;

use pktring::{
    burst::VirtualPort,
    config::{load_config, RuntimeConfig},
    mbuf::Mempool,
    ring::{Ring, SyncMode},
    MbufError,
};
use tempfile::TempDir;

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pktring.toml");
        fs::write(
            &path,
            r#"
            [mempool]
            name = "rx_pool"
            capacity = 512
            data_room = 2176
            headroom = 128

            [ring]
            name = "workers"
            capacity = 1000
            producer = "multi"
            consumer = "single"

            [port]
            id = 2
            queues = 4
            queue_capacity = 256
            burst_size = 16
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mempool.name, "rx_pool");
        assert_eq!(config.mempool.capacity, 512);
        assert_eq!(config.ring.capacity, 1000);
        assert_eq!(config.ring.consumer, SyncMode::Single);
        assert_eq!(config.port.queues, 4);

        // Every component builds from the loaded values
        let pool = Mempool::new(config.mempool.clone()).unwrap();
        assert_eq!(pool.capacity(), 512);
        let ring: Ring<u32> = Ring::new(config.ring.clone()).unwrap();
        assert_eq!(ring.size(), 1024);
        let port: VirtualPort<u32> = VirtualPort::new(&config.port).unwrap();
        assert_eq!(port.nb_queues(), 4);
        assert_eq!(port.burst_size(), 16);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.toml");
        fs::write(&path, "").unwrap();

        assert_eq!(load_config(&path).unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[ring]\ncapacity = 0\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(MbufError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[mempool\ncapacity = ").unwrap();

        assert!(matches!(load_config(&path), Err(MbufError::Config { .. })));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mode.toml");
        fs::write(&path, "[ring]\nproducer = \"many\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }
}
