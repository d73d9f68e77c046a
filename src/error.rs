//! Error types and handling for pktring

/// Result type alias for pktring operations
pub type Result<T> = std::result::Result<T, MbufError>;

/// Error types for the ring, mempool and mbuf layers
///
/// Ring full/empty are not errors: `enqueue` hands the item back and
/// `dequeue` returns `None`. Pool exhaustion is an error variant only
/// because `alloc` has nothing to hand back; it is still an expected,
/// recoverable outcome.
#[derive(Debug, thiserror::Error)]
pub enum MbufError {
    /// I/O related errors (config file reads)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Backing memory could not be obtained
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Configuration file could not be parsed
    #[error("Config error: {message}")]
    Config { message: String },

    /// Endpoint ownership rules violated (second single-mode producer, ...)
    #[error("Concurrency error: {message}")]
    Concurrency { message: String },

    /// No free slot left in the mempool
    #[error("Mbuf allocation failed: mempool exhausted")]
    PoolExhausted,

    /// Refcount would drop below zero
    #[error("Refcount underflow: count {current}, delta {delta}")]
    RefcountUnderflow { current: u16, delta: i16 },

    /// Refcount would exceed the counter width
    #[error("Refcount overflow: count {current}, delta {delta}")]
    RefcountOverflow { current: u16, delta: i16 },

    /// Release of a slot whose refcount is already zero
    #[error("Use after free: mbuf slot {slot} released with refcount 0")]
    UseAfterFree { slot: u32 },

    /// Trim longer than the current data window
    #[error("Invalid trim: requested {requested}, data length {available}")]
    InvalidTrim { requested: usize, available: usize },

    /// Not enough head or tail room to grow the data window
    #[error("Insufficient space: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },

    /// Mutation attempted through an mbuf that is not the sole reference
    #[error("Mbuf is shared ({refcnt} references), data is read-only")]
    SharedBuffer { refcnt: u16 },

    #[error("Offset exceeds mbuf data length")]
    BadOffset,

    #[error("Data read exceeds mbuf data length")]
    ReadPastBuffer,

    #[error("Data write exceeds mbuf buffer")]
    WritePastBuffer,
}

impl MbufError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a concurrency error
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create an invalid trim error
    pub fn invalid_trim(requested: usize, available: usize) -> Self {
        Self::InvalidTrim {
            requested,
            available,
        }
    }

    /// Create an insufficient space error
    pub fn insufficient_space(requested: usize, available: usize) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }

    /// True for the refcount/trim misuse class: the caller has a bug,
    /// retrying will not help.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::RefcountUnderflow { .. }
                | Self::RefcountOverflow { .. }
                | Self::UseAfterFree { .. }
                | Self::InvalidTrim { .. }
        )
    }

    /// True for capacity exhaustion, which callers handle with retry, backoff or drop.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}

impl From<std::io::Error> for MbufError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<toml::de::Error> for MbufError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MbufError::memory("Out of memory");
        assert!(matches!(err, MbufError::Memory { .. }));

        let err = MbufError::invalid_trim(10, 4);
        assert!(matches!(err, MbufError::InvalidTrim { requested: 10, available: 4 }));
        assert!(err.is_invariant_violation());

        assert!(MbufError::PoolExhausted.is_exhaustion());
        assert!(!MbufError::PoolExhausted.is_invariant_violation());
    }

    #[test]
    fn test_error_display() {
        let err = MbufError::UseAfterFree { slot: 7 };
        let display = format!("{}", err);
        assert!(display.contains("Use after free"));
        assert!(display.contains("slot 7"));

        let err = MbufError::RefcountUnderflow { current: 1, delta: -2 };
        assert!(format!("{}", err).contains("delta -2"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let err: MbufError = io.into();
        assert!(matches!(err, MbufError::Io { source: Some(_), .. }));
    }
}
