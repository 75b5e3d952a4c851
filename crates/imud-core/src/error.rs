//! Error types for the imud daemon.
//!
//! A single `ImudError` enum consolidates the failure modes that can cross
//! crate boundaries. The taxonomy follows the pipeline's failure policy:
//! decode and overflow problems are per-item (skip and count, never fatal),
//! configuration problems are reported to the control-plane caller with no
//! state change, and startup problems abort daemon construction.

use thiserror::Error;

/// Convenience alias for results using the daemon error type.
pub type ImudResult<T> = std::result::Result<T, ImudError>;

/// Primary error type for the daemon.
#[derive(Error, Debug)]
pub enum ImudError {
    /// Configuration file parsing failed.
    ///
    /// Permanent - requires fixing the configuration file.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values parsed but failed semantic validation
    /// (e.g. a zero channel capacity).
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed (event sink write, config file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A raw hardware record could not be decoded into a typed sample.
    ///
    /// Transient and per-record: the acquisition loop logs it, counts it
    /// and moves on to the next record.
    #[error("Malformed raw record: unknown channel {channel:#04x}")]
    MalformedRecord { channel: u8 },

    /// A control-plane call named a virtual sensor id outside the
    /// configured slot range. No state was changed.
    #[error("Unknown virtual sensor id: {0}")]
    UnknownSensor(i32),

    /// The shared channel was closed while an operation needed it open.
    #[error("Shared channel closed")]
    ChannelClosed,

    /// A pipeline thread could not be spawned at startup.
    ///
    /// Fatal - daemon construction is aborted and the error propagated.
    #[error("Failed to spawn {thread} thread: {source}")]
    ThreadSpawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImudError::MalformedRecord { channel: 0xee };
        assert_eq!(err.to_string(), "Malformed raw record: unknown channel 0xee");
    }

    #[test]
    fn test_unknown_sensor_display() {
        let err = ImudError::UnknownSensor(77);
        assert!(err.to_string().contains("77"));
    }
}
