use crate::decoder::DecodeError;
use std::io;
use thiserror::Error;

/// Error types raised while setting up or tearing down transport.
///
/// Per-datagram failures inside the receive loop are logged and counted,
/// never returned.
#[derive(Error, Debug)]
pub enum TransportError {
    /// An I/O error occurred (sending, spawning the receive thread).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The receive socket could not be bound.
    #[error("Failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode detections: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An error occurred due to invalid transport configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Receiver thread panicked")]
    ReceiverPanicked,
}
