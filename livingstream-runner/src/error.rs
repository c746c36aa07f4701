use livingstream_config::ConfigError;
use livingstream_transport::TransportError;
use std::time::TryFromFloatSecsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Statistics error: {0}")]
    Stats(String),

    #[error("Invalid {what} of {value} seconds: {source}")]
    Duration {
        what: &'static str,
        value: f32,
        #[source]
        source: TryFromFloatSecsError,
    },
}
