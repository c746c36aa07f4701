//! Detection ingestion: the wire format, the single-slot hand-off to the tick
//! loop, and the background receiver that connects them.

pub mod channel;
pub mod decoder;
pub mod detection;
pub mod error;
pub mod receiver;
pub mod sender;

#[cfg(feature = "tokio-runtime")]
pub mod async_receiver;

pub use channel::InboundChannel;
pub use decoder::{decode_batch, DecodeError};
pub use detection::{Batch, Detection, DetectionId, SensorPoint};
pub use error::TransportError;
pub use receiver::{spawn_receiver, ReceiverHandle, ReceiverSettings, ReceiverStats, ReceiverStatsSnapshot};
pub use sender::{encode_batch, NullSender, Sender, UdpSender};

#[cfg(feature = "tokio-runtime")]
pub use async_receiver::{spawn_async_receiver, AsyncReceiver};
