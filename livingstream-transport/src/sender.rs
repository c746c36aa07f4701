//! Emitter side of the wire format, used to drive the installation without
//! the camera process.

use crate::detection::{Detection, SensorPoint};
use crate::error::TransportError;
use log::{info, trace};
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Sends encoded batches to a destination.
pub trait Sender {
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;
}

#[derive(Serialize, Debug)]
struct WireDetection {
    id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    center: Option<[i64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<[f32; 3]>,
}

impl From<&Detection> for WireDetection {
    fn from(detection: &Detection) -> Self {
        match detection.point {
            SensorPoint::Pixel { x, y, depth } => WireDetection {
                id: detection.id,
                center: Some([x.round() as i64, y.round() as i64]),
                depth,
                position: None,
            },
            SensorPoint::Metric(position) => WireDetection {
                id: detection.id,
                center: None,
                depth: None,
                position: Some(position.to_array()),
            },
        }
    }
}

/// Encode detections as a bare JSON array.
///
/// Pixel detections use `center` with whole-pixel coordinates, metric ones use
/// `position`.
pub fn encode_batch(detections: &[Detection]) -> Result<Vec<u8>, TransportError> {
    let wire: Vec<WireDetection> = detections.iter().map(WireDetection::from).collect();
    Ok(serde_json::to_vec(&wire)?)
}

/// Sends each payload as one datagram to a fixed target.
pub struct UdpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSender {
    pub fn new(target: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            TransportError::Configuration("target address did not resolve".to_string())
        })?;
        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        info!("Initialized UdpSender targeting {}", target);
        Ok(UdpSender { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Sender for UdpSender {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let sent = self.socket.send_to(data, self.target)?;
        trace!("Sent {} bytes to {}", sent, self.target);
        Ok(())
    }
}

/// Discards everything; for dry runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSender;

impl Sender for NullSender {
    fn send(&self, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }
}
