//! Task-based variant of the receive loop for hosts that already run tokio.

use crate::channel::InboundChannel;
use crate::error::TransportError;
use crate::receiver::{handle_datagram, ReceiverSettings, ReceiverStats, ReceiverStatsSnapshot};
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct AsyncReceiver {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    stats: Arc<ReceiverStats>,
    task: JoinHandle<()>,
}

/// Bind the socket and spawn the receive loop onto the current runtime.
///
/// `poll_interval` is unused here: shutdown races the pending receive directly.
pub async fn spawn_async_receiver(
    settings: ReceiverSettings,
    channel: Arc<InboundChannel>,
) -> Result<AsyncReceiver, TransportError> {
    if settings.max_datagram_bytes == 0 {
        return Err(TransportError::Configuration(
            "receive buffer must hold at least one byte".to_string(),
        ));
    }

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let socket = UdpSocket::bind((settings.bind_address.as_str(), settings.port))
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;
    let local_addr = socket.local_addr()?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let stats = Arc::new(ReceiverStats::default());
    let task_stats = stats.clone();
    let max_datagram_bytes = settings.max_datagram_bytes;

    let task = tokio::spawn(async move {
        let mut buf = vec![0u8; max_datagram_bytes];
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => handle_datagram(&buf[..len], src, &channel, &task_stats),
                    Err(e) => {
                        ReceiverStats::bump(&task_stats.socket_errors);
                        warn!("UDP receive error: {}", e);
                    }
                },
            }
        }
        debug!("Async receive loop stopped");
    });

    info!("Listening for detections on {} (async)", local_addr);
    Ok(AsyncReceiver {
        local_addr,
        shutdown_tx,
        stats,
        task,
    })
}

impl AsyncReceiver {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ReceiverStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn shutdown(self) -> Result<(), TransportError> {
        // The task may already be gone, in which case nobody is listening
        let _ = self.shutdown_tx.send(true);
        self.task.await.map_err(|_| TransportError::ReceiverPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn receives_and_shuts_down() {
        let channel = Arc::new(InboundChannel::new());
        let settings = ReceiverSettings::new("127.0.0.1", 0);
        let receiver = spawn_async_receiver(settings, channel.clone()).await.unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(br#"[{"id":4,"position":[1.0,0.0,2.0]}]"#, receiver.local_addr())
            .await
            .unwrap();

        let mut batch = None;
        for _ in 0..200 {
            batch = channel.take();
            if batch.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(batch.unwrap().detections[0].id, 4);
        assert_eq!(receiver.stats().published, 1);

        tokio::time::timeout(Duration::from_secs(2), receiver.shutdown())
            .await
            .expect("shutdown hung")
            .unwrap();
    }
}
