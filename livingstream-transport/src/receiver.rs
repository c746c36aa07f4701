//! Background UDP receive loop.
//!
//! The loop owns the socket, decodes each datagram and publishes the result
//! into an [`InboundChannel`]. It never touches scene state. Shutdown is
//! cooperative: a flag is raised and a wake-up datagram unblocks any receive
//! in progress, with the socket read timeout as a backstop.

use crate::channel::InboundChannel;
use crate::decoder::decode_batch;
use crate::error::TransportError;
use log::{debug, info, trace, warn};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverSettings {
    pub bind_address: String,
    pub port: u16,
    /// Upper bound on how long a blocked receive ignores a shutdown request
    pub poll_interval: Duration,
    pub max_datagram_bytes: usize,
}

impl ReceiverSettings {
    pub fn new(bind_address: impl Into<String>, port: u16) -> Self {
        ReceiverSettings {
            bind_address: bind_address.into(),
            port,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.poll_interval.is_zero() {
            return Err(TransportError::Configuration(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_datagram_bytes == 0 {
            return Err(TransportError::Configuration(
                "receive buffer must hold at least one byte".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReceiverSettings {
    fn default() -> Self {
        ReceiverSettings {
            bind_address: "0.0.0.0".to_string(),
            port: 5005,
            poll_interval: Duration::from_millis(100),
            max_datagram_bytes: 65_507,
        }
    }
}

/// Counters updated by the receive thread
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub(crate) datagrams: AtomicU64,
    pub(crate) published: AtomicU64,
    pub(crate) decode_errors: AtomicU64,
    pub(crate) socket_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStatsSnapshot {
    pub datagrams: u64,
    pub published: u64,
    pub decode_errors: u64,
    pub socket_errors: u64,
}

impl ReceiverStats {
    pub fn snapshot(&self) -> ReceiverStatsSnapshot {
        ReceiverStatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owner of a running receive thread.
///
/// Dropping the handle stops the thread as well; [`ReceiverHandle::shutdown`]
/// additionally reports whether the thread exited cleanly.
pub struct ReceiverHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
    thread: Option<JoinHandle<()>>,
}

/// Bind the socket and start the receive loop on its own thread
pub fn spawn_receiver(
    settings: ReceiverSettings,
    channel: Arc<InboundChannel>,
) -> Result<ReceiverHandle, TransportError> {
    settings.check()?;

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let socket = UdpSocket::bind((settings.bind_address.as_str(), settings.port))
        .map_err(|source| TransportError::Bind { addr, source })?;
    socket.set_read_timeout(Some(settings.poll_interval))?;
    let local_addr = socket.local_addr()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = Arc::new(ReceiverStats::default());

    let thread = {
        let shutdown = shutdown.clone();
        let stats = stats.clone();
        let max_datagram_bytes = settings.max_datagram_bytes;
        thread::Builder::new()
            .name("udp-receiver".to_string())
            .spawn(move || receive_loop(socket, max_datagram_bytes, &channel, &shutdown, &stats))?
    };

    info!("Listening for detections on {}", local_addr);
    Ok(ReceiverHandle {
        local_addr,
        shutdown,
        stats,
        thread: Some(thread),
    })
}

fn receive_loop(
    socket: UdpSocket,
    max_datagram_bytes: usize,
    channel: &InboundChannel,
    shutdown: &AtomicBool,
    stats: &ReceiverStats,
) {
    let mut buf = vec![0u8; max_datagram_bytes];

    while !shutdown.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                handle_datagram(&buf[..len], src, channel, stats);
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => {
                ReceiverStats::bump(&stats.socket_errors);
                warn!("UDP receive error: {}", e);
            }
        }
    }

    debug!("Receive loop stopped");
}

/// Decode one datagram and publish it; failures are counted and logged
pub(crate) fn handle_datagram(
    payload: &[u8],
    src: SocketAddr,
    channel: &InboundChannel,
    stats: &ReceiverStats,
) {
    ReceiverStats::bump(&stats.datagrams);
    trace!("Received {} bytes from {}: {}", payload.len(), src, String::from_utf8_lossy(payload));

    match decode_batch(payload) {
        Ok(batch) => {
            channel.publish(batch);
            ReceiverStats::bump(&stats.published);
        }
        Err(e) => {
            ReceiverStats::bump(&stats.decode_errors);
            warn!("Discarding datagram from {}: {}", src, e);
        }
    }
}

impl ReceiverHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ReceiverStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |thread| !thread.is_finished())
    }

    /// Stop the loop and wait for the thread to exit
    pub fn shutdown(mut self) -> Result<(), TransportError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.shutdown.store(true, Ordering::Release);
        self.wake();
        thread.join().map_err(|_| TransportError::ReceiverPanicked)?;
        info!("Receiver on {} shut down", self.local_addr);
        Ok(())
    }

    /// Unblock a pending receive with an empty datagram
    fn wake(&self) {
        let mut target = self.local_addr;
        if target.ip().is_unspecified() {
            target.set_ip(match target.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        let bind: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::LOCALHOST, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::LOCALHOST, 0).into(),
        };
        let result = UdpSocket::bind(bind).and_then(|socket| socket.send_to(&[], target));
        if let Err(e) = result {
            debug!("Wake-up datagram failed, waiting for read timeout: {}", e);
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Receiver did not stop cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn loopback(poll_interval: Duration) -> ReceiverSettings {
        ReceiverSettings {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            poll_interval,
            max_datagram_bytes: 2048,
        }
    }

    fn wait_for<T>(timeout: Duration, mut probe: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(value) = probe() {
                return Some(value);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn publishes_decoded_datagrams() {
        let channel = Arc::new(InboundChannel::new());
        let receiver = spawn_receiver(loopback(Duration::from_millis(50)), channel.clone()).unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();

        sender
            .send_to(br#"[{"id":1,"center":[320,240],"depth":1.0}]"#, receiver.local_addr())
            .unwrap();

        let batch = wait_for(Duration::from_secs(2), || channel.take()).expect("batch never arrived");
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].id, 1);
        receiver.shutdown().unwrap();
    }

    #[test]
    fn malformed_datagram_keeps_previous_batch() {
        let channel = Arc::new(InboundChannel::new());
        let receiver = spawn_receiver(loopback(Duration::from_millis(50)), channel.clone()).unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = receiver.local_addr();

        sender.send_to(br#"[{"id":2,"center":[1,1]}]"#, target).unwrap();
        wait_for(Duration::from_secs(2), || (receiver.stats().published == 1).then_some(()))
            .expect("first datagram never published");

        sender.send_to(br#"[{"id":3,"center":[1"#, target).unwrap();
        wait_for(Duration::from_secs(2), || (receiver.stats().decode_errors == 1).then_some(()))
            .expect("malformed datagram never counted");

        let batch = channel.take().unwrap();
        assert_eq!(batch.detections[0].id, 2);
        assert!(receiver.is_running());
        assert_eq!(receiver.stats().datagrams, 2);
        receiver.shutdown().unwrap();
    }

    #[test]
    fn shutdown_interrupts_blocked_receive() {
        let channel = Arc::new(InboundChannel::new());
        let receiver = spawn_receiver(loopback(Duration::from_secs(30)), channel.clone()).unwrap();
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        receiver.shutdown().unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(channel.take().is_none());
    }

    #[test]
    fn bind_conflict_is_reported() {
        let holder = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let mut settings = loopback(Duration::from_millis(50));
        settings.port = port;

        let result = spawn_receiver(settings, Arc::new(InboundChannel::new()));
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = spawn_receiver(loopback(Duration::ZERO), Arc::new(InboundChannel::new()));
        assert!(matches!(result, Err(TransportError::Configuration(_))));
    }
}
