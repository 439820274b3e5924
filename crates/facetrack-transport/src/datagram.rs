use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use facetrack_frame::{FrameError, RawFrame, FRAME_SIZE};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{CloseHandle, TransportSource, TransportState};
use crate::DEFAULT_PORT;

/// Receive buffer size; anything longer than a frame is malformed anyway.
const RECV_BUFFER_SIZE: usize = 2048;

/// Configuration for [`DatagramSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramConfig {
    /// Local address to receive frames on.
    pub bind_addr: SocketAddr,
    /// Read timeout. `None` blocks until a packet arrives.
    pub read_timeout: Option<Duration>,
}

impl DatagramConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            read_timeout: None,
        }
    }
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self::new(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            DEFAULT_PORT,
        ))
    }
}

/// Receives one frame per UDP packet.
///
/// No ordering, no retransmission and no reconnection: a lost packet means the
/// next read waits for the next one. Packets that are not exactly one frame
/// long are reported as malformed and the socket keeps listening.
pub struct DatagramSource {
    config: DatagramConfig,
    socket: Option<UdpSocket>,
    buf: Box<[u8; RECV_BUFFER_SIZE]>,
    state: TransportState,
    closed: Arc<AtomicBool>,
    wake_addr: Arc<Mutex<Option<SocketAddr>>>,
}

impl DatagramSource {
    pub fn new(config: DatagramConfig) -> Self {
        Self {
            config,
            socket: None,
            buf: Box::new([0u8; RECV_BUFFER_SIZE]),
            state: TransportState::Disconnected,
            closed: Arc::new(AtomicBool::new(false)),
            wake_addr: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &DatagramConfig {
        &self.config
    }

    /// Address actually bound, once connected.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket
            .as_ref()
            .and_then(|socket| socket.local_addr().ok())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Where a wake-up packet must go to reach a socket bound to `bound`.
fn reachable_addr(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}

fn send_wake(target: SocketAddr) -> std::io::Result<()> {
    let any = match target {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(any)?;
    socket.send_to(&[], target)?;
    Ok(())
}

impl TransportSource for DatagramSource {
    fn connect(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        if self.socket.is_some() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        let socket = match UdpSocket::bind(self.config.bind_addr) {
            Ok(socket) => socket,
            Err(source) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Bind {
                    addr: self.config.bind_addr,
                    source,
                });
            }
        };
        let local = match socket
            .set_read_timeout(self.config.read_timeout)
            .and_then(|()| socket.local_addr())
        {
            Ok(local) => local,
            Err(err) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Io(err));
            }
        };
        if let Ok(mut wake) = self.wake_addr.lock() {
            *wake = Some(reachable_addr(local));
        }

        info!(addr = %local, "listening for companion datagrams");
        self.socket = Some(socket);
        self.state = TransportState::Connected;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;

        loop {
            let received = socket.recv_from(&mut self.buf[..]);
            if self.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Shutdown);
            }

            match received {
                Ok((len, from)) if len != FRAME_SIZE => {
                    debug!(%from, len, "discarding datagram of wrong size");
                    return Err(TransportError::Malformed(FrameError::MalformedFrame {
                        len,
                        expected: FRAME_SIZE,
                    }));
                }
                Ok(_) => {
                    let frame = RawFrame::new(Bytes::copy_from_slice(&self.buf[..FRAME_SIZE]))?;
                    return Ok(frame);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::TimedOut);
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(addr = %self.config.bind_addr, "closed datagram socket");
        }
        if let Ok(mut wake) = self.wake_addr.lock() {
            wake.take();
        }
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn close_handle(&self) -> CloseHandle {
        let wake_addr = Arc::clone(&self.wake_addr);
        CloseHandle::new(Arc::clone(&self.closed)).with_wake(move || {
            let target = wake_addr.lock().ok().and_then(|addr| *addr);
            if let Some(target) = target {
                if let Err(err) = send_wake(target) {
                    debug!(%target, error = %err, "failed to wake datagram reader");
                }
            }
        })
    }

    fn transport_name(&self) -> &'static str {
        "datagram"
    }
}
