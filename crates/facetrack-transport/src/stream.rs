use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use facetrack_frame::{RawFrame, FRAME_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{CloseHandle, TransportSource, TransportState};

/// Configuration for [`StreamSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Address the companion listens on.
    pub addr: SocketAddr,
    /// Upper bound for a single connection attempt.
    pub connect_timeout: Option<Duration>,
    /// Read timeout. `None` blocks until data or disconnect.
    pub read_timeout: Option<Duration>,
}

impl StreamConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Some(Self::DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
        }
    }
}

/// Reads back-to-back frames from a TCP connection to the companion.
///
/// The stream carries no framing: every 252 bytes form one frame. A partial
/// frame is buffered across timed-out reads and dropped on disconnect. When
/// the connection is absent, the next read reconnects first.
pub struct StreamSource {
    config: StreamConfig,
    stream: Option<TcpStream>,
    buf: BytesMut,
    state: TransportState,
    closed: Arc<AtomicBool>,
    /// Clone of the live socket so a close handle can shut it down.
    shared: Arc<Mutex<Option<TcpStream>>>,
}

enum ReadStep {
    Data(usize),
    Eof,
    Retry,
    TimedOut,
    Failed(std::io::Error),
}

impl StreamSource {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            stream: None,
            buf: BytesMut::with_capacity(FRAME_SIZE),
            state: TransportState::Disconnected,
            closed: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Bytes of the current frame received so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn open(&self) -> std::io::Result<TcpStream> {
        let stream = match self.config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&self.config.addr, timeout)?,
            None => TcpStream::connect(self.config.addr)?,
        };
        stream.set_read_timeout(self.config.read_timeout)?;
        Ok(stream)
    }

    fn read_step(&mut self) -> ReadStep {
        let Some(stream) = self.stream.as_mut() else {
            return ReadStep::Eof;
        };
        let mut chunk = [0u8; FRAME_SIZE];
        let wanted = FRAME_SIZE - self.buf.len();
        match stream.read(&mut chunk[..wanted]) {
            Ok(0) => ReadStep::Eof,
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                ReadStep::Data(n)
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => ReadStep::Retry,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                ReadStep::TimedOut
            }
            Err(err) => ReadStep::Failed(err),
        }
    }

    /// Drop the connection and any partial frame after a fault.
    fn drop_connection(&mut self, reason: &str) {
        warn!(
            addr = %self.config.addr,
            buffered = self.buf.len(),
            reason,
            "stream faulted; closing connection"
        );
        self.close();
    }
}

impl TransportSource for StreamSource {
    fn connect(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        if self.stream.is_some() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        let stream = match self.open() {
            Ok(stream) => stream,
            Err(err) => {
                self.state = TransportState::Disconnected;
                return Err(TransportError::Unavailable {
                    target: format!("stream {}", self.config.addr),
                    source: err,
                });
            }
        };

        let handle_copy = match stream.try_clone() {
            Ok(copy) => copy,
            Err(err) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Io(err));
            }
        };
        if let Ok(mut shared) = self.shared.lock() {
            *shared = Some(handle_copy);
        }
        // A close may have raced with the connect; honor it.
        if self.is_closed() {
            let _ = stream.shutdown(Shutdown::Both);
            self.state = TransportState::Disconnected;
            return Err(TransportError::Shutdown);
        }

        self.buf.clear();
        self.stream = Some(stream);
        self.state = TransportState::Connected;
        info!(addr = %self.config.addr, "connected to companion stream");
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame> {
        if self.is_closed() {
            return Err(TransportError::Shutdown);
        }
        if self.stream.is_none() {
            self.connect()?;
        }

        while self.buf.len() < FRAME_SIZE {
            match self.read_step() {
                ReadStep::Data(n) => {
                    debug!(read = n, buffered = self.buf.len(), "stream read");
                }
                ReadStep::Retry => continue,
                ReadStep::TimedOut => return Err(TransportError::TimedOut),
                ReadStep::Eof => {
                    let received = self.buf.len();
                    self.drop_connection("peer closed the stream");
                    if self.is_closed() {
                        return Err(TransportError::Shutdown);
                    }
                    return Err(TransportError::ConnectionLost { received });
                }
                // A reset socket is a lost connection like EOF.
                ReadStep::Failed(err) => {
                    let received = self.buf.len();
                    self.drop_connection(&format!("read failed: {err}"));
                    if self.is_closed() {
                        return Err(TransportError::Shutdown);
                    }
                    return Err(TransportError::ConnectionLost { received });
                }
            }
        }

        let frame = RawFrame::new(self.buf.split().freeze())?;
        Ok(frame)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(addr = %self.config.addr, "closed companion stream");
        }
        if let Ok(mut shared) = self.shared.lock() {
            shared.take();
        }
        self.buf.clear();
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn close_handle(&self) -> CloseHandle {
        let shared = Arc::clone(&self.shared);
        CloseHandle::new(Arc::clone(&self.closed)).with_wake(move || {
            if let Ok(mut shared) = shared.lock() {
                if let Some(stream) = shared.take() {
                    let _ = stream.shutdown(Shutdown::Both);
                }
            }
        })
    }

    fn transport_name(&self) -> &'static str {
        "stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    use facetrack_frame::{decode_frame, Channel, ChannelValues};

    fn frame_with(channel: Channel, value: f32) -> RawFrame {
        let mut values = ChannelValues::zeroed();
        values[channel] = value;
        values.to_raw()
    }

    fn local_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        (listener, addr)
    }

    #[test]
    fn full_frame_then_close_reconnects_on_next_read() {
        let (listener, addr) = local_listener();
        let first = frame_with(Channel::JawDrop, 0.5);
        let second = frame_with(Channel::JawDrop, 0.75);

        let peer = {
            let first = first.clone();
            let second = second.clone();
            thread::spawn(move || {
                let (mut conn, _) = listener.accept().unwrap();
                conn.write_all(first.as_bytes()).unwrap();
                drop(conn);

                let (mut conn, _) = listener.accept().unwrap();
                conn.write_all(second.as_bytes()).unwrap();
                conn
            })
        };

        let mut source = StreamSource::new(StreamConfig::new(addr));
        let frame = source.read_frame().unwrap();
        assert_eq!(frame, first);

        let err = source.read_frame().unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost { received: 0 }));
        assert_eq!(source.state(), TransportState::Disconnected);

        let frame = source.read_frame().unwrap();
        assert_eq!(source.state(), TransportState::Connected);
        let values = decode_frame(&frame).unwrap();
        assert_eq!(values[Channel::JawDrop], 0.75);

        drop(peer.join().unwrap());
    }

    #[test]
    fn partial_frame_is_held_until_remainder_arrives() {
        let (listener, addr) = local_listener();
        let frame = frame_with(Channel::LipsToward, 0.3);
        let (go_tx, go_rx) = mpsc::channel::<()>();

        let peer = {
            let bytes = frame.as_bytes().to_vec();
            thread::spawn(move || {
                let (mut conn, _) = listener.accept().unwrap();
                conn.write_all(&bytes[..100]).unwrap();
                go_rx.recv().unwrap();
                conn.write_all(&bytes[100..]).unwrap();
                conn
            })
        };

        let mut source = StreamSource::new(StreamConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..StreamConfig::new(addr)
        });

        let mut saw_partial = false;
        for _ in 0..100 {
            match source.read_frame() {
                Err(TransportError::TimedOut) if source.buffered() == 100 => {
                    saw_partial = true;
                    break;
                }
                Err(TransportError::TimedOut) => continue,
                other => panic!("no frame may be published from 100 bytes: {other:?}"),
            }
        }
        assert!(saw_partial, "first 100 bytes should be buffered");

        go_tx.send(()).unwrap();
        let received = loop {
            match source.read_frame() {
                Ok(received) => break received,
                Err(TransportError::TimedOut) => continue,
                Err(err) => panic!("unexpected error: {err}"),
            }
        };
        assert_eq!(received, frame);
        assert_eq!(source.buffered(), 0);

        drop(peer.join().unwrap());
    }

    #[test]
    fn partial_frame_then_close_is_connection_lost() {
        let (listener, addr) = local_listener();
        let peer = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(&[0u8; 100]).unwrap();
        });

        let mut source = StreamSource::new(StreamConfig::new(addr));
        let err = source.read_frame().unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost { received: 100 }));
        assert!(err.is_retryable());
        assert_eq!(source.buffered(), 0);
        assert_eq!(source.state(), TransportState::Disconnected);

        peer.join().unwrap();
    }

    #[test]
    fn connect_without_listener_is_unavailable() {
        let (listener, addr) = local_listener();
        drop(listener);

        let mut source = StreamSource::new(StreamConfig::new(addr));
        let err = source.connect().unwrap_err();
        assert!(matches!(err, TransportError::Unavailable { .. }));
        assert_eq!(source.state(), TransportState::Disconnected);
    }

    #[test]
    fn close_handle_unblocks_pending_read() {
        let (listener, addr) = local_listener();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let peer = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            let _ = done_rx.recv();
            drop(conn);
        });

        let mut source = StreamSource::new(StreamConfig::new(addr));
        source.connect().unwrap();
        let handle = source.close_handle();

        let reader = thread::spawn(move || source.read_frame());
        thread::sleep(Duration::from_millis(50));
        handle.close();

        let result = reader.join().unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown)));

        done_tx.send(()).unwrap();
        peer.join().unwrap();
    }
}
