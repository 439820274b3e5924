use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use facetrack_frame::RawFrame;

use crate::error::Result;

/// Connection state of a frame source.
///
/// Only the source itself changes its state; callers observe it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    /// An unrecoverable fault; the source will not deliver further frames.
    Faulted,
}

impl TransportState {
    /// Whether a frame can be read without connecting first.
    pub fn is_connected(self) -> bool {
        self == TransportState::Connected
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportState::Disconnected => "disconnected",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// A source of complete raw frames.
///
/// Implementations block inside [`read_frame`](TransportSource::read_frame)
/// until a frame, an error, or a close arrives; the blocking read is what
/// paces the poll loop.
pub trait TransportSource: Send {
    /// Establish (or re-establish) the underlying connection.
    fn connect(&mut self) -> Result<()>;

    /// Acquire exactly one complete frame.
    fn read_frame(&mut self) -> Result<RawFrame>;

    /// Release the underlying handle. The source may be connected again.
    fn close(&mut self);

    /// Current connection state.
    fn state(&self) -> TransportState;

    /// A handle that closes this source from another thread.
    fn close_handle(&self) -> CloseHandle;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<T: TransportSource + ?Sized> TransportSource for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn read_frame(&mut self) -> Result<RawFrame> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn state(&self) -> TransportState {
        (**self).state()
    }

    fn close_handle(&self) -> CloseHandle {
        (**self).close_handle()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

type WakeFn = dyn Fn() + Send + Sync;

/// Cross-thread teardown handle for a [`TransportSource`].
///
/// Closing marks the source as shut down and, where the backend supports it,
/// unblocks a read that is currently in flight. Once closed, the source
/// answers every call with [`TransportError::Shutdown`](crate::TransportError::Shutdown).
#[derive(Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    wake: Option<Arc<WakeFn>>,
}

impl CloseHandle {
    /// A handle over a source's shutdown flag.
    pub fn new(closed: Arc<AtomicBool>) -> Self {
        Self { closed, wake: None }
    }

    /// Run `wake` once when the handle is first closed.
    pub fn with_wake(mut self, wake: impl Fn() + Send + Sync + 'static) -> Self {
        self.wake = Some(Arc::new(wake));
        self
    }

    /// Close the source. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(wake) = &self.wake {
            wake();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .field("wakes_reader", &self.wake.is_some())
            .finish()
    }
}
