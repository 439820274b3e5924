//! The read → decode → normalize → map → publish loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use facetrack_expression::{normalize, ExpressionMapper, UnifiedExpressionFrame};
use facetrack_frame::decode_frame;
use facetrack_transport::{TransportError, TransportSource, TransportState};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_RECONNECT_PAUSE;
use crate::error::Result;
use crate::sink::ExpressionSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    ShuttingDown,
}

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A frame reached the sink.
    Published,
    /// The source is not connected yet; the loop paused before retrying.
    Pending,
    /// A malformed frame was dropped.
    Skipped,
    /// The read timed out before a full frame arrived.
    TimedOut,
    /// The connection dropped; the next iteration reconnects.
    ConnectionLost,
    /// Teardown was requested.
    Shutdown,
}

/// Counters kept by the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub published: u64,
    pub skipped: u64,
    pub timeouts: u64,
    pub connection_losses: u64,
    pub connect_failures: u64,
    pub reconnects: u64,
}

/// Drives one frame source and one sink on the calling thread.
pub struct PollLoop<S, K> {
    source: S,
    sink: K,
    mapper: ExpressionMapper,
    frame: UnifiedExpressionFrame,
    shutdown: Arc<AtomicBool>,
    state: LoopState,
    stats: PollStats,
    reconnect_pause: Duration,
    connected_once: bool,
}

impl<S: TransportSource, K: ExpressionSink> PollLoop<S, K> {
    pub fn new(source: S, sink: K, mapper: ExpressionMapper) -> Self {
        Self {
            source,
            sink,
            mapper,
            frame: UnifiedExpressionFrame::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
            stats: PollStats::default(),
            reconnect_pause: DEFAULT_RECONNECT_PAUSE,
            connected_once: false,
        }
    }

    /// Pause between connection attempts while the source is unreachable.
    pub fn with_reconnect_pause(mut self, pause: Duration) -> Self {
        self.reconnect_pause = pause;
        self
    }

    /// Share an existing shutdown flag.
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one iteration.
    ///
    /// Returns `Err` only when the source cannot deliver further frames:
    /// a connect error that is not [retryable](TransportError::is_retryable),
    /// or a read error that left the source faulted. Transient conditions are
    /// reported as [`PollOutcome`]s.
    pub fn poll_once(&mut self) -> facetrack_transport::Result<PollOutcome> {
        if self.shutdown_requested() {
            return Ok(self.shut_down());
        }
        self.state = LoopState::Polling;

        if !self.source.state().is_connected() {
            if let Some(outcome) = self.ensure_connected()? {
                return Ok(outcome);
            }
        }

        let raw = match self.source.read_frame() {
            Ok(raw) => raw,
            Err(_) if self.shutdown_requested() => return Ok(self.shut_down()),
            Err(err) => return self.classify_read_error(err),
        };

        let values = match decode_frame(&raw) {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "dropping undecodable frame");
                self.stats.skipped += 1;
                return Ok(PollOutcome::Skipped);
            }
        };

        self.mapper.map_into(&normalize(values), &mut self.frame);
        self.sink.publish(&self.frame);
        self.stats.published += 1;
        Ok(PollOutcome::Published)
    }

    /// Poll until teardown, then close the source.
    pub fn run(mut self) -> Result<PollStats> {
        info!(
            transport = self.source.transport_name(),
            schema = %self.mapper.schema(),
            "poll loop started"
        );

        let result = loop {
            match self.poll_once() {
                Ok(PollOutcome::Shutdown) => break Ok(()),
                Ok(_) => {}
                Err(err) => break Err(err),
            }
        };

        self.source.close();
        self.state = LoopState::ShuttingDown;
        info!(
            published = self.stats.published,
            skipped = self.stats.skipped,
            connection_losses = self.stats.connection_losses,
            "poll loop stopped"
        );
        result?;
        Ok(self.stats)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn shut_down(&mut self) -> PollOutcome {
        self.state = LoopState::ShuttingDown;
        PollOutcome::Shutdown
    }

    /// `Ok(None)` once connected; `Ok(Some(..))` when this iteration ends here.
    fn ensure_connected(&mut self) -> facetrack_transport::Result<Option<PollOutcome>> {
        match self.source.connect() {
            Ok(()) => {
                if self.connected_once {
                    self.stats.reconnects += 1;
                    info!(transport = self.source.transport_name(), "reconnected");
                }
                self.connected_once = true;
                Ok(None)
            }
            Err(TransportError::Shutdown) => Ok(Some(self.shut_down())),
            Err(err) if err.is_retryable() => {
                self.stats.connect_failures += 1;
                debug!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "companion not reachable; retrying"
                );
                thread::sleep(self.reconnect_pause);
                Ok(Some(PollOutcome::Pending))
            }
            Err(err) => {
                error!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "frame source faulted"
                );
                Err(err)
            }
        }
    }

    fn classify_read_error(
        &mut self,
        err: TransportError,
    ) -> facetrack_transport::Result<PollOutcome> {
        match err {
            TransportError::Shutdown => Ok(self.shut_down()),
            TransportError::TimedOut => {
                self.stats.timeouts += 1;
                Ok(PollOutcome::TimedOut)
            }
            err if err.is_malformed() => {
                warn!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "dropping malformed frame"
                );
                self.stats.skipped += 1;
                Ok(PollOutcome::Skipped)
            }
            err if err.is_retryable() => {
                warn!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "connection lost; reconnecting"
                );
                self.stats.connection_losses += 1;
                Ok(PollOutcome::ConnectionLost)
            }
            err if self.source.state() == TransportState::Faulted => {
                error!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "frame source faulted"
                );
                Err(err)
            }
            err => {
                warn!(
                    transport = self.source.transport_name(),
                    error = %err,
                    "read failed; skipping cycle"
                );
                self.stats.skipped += 1;
                thread::sleep(self.reconnect_pause);
                Ok(PollOutcome::Skipped)
            }
        }
    }
}
