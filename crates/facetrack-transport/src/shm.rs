use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use facetrack_frame::{RawFrame, FRAME_SIZE};
use memmap2::{Mmap, MmapMut};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{CloseHandle, TransportSource, TransportState};

/// Configuration for [`SharedMemorySource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMemoryConfig {
    /// Segment name, as the companion creates it.
    pub name: String,
    /// Directory that holds named segments.
    pub root: PathBuf,
    /// Connection attempts before initialization gives up.
    pub connect_attempts: u32,
    /// Pause between connection attempts.
    pub retry_interval: Duration,
}

impl SharedMemoryConfig {
    /// Segment name used by the companion.
    pub const DEFAULT_NAME: &'static str = "QuestProEyeTracking";
    pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

    /// Config for a named segment under the platform default root.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Filesystem path backing the segment.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.name)
    }
}

impl Default for SharedMemoryConfig {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            root: default_root(),
            connect_attempts: Self::DEFAULT_CONNECT_ATTEMPTS,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// Directory where named shared memory segments live on this platform.
pub fn default_root() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm")
    }

    #[cfg(not(target_os = "linux"))]
    {
        std::env::temp_dir()
    }
}

/// Reads frames from a named shared memory segment.
///
/// The companion rewrites the record at offset 0 in place; every read is a
/// plain copy of the first [`FRAME_SIZE`] bytes and never blocks.
pub struct SharedMemorySource {
    config: SharedMemoryConfig,
    mmap: Option<Mmap>,
    state: TransportState,
    closed: Arc<AtomicBool>,
}

impl SharedMemorySource {
    pub fn new(config: SharedMemoryConfig) -> Self {
        Self {
            config,
            mmap: None,
            state: TransportState::Disconnected,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SharedMemoryConfig {
        &self.config
    }

    /// Connect, retrying on a missing or unsized segment within the configured budget.
    pub fn connect_with_retry(&mut self) -> Result<()> {
        self.connect_with(|_| {})
    }

    /// Like [`connect_with_retry`](Self::connect_with_retry), calling
    /// `on_retry(attempt)` after each failed attempt that will be retried.
    pub fn connect_with(&mut self, mut on_retry: impl FnMut(u32)) -> Result<()> {
        let attempts = self.config.connect_attempts.max(1);
        for attempt in 1..=attempts {
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => {
                    warn!(
                        name = %self.config.name,
                        attempt,
                        attempts,
                        error = %err,
                        "shared memory segment not ready; companion probably not running"
                    );
                    if attempt < attempts {
                        on_retry(attempt);
                        std::thread::sleep(self.config.retry_interval);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(TransportError::AttemptsExhausted {
            target: self.target(),
            attempts,
        })
    }

    fn target(&self) -> String {
        format!("shared memory {}", self.config.name)
    }
}

impl TransportSource for SharedMemorySource {
    fn connect(&mut self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        if self.mmap.is_some() {
            return Ok(());
        }

        self.state = TransportState::Connecting;
        let path = self.config.path();
        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.state = TransportState::Disconnected;
                return Err(TransportError::Unavailable {
                    target: self.target(),
                    source: err,
                });
            }
            Err(err) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Io(err));
            }
        };

        // The companion creates the file before sizing it; until then the
        // segment counts as not there yet.
        let len = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Io(err));
            }
        };
        if len < FRAME_SIZE as u64 {
            self.state = TransportState::Disconnected;
            return Err(TransportError::MappingTooSmall {
                name: self.config.name.clone(),
                len: usize::try_from(len).unwrap_or(usize::MAX),
                required: FRAME_SIZE,
            });
        }

        // SAFETY: the segment is only ever read through this mapping, and the
        // companion keeps it at least one frame long once it has sized it.
        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(err) => {
                self.state = TransportState::Faulted;
                return Err(TransportError::Io(err));
            }
        };
        if mmap.len() < FRAME_SIZE {
            self.state = TransportState::Disconnected;
            return Err(TransportError::MappingTooSmall {
                name: self.config.name.clone(),
                len: mmap.len(),
                required: FRAME_SIZE,
            });
        }

        info!(?path, len = mmap.len(), "mapped shared memory segment");
        self.mmap = Some(mmap);
        self.state = TransportState::Connected;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<RawFrame> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        let mmap = self.mmap.as_ref().ok_or(TransportError::NotConnected)?;
        let frame = RawFrame::new(Bytes::copy_from_slice(&mmap[..FRAME_SIZE]))?;
        Ok(frame)
    }

    fn close(&mut self) {
        if self.mmap.take().is_some() {
            debug!(name = %self.config.name, "unmapped shared memory segment");
        }
        self.state = TransportState::Disconnected;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn close_handle(&self) -> CloseHandle {
        CloseHandle::new(Arc::clone(&self.closed))
    }

    fn transport_name(&self) -> &'static str {
        "shared-memory"
    }
}

/// Writes frames into a named segment the way the companion does.
///
/// Used by the `emit` simulator and by tests.
pub struct SharedMemoryWriter {
    path: PathBuf,
    mmap: MmapMut,
}

impl SharedMemoryWriter {
    /// Create the segment (or reuse an existing one) sized for one frame.
    pub fn create(config: &SharedMemoryConfig) -> Result<Self> {
        let path = config.path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if file.metadata()?.len() < FRAME_SIZE as u64 {
            file.set_len(FRAME_SIZE as u64)?;
        }

        // SAFETY: the file stays open and at least FRAME_SIZE bytes long for
        // the lifetime of the mapping; nothing in this process truncates it.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(?path, "created shared memory segment");
        Ok(Self { path, mmap })
    }

    /// Overwrite the record at offset 0.
    pub fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        self.mmap[..FRAME_SIZE].copy_from_slice(frame.as_bytes());
        self.mmap.flush()?;
        Ok(())
    }

    /// Path backing the segment.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Remove the backing file.
    pub fn remove(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(path)?;
        Ok(())
    }
}
