use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use facetrack_expression::ExpressionMapper;
use facetrack_transport::{
    CloseHandle, DatagramSource, SharedMemorySource, StreamSource, TransportSource,
};
use tracing::{error, info};

use crate::config::{ModuleConfig, TransportConfig};
use crate::error::{PipelineError, Result};
use crate::poll::{PollLoop, PollStats};
use crate::sink::ExpressionSink;

/// Name of the thread that runs the poll loop.
pub const POLL_THREAD_NAME: &str = "facetrack-poll";

/// What a module can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub eye: bool,
    pub expression: bool,
}

/// One tracking module: a configured frame source plus the thread polling it.
///
/// Lifecycle: [`initialize`](Self::initialize), [`start`](Self::start),
/// [`teardown`](Self::teardown). Dropping a started module tears it down.
pub struct TrackingModule {
    config: ModuleConfig,
    source: Option<Box<dyn TransportSource>>,
    close: CloseHandle,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<PollStats>>>,
    transport: &'static str,
    bound_addr: Option<SocketAddr>,
}

impl TrackingModule {
    pub const SUPPORTED: Capabilities = Capabilities {
        eye: true,
        expression: true,
    };

    /// Validate the config and open the frame source.
    ///
    /// Shared memory is retried within its attempt budget and datagram
    /// sockets are bound here; a stream source connects on the first poll.
    pub fn initialize(config: ModuleConfig) -> Result<Self> {
        config.validate()?;

        if let Some(path) = &config.companion_path {
            if !path.is_file() {
                error!(path = %path.display(), "companion executable not found");
                return Err(PipelineError::CompanionMissing(path.clone()));
            }
        }

        let mut bound_addr = None;
        let source: Box<dyn TransportSource> = match &config.transport {
            TransportConfig::SharedMemory(settings) => {
                let mut source = SharedMemorySource::new(settings.to_transport());
                source.connect_with_retry()?;
                Box::new(source)
            }
            TransportConfig::Stream(settings) => {
                Box::new(StreamSource::new(settings.to_transport()))
            }
            TransportConfig::Datagram(settings) => {
                let mut source = DatagramSource::new(settings.to_transport());
                source.connect()?;
                bound_addr = source.local_addr();
                Box::new(source)
            }
        };

        let transport = source.transport_name();
        info!(transport, schema = %config.schema, "tracking module initialized");

        Ok(Self {
            close: source.close_handle(),
            source: Some(source),
            shutdown: Arc::new(AtomicBool::new(false)),
            worker: None,
            transport,
            bound_addr,
            config,
        })
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport
    }

    /// Local address of a datagram module's socket.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.bound_addr
    }

    /// Whether the poll thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Spawn the poll thread publishing into `sink`.
    pub fn start<K>(&mut self, sink: K) -> Result<()>
    where
        K: ExpressionSink + 'static,
    {
        let source = self.source.take().ok_or(PipelineError::AlreadyStarted)?;
        let poll = PollLoop::new(source, sink, ExpressionMapper::new(self.config.schema))
            .with_reconnect_pause(self.config.reconnect_pause())
            .with_shutdown_flag(Arc::clone(&self.shutdown));

        let worker = thread::Builder::new()
            .name(POLL_THREAD_NAME.to_string())
            .spawn(move || poll.run())?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Close the source, stop the poll thread and return its counters.
    pub fn teardown(mut self) -> Result<PollStats> {
        self.stop()
    }

    fn stop(&mut self) -> Result<PollStats> {
        // Closing first unblocks a read in flight.
        self.close.close();
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(mut source) = self.source.take() {
            source.close();
        }

        let stats = match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| PipelineError::Thread("poll thread panicked".to_string()))??,
            None => PollStats::default(),
        };
        info!(transport = self.transport, "tracking module torn down");
        Ok(stats)
    }
}

impl Drop for TrackingModule {
    fn drop(&mut self) {
        if self.worker.is_some() || self.source.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::{TcpListener, UdpSocket};
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use facetrack_expression::{UnifiedExpressionFrame, UnifiedShape};
    use facetrack_frame::{Channel, ChannelValues, RawFrame};
    use facetrack_transport::{SharedMemoryWriter, TransportError};

    use crate::config::SharedMemorySettings;
    use crate::sink::{channel_sink, SharedExpressionFrame};

    const WAIT: Duration = Duration::from_secs(5);

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "facetrack-module-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn shm_config(root: &std::path::Path, attempts: u32) -> ModuleConfig {
        ModuleConfig::new(TransportConfig::SharedMemory(SharedMemorySettings {
            name: "module-test".to_string(),
            root: Some(root.to_path_buf()),
            connect_attempts: attempts,
            retry_interval_ms: 1,
        }))
    }

    fn jaw_frame(value: f32) -> RawFrame {
        let mut values = ChannelValues::zeroed();
        values[Channel::JawDrop] = value;
        values.to_raw()
    }

    fn jaw(frame: &UnifiedExpressionFrame) -> f32 {
        frame.shapes.get(UnifiedShape::JawOpen)
    }

    #[test]
    fn missing_companion_fails_initialization() {
        let mut config = ModuleConfig::stream("127.0.0.1:13191".parse().unwrap());
        config.companion_path = Some(PathBuf::from("/nonexistent/facetrack/companion"));

        let err = TrackingModule::initialize(config).err().expect("init should fail");
        assert!(matches!(err, PipelineError::CompanionMissing(_)));
    }

    #[test]
    fn invalid_config_fails_initialization() {
        let config = ModuleConfig::shared_memory("");
        let err = TrackingModule::initialize(config).err().expect("init should fail");
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn missing_segment_exhausts_retry_budget() {
        let root = temp_root("no-shm");
        let err = TrackingModule::initialize(shm_config(&root, 2))
            .err()
            .expect("init should fail");

        assert!(matches!(
            err,
            PipelineError::Transport(TransportError::AttemptsExhausted { attempts: 2, .. })
        ));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn shared_memory_frames_reach_shared_sink() {
        let root = temp_root("shm");
        let config = shm_config(&root, 1);
        let TransportConfig::SharedMemory(settings) = &config.transport else {
            unreachable!();
        };
        let mut writer = SharedMemoryWriter::create(&settings.to_transport()).unwrap();
        writer.write_frame(&jaw_frame(0.5)).unwrap();

        let mut module = TrackingModule::initialize(config).unwrap();
        assert_eq!(module.transport_name(), "shared-memory");
        let shared = SharedExpressionFrame::new();
        module.start(shared.clone()).unwrap();

        let deadline = Instant::now() + WAIT;
        while jaw(&shared.latest()) != 0.5 {
            assert!(Instant::now() < deadline, "frame never published");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(module.is_running());

        let stats = module.teardown().unwrap();
        assert!(stats.published >= 1);

        writer.remove().unwrap();
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn datagram_module_skips_malformed_packets() {
        let mut module =
            TrackingModule::initialize(ModuleConfig::datagram("127.0.0.1:0".parse().unwrap()))
                .unwrap();
        let addr = module.bound_addr().expect("datagram module should be bound");
        let (tx, rx) = mpsc::channel();
        module.start(channel_sink(tx)).unwrap();

        let companion = UdpSocket::bind("127.0.0.1:0").unwrap();
        companion.send_to(jaw_frame(0.5).as_bytes(), addr).unwrap();
        assert_eq!(jaw(&rx.recv_timeout(WAIT).unwrap()), 0.5);

        companion.send_to(&[0u8; 10], addr).unwrap();
        companion.send_to(jaw_frame(0.25).as_bytes(), addr).unwrap();
        assert_eq!(jaw(&rx.recv_timeout(WAIT).unwrap()), 0.25);

        let stats = module.teardown().unwrap();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn stream_module_reconnects_after_companion_restart() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let companion = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(jaw_frame(0.5).as_bytes()).unwrap();
            drop(conn);

            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(jaw_frame(0.75).as_bytes()).unwrap();
            let _ = done_rx.recv();
        });

        let mut module = TrackingModule::initialize(ModuleConfig::stream(addr)).unwrap();
        let (tx, rx) = mpsc::channel();
        module.start(channel_sink(tx)).unwrap();

        assert_eq!(jaw(&rx.recv_timeout(WAIT).unwrap()), 0.5);
        assert_eq!(jaw(&rx.recv_timeout(WAIT).unwrap()), 0.75);

        let stats = module.teardown().unwrap();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.connection_losses, 1);
        assert_eq!(stats.reconnects, 1);

        done_tx.send(()).unwrap();
        companion.join().unwrap();
    }

    #[test]
    fn teardown_while_companion_absent_is_clean() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut module = TrackingModule::initialize(ModuleConfig::stream(addr)).unwrap();
        module.start(|_: &UnifiedExpressionFrame| {}).unwrap();
        thread::sleep(Duration::from_millis(50));

        let stats = module.teardown().unwrap();
        assert_eq!(stats.published, 0);
        assert!(stats.connect_failures >= 1);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut module =
            TrackingModule::initialize(ModuleConfig::datagram("127.0.0.1:0".parse().unwrap()))
                .unwrap();
        module.start(|_: &UnifiedExpressionFrame| {}).unwrap();

        let err = module.start(|_: &UnifiedExpressionFrame| {}).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyStarted));
        module.teardown().unwrap();
    }

    #[test]
    fn teardown_without_start_returns_empty_stats() {
        let module =
            TrackingModule::initialize(ModuleConfig::datagram("127.0.0.1:0".parse().unwrap()))
                .unwrap();
        assert!(!module.is_running());
        assert_eq!(module.teardown().unwrap(), PollStats::default());
        assert!(TrackingModule::SUPPORTED.eye && TrackingModule::SUPPORTED.expression);
    }
}
