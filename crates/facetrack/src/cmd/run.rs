use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use facetrack_expression::UnifiedExpressionFrame;
use facetrack_pipeline::{ModuleConfig, TrackingModule, TransportConfig};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{pipeline_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_frame, OutputFormat};

/// Frames buffered between the poll thread and stdout before new ones are dropped.
const PRINT_BACKLOG: usize = 64;

/// How often the printer wakes up to check for Ctrl-C and the idle timeout.
const WAKE_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let config = resolve_config(&args)?;

    let mut module = TrackingModule::initialize(config)
        .map_err(|err| pipeline_error("initialization failed", err))?;
    if let Some(addr) = module.bound_addr() {
        tracing::info!(%addr, "waiting for companion datagrams");
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::sync_channel::<UnifiedExpressionFrame>(PRINT_BACKLOG);
    module
        .start(move |frame: &UnifiedExpressionFrame| {
            let _ = tx.try_send(*frame);
        })
        .map_err(|err| pipeline_error("start failed", err))?;

    let mut printed = 0u64;
    let mut last_frame = Instant::now();
    let mut timed_out = false;

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(WAKE_INTERVAL) {
            Ok(frame) => {
                printed = printed.saturating_add(1);
                print_frame(&frame, printed, format);
                last_frame = Instant::now();
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if idle_timeout.is_some_and(|limit| last_frame.elapsed() >= limit) {
                    timed_out = true;
                    break;
                }
            }
            // The poll thread ended on its own; teardown reports why.
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let stats = module
        .teardown()
        .map_err(|err| pipeline_error("poll loop failed", err))?;
    tracing::info!(
        published = stats.published,
        skipped = stats.skipped,
        connection_losses = stats.connection_losses,
        reconnects = stats.reconnects,
        "tracking stopped"
    );

    if timed_out {
        return Err(CliError::new(
            TIMEOUT,
            format!("no frame received within {:?}", idle_timeout.unwrap_or_default()),
        ));
    }
    Ok(SUCCESS)
}

fn resolve_config(args: &RunArgs) -> CliResult<ModuleConfig> {
    let mut config = if let Some(path) = &args.config {
        ModuleConfig::from_path(path).map_err(|err| {
            pipeline_error(&format!("failed loading {}", path.display()), err)
        })?
    } else if let Some(addr) = args.tcp {
        ModuleConfig::stream(addr)
    } else if let Some(addr) = args.udp {
        ModuleConfig::datagram(addr)
    } else if let Some(name) = &args.shm {
        ModuleConfig::shared_memory(name.clone())
    } else {
        ModuleConfig::default()
    };

    if let Some(root) = &args.shm_root {
        match &mut config.transport {
            TransportConfig::SharedMemory(settings) => settings.root = Some(root.clone()),
            other => {
                return Err(CliError::usage(format!(
                    "--shm-root only applies to shared memory, not {}",
                    other.name()
                )))
            }
        }
    }
    if let Some(schema) = args.schema {
        config.schema = schema;
    }
    if let Some(companion) = &args.companion {
        config.companion_path = Some(companion.clone());
    }

    config
        .validate()
        .map_err(|err| pipeline_error("invalid configuration", err))?;
    Ok(config)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
