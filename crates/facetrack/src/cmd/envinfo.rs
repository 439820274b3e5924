use facetrack_expression::SchemaVersion;
use facetrack_frame::{CHANNEL_COUNT, FRAME_SIZE};
use facetrack_transport::{SharedMemoryConfig, DEFAULT_PORT};
use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json_line, OutputFormat};

/// Where each transport looks for the companion by default.
#[derive(Serialize)]
struct TransportDefaults {
    shm_path: String,
    datagram_port: u16,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    schema_id: &'static str,
    version: &'static str,
    target: &'static str,
    features: Vec<&'static str>,
    frame_size: usize,
    channels: usize,
    schemas: [SchemaVersion; 2],
    defaults: TransportDefaults,
    rust_log: Option<String>,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let shm = SharedMemoryConfig::default();
    let output = EnvInfoOutput {
        schema_id: "https://schemas.facetrack.dev/cli/v1/envinfo.schema.json",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("FACETRACK_BUILD_TARGET").unwrap_or("unknown"),
        features: active_features(),
        frame_size: FRAME_SIZE,
        channels: CHANNEL_COUNT,
        schemas: [SchemaVersion::LipShapeV2, SchemaVersion::UnifiedExpressions],
        defaults: TransportDefaults {
            shm_path: shm.path().display().to_string(),
            datagram_port: DEFAULT_PORT,
        },
        rust_log: std::env::var("RUST_LOG").ok(),
    };

    match format {
        OutputFormat::Json => print_json_line(&output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("facetrack {} ({})", output.version, output.target);
            println!("  features:  {}", output.features.join(", "));
            println!("  frame:     {} channels, {} bytes", output.channels, output.frame_size);
            println!("  schemas:   {}, {}", output.schemas[0], output.schemas[1]);
            println!("  shm:       {}", output.defaults.shm_path);
            println!("  udp port:  {}", output.defaults.datagram_port);
            println!(
                "  RUST_LOG:  {}",
                output.rust_log.as_deref().unwrap_or("(not set)")
            );
        }
        OutputFormat::Raw => println!("{}", output.version),
    }
    Ok(SUCCESS)
}

pub(crate) fn active_features() -> Vec<&'static str> {
    let mut features = Vec::new();
    if cfg!(feature = "pipeline") {
        features.push("pipeline");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    features
}
