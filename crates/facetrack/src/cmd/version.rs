use facetrack_expression::SchemaVersion;
use facetrack_frame::{CHANNEL_COUNT, FRAME_SIZE};
use facetrack_pipeline::TrackingModule;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("facetrack {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let caps = TrackingModule::SUPPORTED;
    println!("name: facetrack");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("FACETRACK_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("frame: {CHANNEL_COUNT} channels, {FRAME_SIZE} bytes");
    println!(
        "schemas: {}, {}",
        SchemaVersion::LipShapeV2,
        SchemaVersion::UnifiedExpressions
    );
    println!("capabilities: eye={}, expression={}", caps.eye, caps.expression);
    println!("features: pipeline=true, cli=true");

    Ok(SUCCESS)
}
