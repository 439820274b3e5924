use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand};
use facetrack_expression::SchemaVersion;

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod channels;
pub mod doctor;
pub mod emit;
pub mod envinfo;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a tracking module and print every published frame.
    Run(RunArgs),
    /// Simulate the companion by emitting frames.
    Emit(EmitArgs),
    /// Print the channel table.
    Channels(ChannelsArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Emit(args) => emit::run(args, format),
        Command::Channels(args) => channels::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").args(["config", "shm", "tcp", "udp"])))]
pub struct RunArgs {
    /// Module config file (JSON). Defaults to shared memory when no source is given.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Read from the named shared memory segment.
    #[arg(long, value_name = "NAME")]
    pub shm: Option<String>,
    /// Connect to the companion's TCP stream.
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<SocketAddr>,
    /// Receive companion datagrams on this local address.
    #[arg(long, value_name = "ADDR")]
    pub udp: Option<SocketAddr>,
    /// Directory holding shared memory segments.
    #[arg(long, value_name = "DIR")]
    pub shm_root: Option<PathBuf>,
    /// Lip-shape table (lip-shape-v2, unified-expressions).
    #[arg(long, value_name = "VERSION")]
    pub schema: Option<SchemaVersion>,
    /// Fail initialization unless this companion executable exists.
    #[arg(long, value_name = "PATH")]
    pub companion: Option<PathBuf>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Exit with code 124 when no frame arrives for this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["tcp_listen", "udp", "shm"])))]
pub struct EmitArgs {
    /// Listen on ADDR and stream frames to the first client.
    #[arg(long, value_name = "ADDR")]
    pub tcp_listen: Option<SocketAddr>,
    /// Send one datagram per frame to ADDR.
    #[arg(long, value_name = "ADDR")]
    pub udp: Option<SocketAddr>,
    /// Write frames into the named shared memory segment.
    #[arg(long, value_name = "NAME")]
    pub shm: Option<String>,
    /// Directory holding shared memory segments.
    #[arg(long, value_name = "DIR", requires = "shm")]
    pub shm_root: Option<PathBuf>,
    /// Channel value to emit, repeatable (e.g. --set JAW_DROP=0.5).
    #[arg(long = "set", value_name = "CHANNEL=VALUE")]
    pub set: Vec<String>,
    /// Number of frames to emit.
    #[arg(long, default_value = "1")]
    pub count: u64,
    /// Pause between frames (e.g. 10ms, 1s).
    #[arg(long, default_value = "10ms")]
    pub interval: String,
}

#[derive(Args, Debug, Default)]
pub struct ChannelsArgs {}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    /// Module config file to validate.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Companion executable to look for.
    #[arg(long, value_name = "PATH")]
    pub companion: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
