use std::fmt;
use std::io;

use facetrack_frame::FrameError;
use facetrack_pipeline::PipelineError;
use facetrack_transport::TransportError;

// Process exit codes; 64 and 124 match sysexits and timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::UnknownChannel(_) => CliError::usage(format!("{context}: {err}")),
        FrameError::MalformedFrame { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. } => match source.kind() {
            io::ErrorKind::PermissionDenied => {
                CliError::new(PERMISSION_DENIED, format!("{context}: {source}"))
            }
            _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {source}")),
        },
        TransportError::Io(source) => io_error(context, source),
        TransportError::Malformed(err) => frame_error(context, err),
        TransportError::TimedOut => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Transport(err) => transport_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::Config(_) => CliError::usage(format!("{context}: {err}")),
        PipelineError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PipelineError::Io(source) => io_error(context, source),
        PipelineError::CompanionMissing(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn pipeline_errors_map_to_exit_codes() {
        let config = pipeline_error("init", PipelineError::Config("bad".to_string()));
        assert_eq!(config.code, USAGE);

        let missing = pipeline_error("init", PipelineError::CompanionMissing(PathBuf::from("/x")));
        assert_eq!(missing.code, FAILURE);

        let exhausted = pipeline_error(
            "init",
            PipelineError::Transport(TransportError::AttemptsExhausted {
                target: "shared memory x".to_string(),
                attempts: 5,
            }),
        );
        assert_eq!(exhausted.code, TRANSPORT_ERROR);
        assert!(exhausted.message.starts_with("init: "));
    }

    #[test]
    fn bind_conflict_is_transport_error() {
        let err = transport_error(
            "bind",
            TransportError::Bind {
                addr: "127.0.0.1:13191".parse().unwrap(),
                source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn unknown_channel_is_usage_error() {
        let err = frame_error("--set", FrameError::UnknownChannel("NOPE".to_string()));
        assert_eq!(err.code, USAGE);
    }
}
