use std::io::Write;
use std::net::{TcpListener, UdpSocket};
use std::thread;
use std::time::Duration;

use facetrack_frame::{Channel, ChannelValues, RawFrame};
use facetrack_transport::{default_root, SharedMemoryConfig, SharedMemoryWriter};
use serde::Serialize;

use crate::cmd::{parse_duration, EmitArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json_line, OutputFormat};

#[derive(Debug, Serialize)]
struct EmitOutput {
    schema_id: &'static str,
    transport: &'static str,
    target: String,
    frames: u64,
}

pub fn run(args: EmitArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let frame = build_frame(&args.set)?;

    let output = if let Some(addr) = args.tcp_listen {
        let listener =
            TcpListener::bind(addr).map_err(|err| io_error(&format!("bind {addr} failed"), err))?;
        let local = listener
            .local_addr()
            .map_err(|err| io_error("local address lookup failed", err))?;
        tracing::info!(addr = %local, "waiting for a stream client");

        let (mut conn, peer) = listener
            .accept()
            .map_err(|err| io_error("accept failed", err))?;
        tracing::info!(%peer, "stream client connected");
        let frames = emit_frames(
            args.count,
            interval,
            |frame| conn.write_all(frame.as_bytes()),
            &frame,
        )
        .map_err(|err| io_error("stream write failed", err))?;
        EmitOutput {
            schema_id: EMIT_SCHEMA_ID,
            transport: "stream",
            target: peer.to_string(),
            frames,
        }
    } else if let Some(addr) = args.udp {
        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket =
            UdpSocket::bind(bind_addr).map_err(|err| io_error("datagram bind failed", err))?;
        let frames = emit_frames(
            args.count,
            interval,
            |frame| socket.send_to(frame.as_bytes(), addr).map(|_| ()),
            &frame,
        )
        .map_err(|err| io_error(&format!("send to {addr} failed"), err))?;
        EmitOutput {
            schema_id: EMIT_SCHEMA_ID,
            transport: "datagram",
            target: addr.to_string(),
            frames,
        }
    } else if let Some(name) = &args.shm {
        let config = SharedMemoryConfig {
            root: args.shm_root.clone().unwrap_or_else(default_root),
            ..SharedMemoryConfig::new(name.clone())
        };
        let mut writer = SharedMemoryWriter::create(&config)
            .map_err(|err| transport_error("shared memory create failed", err))?;
        let frames = emit_frames(args.count, interval, |frame| writer.write_frame(frame), &frame)
            .map_err(|err| transport_error("shared memory write failed", err))?;
        EmitOutput {
            schema_id: EMIT_SCHEMA_ID,
            transport: "shared-memory",
            target: writer.path().display().to_string(),
            frames,
        }
    } else {
        return Err(CliError::usage("one of --tcp-listen, --udp or --shm is required"));
    };

    print_emit(&output, format);
    Ok(SUCCESS)
}

const EMIT_SCHEMA_ID: &str = "https://schemas.facetrack.dev/cli/v1/emit-report.schema.json";

fn emit_frames<E>(
    count: u64,
    interval: Duration,
    mut send: impl FnMut(&RawFrame) -> Result<(), E>,
    frame: &RawFrame,
) -> Result<u64, E> {
    for sent in 0..count {
        if sent > 0 && !interval.is_zero() {
            thread::sleep(interval);
        }
        send(frame)?;
    }
    Ok(count)
}

/// Build a frame from `CHANNEL=VALUE` assignments; unset channels are zero.
fn build_frame(assignments: &[String]) -> CliResult<RawFrame> {
    let mut values = ChannelValues::zeroed();
    for assignment in assignments {
        let (channel, value) = parse_assignment(assignment)?;
        values[channel] = value;
    }
    Ok(values.to_raw())
}

fn parse_assignment(input: &str) -> CliResult<(Channel, f32)> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| CliError::usage(format!("expected CHANNEL=VALUE, got {input:?}")))?;
    let channel: Channel = name.parse().map_err(|err| frame_error("--set", err))?;
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("--set {name}: {value:?} is not a number")))?;
    if !value.is_finite() {
        return Err(CliError::usage(format!("--set {name}: value must be finite")));
    }
    Ok((channel, value))
}

fn print_emit(output: &EmitOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json_line(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "emitted {} frame(s) over {} to {}",
                output.frames, output.transport, output.target
            );
        }
        OutputFormat::Raw => println!("{}", output.frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;
    use facetrack_frame::decode_frame;

    #[test]
    fn assignments_set_named_channels() {
        let frame = build_frame(&["JAW_DROP=0.5".to_string(), "eyes_closed_l=1".to_string()])
            .expect("assignments should parse");
        let values = decode_frame(&frame).unwrap();

        assert_eq!(values[Channel::JawDrop], 0.5);
        assert_eq!(values[Channel::EyesClosedL], 1.0);
        assert_eq!(values[Channel::EyesClosedR], 0.0);
    }

    #[test]
    fn bad_assignments_are_usage_errors() {
        for bad in ["JAW_DROP", "NOT_A_CHANNEL=1", "JAW_DROP=wide", "JAW_DROP=NaN"] {
            let err = parse_assignment(bad).unwrap_err();
            assert_eq!(err.code, USAGE, "{bad}");
        }
    }

    #[test]
    fn emit_frames_stops_on_first_error() {
        let frame = ChannelValues::zeroed().to_raw();
        let mut calls = 0;
        let result = emit_frames(
            5,
            Duration::ZERO,
            |_| {
                calls += 1;
                if calls == 2 {
                    Err(std::io::Error::other("broken pipe"))
                } else {
                    Ok(())
                }
            },
            &frame,
        );
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
