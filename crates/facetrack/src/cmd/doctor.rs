use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use facetrack_pipeline::ModuleConfig;
use facetrack_transport::{
    default_root, DatagramConfig, DatagramSource, SharedMemoryConfig, SharedMemoryWriter,
    TransportSource, DEFAULT_PORT,
};
use serde::Serialize;

use crate::cmd::envinfo::active_features;
use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json_line, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        shm_root_writable_check(&default_root()),
        datagram_bind_check(),
        default_port_check(),
        config_check(args.config.as_deref()),
        companion_check(args.companion.as_deref()),
        CheckResult::new(
            "compiled_features",
            CheckStatus::Info,
            active_features().join(", "),
        ),
    ];

    let output = summarize(checks);
    print_doctor(&output, format);

    if output.overall == "fail" {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn summarize(checks: Vec<CheckResult>) -> DoctorOutput {
    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    DoctorOutput {
        schema_id: "https://schemas.facetrack.dev/cli/v1/doctor-report.schema.json",
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    }
}

fn shm_root_writable_check(root: &Path) -> CheckResult {
    let config = SharedMemoryConfig {
        root: root.to_path_buf(),
        ..SharedMemoryConfig::new(format!("facetrack-doctor-{}", std::process::id()))
    };
    match SharedMemoryWriter::create(&config).and_then(SharedMemoryWriter::remove) {
        Ok(()) => CheckResult::new(
            "shm_root_writable",
            CheckStatus::Pass,
            format!("{} accepts segments", root.display()),
        ),
        Err(err) => CheckResult::new(
            "shm_root_writable",
            CheckStatus::Fail,
            format!("{}: {err}", root.display()),
        ),
    }
}

fn datagram_bind_check() -> CheckResult {
    let mut source = DatagramSource::new(DatagramConfig::new(SocketAddr::from((
        Ipv4Addr::LOCALHOST,
        0,
    ))));
    let result = source.connect();
    source.close();
    match result {
        Ok(()) => CheckResult::new("loopback_datagram", CheckStatus::Pass, "bind succeeded"),
        Err(err) => CheckResult::new("loopback_datagram", CheckStatus::Fail, err.to_string()),
    }
}

// A busy default port usually means another module is already listening.
fn default_port_check() -> CheckResult {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT));
    let mut source = DatagramSource::new(DatagramConfig::new(addr));
    let result = source.connect();
    source.close();
    match result {
        Ok(()) => CheckResult::new("default_port", CheckStatus::Pass, format!("{addr} is free")),
        Err(err) => CheckResult::new("default_port", CheckStatus::Warn, err.to_string()),
    }
}

fn config_check(path: Option<&Path>) -> CheckResult {
    let Some(path) = path else {
        return CheckResult::new("config", CheckStatus::Skip, "no --config given");
    };
    match ModuleConfig::from_path(path) {
        Ok(config) => CheckResult::new(
            "config",
            CheckStatus::Pass,
            format!(
                "{} ({}, {})",
                path.display(),
                config.transport.name(),
                config.schema
            ),
        ),
        Err(err) => CheckResult::new(
            "config",
            CheckStatus::Fail,
            format!("{}: {err}", path.display()),
        ),
    }
}

fn companion_check(path: Option<&Path>) -> CheckResult {
    match path {
        None => CheckResult::new("companion", CheckStatus::Skip, "no --companion given"),
        Some(path) if path.is_file() => {
            CheckResult::new("companion", CheckStatus::Pass, path.display().to_string())
        }
        Some(path) => CheckResult::new(
            "companion",
            CheckStatus::Fail,
            format!("{} not found", path.display()),
        ),
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json_line(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("facetrack doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => println!("{}", output.overall),
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_failure_fails_overall() {
        let output = summarize(vec![
            CheckResult::new("a", CheckStatus::Pass, "ok"),
            CheckResult::new("b", CheckStatus::Warn, "meh"),
        ]);
        assert_eq!(output.overall, "pass");

        let output = summarize(vec![
            CheckResult::new("a", CheckStatus::Pass, "ok"),
            CheckResult::new("b", CheckStatus::Fail, "broken"),
        ]);
        assert_eq!(output.overall, "fail");
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"status\":\"fail\""));
    }

    #[test]
    fn missing_inputs_are_skipped_or_failed() {
        assert_eq!(config_check(None).status, CheckStatus::Skip);
        assert_eq!(companion_check(None).status, CheckStatus::Skip);
        assert_eq!(
            companion_check(Some(Path::new("/nonexistent/facetrack-companion"))).status,
            CheckStatus::Fail
        );
    }

    #[test]
    fn writable_root_passes() {
        let root = std::env::temp_dir();
        assert_eq!(shm_root_writable_check(&root).status, CheckStatus::Pass);
        assert_eq!(
            shm_root_writable_check(Path::new("/nonexistent/facetrack")).status,
            CheckStatus::Fail
        );
    }
}
