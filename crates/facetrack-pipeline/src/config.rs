//! Module configuration, loaded once at initialization.
//!
//! ```json
//! { "transport": "stream", "ip": "127.0.0.1", "port": 13191 }
//! { "transport": "datagram", "port": 13191 }
//! { "transport": "shared_memory", "name": "QuestProEyeTracking" }
//! ```
//!
//! The companion's own `{"IP": "...", "Port": n}` file is accepted as a
//! stream configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use facetrack_expression::SchemaVersion;
use facetrack_transport::{
    default_root, DatagramConfig, SharedMemoryConfig, StreamConfig, DEFAULT_PORT,
};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Pause between pending connection attempts in the poll loop.
pub const DEFAULT_RECONNECT_PAUSE: Duration = Duration::from_millis(10);

/// Shared memory transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedMemorySettings {
    pub name: String,
    /// Directory holding named segments. Platform default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub connect_attempts: u32,
    pub retry_interval_ms: u64,
}

impl Default for SharedMemorySettings {
    fn default() -> Self {
        Self {
            name: SharedMemoryConfig::DEFAULT_NAME.to_string(),
            root: None,
            connect_attempts: SharedMemoryConfig::DEFAULT_CONNECT_ATTEMPTS,
            retry_interval_ms: SharedMemoryConfig::DEFAULT_RETRY_INTERVAL.as_millis() as u64,
        }
    }
}

impl SharedMemorySettings {
    pub fn to_transport(&self) -> SharedMemoryConfig {
        SharedMemoryConfig {
            name: self.name.clone(),
            root: self.root.clone().unwrap_or_else(default_root),
            connect_attempts: self.connect_attempts,
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

/// Stream (TCP) transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    #[serde(alias = "IP")]
    pub ip: IpAddr,
    #[serde(alias = "Port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            connect_timeout_ms: Some(StreamConfig::DEFAULT_CONNECT_TIMEOUT.as_millis() as u64),
            read_timeout_ms: None,
        }
    }
}

impl StreamSettings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn to_transport(&self) -> StreamConfig {
        StreamConfig {
            addr: self.addr(),
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Datagram (UDP) transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatagramSettings {
    #[serde(alias = "IP")]
    pub bind: IpAddr,
    #[serde(alias = "Port")]
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_ms: Option<u64>,
}

impl Default for DatagramSettings {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            read_timeout_ms: None,
        }
    }
}

impl DatagramSettings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn to_transport(&self) -> DatagramConfig {
        DatagramConfig {
            bind_addr: self.addr(),
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Which backend delivers frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportConfig {
    SharedMemory(SharedMemorySettings),
    Stream(StreamSettings),
    Datagram(DatagramSettings),
}

impl TransportConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TransportConfig::SharedMemory(_) => "shared-memory",
            TransportConfig::Stream(_) => "stream",
            TransportConfig::Datagram(_) => "datagram",
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::SharedMemory(SharedMemorySettings::default())
    }
}

/// Everything a [`TrackingModule`](crate::TrackingModule) needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(flatten)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub schema: SchemaVersion,
    /// When set, initialization fails unless this file exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_path: Option<PathBuf>,
    #[serde(default = "default_reconnect_pause_ms")]
    pub reconnect_pause_ms: u64,
}

fn default_reconnect_pause_ms() -> u64 {
    DEFAULT_RECONNECT_PAUSE.as_millis() as u64
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl ModuleConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            schema: SchemaVersion::default(),
            companion_path: None,
            reconnect_pause_ms: default_reconnect_pause_ms(),
        }
    }

    pub fn shared_memory(name: impl Into<String>) -> Self {
        Self::new(TransportConfig::SharedMemory(SharedMemorySettings {
            name: name.into(),
            ..SharedMemorySettings::default()
        }))
    }

    pub fn stream(addr: SocketAddr) -> Self {
        Self::new(TransportConfig::Stream(StreamSettings {
            ip: addr.ip(),
            port: addr.port(),
            ..StreamSettings::default()
        }))
    }

    pub fn datagram(addr: SocketAddr) -> Self {
        Self::new(TransportConfig::Datagram(DatagramSettings {
            bind: addr.ip(),
            port: addr.port(),
            ..DatagramSettings::default()
        }))
    }

    /// Read and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(object) = value.as_object_mut() {
            let legacy = object.contains_key("IP") || object.contains_key("Port");
            if legacy && !object.contains_key("transport") {
                object.insert("transport".to_string(), "stream".into());
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn reconnect_pause(&self) -> Duration {
        Duration::from_millis(self.reconnect_pause_ms)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.transport {
            TransportConfig::SharedMemory(shm) => {
                if shm.name.trim().is_empty() {
                    return Err(PipelineError::Config(
                        "shared memory name must not be empty".to_string(),
                    ));
                }
                if shm.name.contains(['/', '\\']) {
                    return Err(PipelineError::Config(format!(
                        "shared memory name {:?} must not contain path separators",
                        shm.name
                    )));
                }
                if shm.connect_attempts == 0 {
                    return Err(PipelineError::Config(
                        "connect_attempts must be at least 1".to_string(),
                    ));
                }
            }
            TransportConfig::Stream(stream) => {
                if stream.port == 0 {
                    return Err(PipelineError::Config(
                        "stream port must not be 0".to_string(),
                    ));
                }
                if stream.connect_timeout_ms == Some(0) || stream.read_timeout_ms == Some(0) {
                    return Err(PipelineError::Config(
                        "stream timeouts must be greater than 0 ms".to_string(),
                    ));
                }
            }
            TransportConfig::Datagram(datagram) => {
                if datagram.read_timeout_ms == Some(0) {
                    return Err(PipelineError::Config(
                        "datagram read timeout must be greater than 0 ms".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}
