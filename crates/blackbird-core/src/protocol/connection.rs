//! Connection management
//!
//! Holds the connection configuration and the blocking request serializer
//! that runs one command/reply exchange at a time over a channel.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use super::{
    stream::{CommunicationChannel, SerialChannel, TcpChannel},
    CommandBuilder, FrameReader, ProtocolError, ProtocolVariant, Result, DEFAULT_BAUD_RATE,
    DEFAULT_SOURCES, DEFAULT_TCP_PORT, DEFAULT_TIMEOUT_MS, DEFAULT_ZONES,
};

/// Physical link to the matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    /// RS-232 port, e.g. `/dev/ttyUSB0` or `COM3`
    Serial {
        /// Device path or port name
        port: String,
    },
    /// Ethernet control port
    Tcp {
        /// Hostname or IP address
        host: String,
        /// Control port, 4001 unless set
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial {
            port: String::new(),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Serial port or TCP endpoint
    pub transport: TransportConfig,
    /// Baud rate (serial only)
    pub baud_rate: u32,
    /// Response timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of zone outputs
    pub zones: u8,
    /// Number of source inputs
    pub sources: u8,
    /// Firmware dialect
    pub variant: ProtocolVariant,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            zones: DEFAULT_ZONES,
            sources: DEFAULT_SOURCES,
            variant: ProtocolVariant::default(),
        }
    }
}

impl ConnectionConfig {
    /// Configuration for a serial port with default settings
    pub fn serial(port: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Serial { port: port.into() },
            ..Default::default()
        }
    }

    /// Configuration for a TCP host on the default port
    pub fn tcp(host: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Tcp {
                host: host.into(),
                port: DEFAULT_TCP_PORT,
            },
            ..Default::default()
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ProtocolError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Reject sizes, timeouts and baud rates of zero
    pub fn validate(&self) -> Result<()> {
        if self.zones == 0 || self.sources == 0 {
            return Err(ProtocolError::Config(
                "zones and sources must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ProtocolError::Config("timeout_ms must be positive".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ProtocolError::Config("baud_rate must be positive".to_string()));
        }
        Ok(())
    }

    /// Response timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Command builder matching this configuration
    pub fn command_builder(&self) -> CommandBuilder {
        CommandBuilder::new(self.zones, self.sources, self.variant)
    }

    /// Open the blocking channel described by `transport`
    pub fn open_channel(&self) -> Result<Box<dyn CommunicationChannel>> {
        self.validate()?;
        match &self.transport {
            TransportConfig::Serial { port } => Ok(Box::new(SerialChannel::open(
                port,
                Some(self.baud_rate),
                self.timeout(),
            )?)),
            TransportConfig::Tcp { host, port } => Ok(Box::new(TcpChannel::connect(
                host,
                Some(*port),
                self.timeout(),
            )?)),
        }
    }
}

/// One in-flight command: the bytes to send, its skip threshold and the
/// moment the reply is given up on
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Encoded command, CR included
    pub bytes: Vec<u8>,
    /// Minimum reply length before a CR ends the frame
    pub skip: usize,
    /// Moment the reply is given up on
    pub deadline: Instant,
}

impl PendingRequest {
    /// Start the clock on a request
    pub fn new(bytes: Vec<u8>, skip: usize, timeout: Duration) -> Self {
        Self {
            bytes,
            skip,
            deadline: Instant::now() + timeout,
        }
    }

    /// Fresh accumulator for this request's reply
    pub fn frame_reader(&self) -> FrameReader {
        FrameReader::new(self.skip)
    }
}

/// Blocking request serializer over one channel
pub struct Connection {
    channel: Box<dyn CommunicationChannel>,
    timeout: Duration,
    /// Metrics: cumulative bytes/frames sent & received
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl Connection {
    /// Wrap an already opened channel
    pub fn new(channel: Box<dyn CommunicationChannel>, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_frames: 0,
            rx_frames: 0,
        }
    }

    /// Open the channel described by `config`
    pub fn open(config: &ConnectionConfig) -> Result<Self> {
        let channel = config.open_channel()?;
        Ok(Self::new(channel, config.timeout()))
    }

    /// Response timeout for each exchange
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoint description for logs
    pub fn describe(&self) -> String {
        self.channel.describe()
    }

    /// Get cumulative tx/rx bytes and frame counters
    pub fn get_counters(&self) -> (u64, u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.tx_frames, self.rx_frames)
    }

    /// Send a request and read back one frame.
    ///
    /// Buffers are cleared first so stale bytes from an earlier exchange
    /// never end up in this reply.
    pub fn execute(&mut self, request: &[u8], skip: usize) -> Result<String> {
        let pending = PendingRequest::new(request.to_vec(), skip, self.timeout);
        tracing::debug!(request = ?String::from_utf8_lossy(&pending.bytes), "Sending");

        self.channel.clear_output_buffer()?;
        self.channel.clear_input_buffer()?;

        self.channel.write_all(&pending.bytes)?;
        self.channel.flush()?;
        self.tx_bytes = self.tx_bytes.saturating_add(pending.bytes.len() as u64);
        self.tx_frames = self.tx_frames.saturating_add(1);

        let result = pending
            .frame_reader()
            .read_from_channel(self.channel.as_mut(), pending.deadline);
        if let Err(e) = self.channel.set_timeout(self.timeout) {
            tracing::warn!(error = %e, "Failed to restore channel timeout");
        }

        match result {
            Ok(reply) => {
                self.rx_bytes = self.rx_bytes.saturating_add(reply.len() as u64);
                self.rx_frames = self.rx_frames.saturating_add(1);
                tracing::debug!(reply = ?reply, "Received");
                Ok(reply)
            }
            Err(ProtocolError::Timeout { received }) => {
                tracing::error!(
                    request = ?String::from_utf8_lossy(&pending.bytes),
                    received = ?String::from_utf8_lossy(&received),
                    "Timeout during receiving response"
                );
                Err(ProtocolError::Timeout { received })
            }
            Err(e) => Err(e),
        }
    }
}
