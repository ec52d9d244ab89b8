//! Serial Protocol Communication
//!
//! Implements the Blackbird ASCII control protocol: every command is a
//! short ASCII string ending in CR, every reply is CR-terminated ASCII.

pub mod command_builder;
pub mod commands;
mod connection;
mod error;
mod frame;
mod response;
pub mod serial;
pub mod stream;

pub use command_builder::CommandBuilder;
pub use commands::{Command, PowerMode, ProtocolVariant};
pub use connection::{Connection, ConnectionConfig, PendingRequest, TransportConfig};
pub use error::{ProtocolError, Result};
pub use frame::FrameReader;
pub use response::{LockStatus, SystemPowerStatus, ZoneStatus};
pub use stream::{CommunicationChannel, SerialChannel, TcpChannel};

/// Frame terminator
pub const EOL: &[u8] = b"\r";

/// Default baud rate for matrix communication
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Ethernet control port
pub const DEFAULT_TCP_PORT: u16 = 4001;

/// Read size for the socket greeting and listener chunks
pub const SOCKET_RECV: usize = 2048;

/// Zone outputs on the 8x8 matrix
pub const DEFAULT_ZONES: u8 = 8;

/// Source inputs on the 8x8 matrix
pub const DEFAULT_SOURCES: u8 = 8;
