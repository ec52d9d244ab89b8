//! Blocking communication channels
//!
//! The request serializer only talks to [`CommunicationChannel`]; serial
//! and TCP links are picked when the client is built.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::serial::open_port;
use super::{ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_TCP_PORT, SOCKET_RECV};

/// Abstraction for communication channels (Serial or TCP)
pub trait CommunicationChannel: Read + Write + Send {
    /// Set timeout for read/write operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Clear input buffers
    fn clear_input_buffer(&mut self) -> io::Result<()>;

    /// Clear output buffers
    fn clear_output_buffer(&mut self) -> io::Result<()>;

    /// Human readable endpoint, for logs
    fn describe(&self) -> String;
}

/// Serial port wrapper implementing CommunicationChannel
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Wrap an already opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Open and configure a serial port (8N1)
    pub fn open(path: &str, baud_rate: Option<u32>, timeout: Duration) -> Result<Self, ProtocolError> {
        let port = open_port(path, baud_rate.unwrap_or(DEFAULT_BAUD_RATE), timeout)?;
        Ok(Self::new(port))
    }
}

impl Read for SerialChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl CommunicationChannel for SerialChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::other)
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::other)
    }

    fn clear_output_buffer(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Output)
            .map_err(io::Error::other)
    }

    fn describe(&self) -> String {
        self.port.name().unwrap_or_else(|| "serial".to_string())
    }
}

/// TCP stream wrapper implementing CommunicationChannel
pub struct TcpChannel {
    stream: TcpStream,
    peer: String,
}

impl TcpChannel {
    /// Wrap a connected socket
    pub fn new(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "tcp".to_string());
        Self { stream, peer }
    }

    /// Connect to the matrix and swallow its login greeting
    pub fn connect(host: &str, port: Option<u16>, timeout: Duration) -> Result<Self, ProtocolError> {
        let port = port.unwrap_or(DEFAULT_TCP_PORT);
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| ProtocolError::ConnectionFailed(format!("{}:{}: {}", host, port, e)))?
            .next()
            .ok_or_else(|| {
                ProtocolError::ConnectionFailed(format!("{}:{}: no address", host, port))
            })?;

        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| ProtocolError::ConnectionFailed(format!("{}: {}", addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY (continuing anyway)");
        }

        let mut channel = Self::new(stream);
        channel.set_timeout(timeout)?;

        let mut greeting = [0u8; SOCKET_RECV];
        match channel.stream.read(&mut greeting) {
            Ok(n) => tracing::debug!(
                addr = %addr,
                greeting = %String::from_utf8_lossy(&greeting[..n]),
                "Discarded login greeting"
            ),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                tracing::debug!(addr = %addr, "No login greeting received")
            }
            Err(e) => return Err(ProtocolError::ConnectionFailed(format!("{}: {}", addr, e))),
        }

        tracing::info!(addr = %addr, "TCP connection established");
        Ok(channel)
    }
}

impl Read for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl CommunicationChannel for TcpChannel {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        // No clear syscall for sockets: drain without blocking, then restore.
        self.stream.set_nonblocking(true)?;
        let mut buf = [0u8; 1024];
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => tracing::warn!(peer = %self.peer, bytes = n, "Discarding stale input"),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.stream.set_nonblocking(false)?;
        result
    }

    fn clear_output_buffer(&mut self) -> io::Result<()> {
        // Managed by the OS.
        self.stream.flush()
    }

    fn describe(&self) -> String {
        self.peer.clone()
    }
}
