//! Async client
//!
//! The link is split: a [`Listener`] task owns the read half and queues
//! received chunks, while the command path owns the write half behind an
//! async mutex. Only one command waits for its frame at a time.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use super::encode_command;
use super::listener::Listener;
use crate::protocol::{
    serial::open_async_port, Command, CommandBuilder, ConnectionConfig, FrameReader, LockStatus,
    PendingRequest, PowerMode, ProtocolError, Result, SystemPowerStatus, TransportConfig,
    ZoneStatus, SOCKET_RECV,
};

/// Write side of the link plus the queue fed by the listener
struct AsyncLink {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    rx: mpsc::Receiver<Vec<u8>>,
    timeout: Duration,
    tx_bytes: u64,
    rx_bytes: u64,
    tx_frames: u64,
    rx_frames: u64,
}

impl AsyncLink {
    /// Drop queued bytes, send the request and collect one frame
    async fn execute(&mut self, request: &[u8], skip: usize) -> Result<String> {
        let pending = PendingRequest::new(request.to_vec(), skip, self.timeout);
        tracing::debug!(request = ?String::from_utf8_lossy(&pending.bytes), "Sending");

        while let Ok(stale) = self.rx.try_recv() {
            tracing::warn!(
                stale = ?String::from_utf8_lossy(&stale),
                "Discarding stale input"
            );
        }

        self.writer.write_all(&pending.bytes).await?;
        self.writer.flush().await?;
        self.tx_bytes = self.tx_bytes.saturating_add(pending.bytes.len() as u64);
        self.tx_frames = self.tx_frames.saturating_add(1);

        let deadline = tokio::time::Instant::from_std(pending.deadline);
        let mut reader = pending.frame_reader();
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(chunk)) => {
                    if reader.push_chunk(&chunk) {
                        let reply = reader.into_string()?;
                        self.rx_bytes = self.rx_bytes.saturating_add(reply.len() as u64);
                        self.rx_frames = self.rx_frames.saturating_add(1);
                        tracing::debug!(reply = ?reply, "Received");
                        return Ok(reply);
                    }
                }
                Ok(None) => {
                    tracing::warn!("Listener stopped before frame completed");
                    return Err(self.timed_out(&pending, &reader));
                }
                Err(_) => return Err(self.timed_out(&pending, &reader)),
            }
        }
    }

    fn timed_out(&self, pending: &PendingRequest, reader: &FrameReader) -> ProtocolError {
        tracing::error!(
            request = ?String::from_utf8_lossy(&pending.bytes),
            received = ?String::from_utf8_lossy(reader.received()),
            "Timeout during receiving response"
        );
        reader.timeout()
    }

    async fn request(&mut self, builder: &CommandBuilder, command: &Command) -> Result<String> {
        let bytes = encode_command(builder, command)?;
        self.execute(&bytes, command.skip()).await
    }
}

/// Async Blackbird client.
///
/// Must be created inside a tokio runtime; the listener task is spawned
/// on construction and stopped on [`close`](AsyncBlackbird::close) or drop.
pub struct AsyncBlackbird {
    link: Mutex<AsyncLink>,
    builder: CommandBuilder,
    listener: Listener,
}

impl AsyncBlackbird {
    /// Open the link described by `config`
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        match &config.transport {
            TransportConfig::Serial { port } => {
                let stream = open_async_port(port, config.baud_rate, config.timeout())?;
                Ok(Self::from_stream(stream, config))
            }
            TransportConfig::Tcp { host, port } => {
                let stream = connect_tcp_stream(host, *port, config.timeout()).await?;
                Ok(Self::from_stream(stream, config))
            }
        }
    }

    /// Open a serial port with default settings
    pub async fn open_serial(port: &str) -> Result<Self> {
        Self::open(&ConnectionConfig::serial(port)).await
    }

    /// Connect over TCP on the default port
    pub async fn connect_tcp(host: &str) -> Result<Self> {
        Self::open(&ConnectionConfig::tcp(host)).await
    }

    /// Wrap an already connected byte stream
    pub fn from_stream<S>(stream: S, config: &ConnectionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (listener, rx) = Listener::spawn(read_half);
        Self {
            link: Mutex::new(AsyncLink {
                writer: Box::new(write_half),
                rx,
                timeout: config.timeout(),
                tx_bytes: 0,
                rx_bytes: 0,
                tx_frames: 0,
                rx_frames: 0,
            }),
            builder: config.command_builder(),
            listener,
        }
    }

    /// Stop the listener and release the link
    pub async fn close(self) {
        let Self { link, listener, .. } = self;
        listener.shutdown().await;
        let mut link = link.into_inner();
        if let Err(e) = link.writer.shutdown().await {
            tracing::debug!(error = %e, "Writer shutdown failed");
        }
    }

    /// Cumulative tx bytes, rx bytes, tx frames, rx frames
    pub async fn counters(&self) -> (u64, u64, u64, u64) {
        let link = self.link.lock().await;
        (link.tx_bytes, link.rx_bytes, link.tx_frames, link.rx_frames)
    }

    async fn request(&self, command: &Command) -> Result<String> {
        let mut link = self.link.lock().await;
        link.request(&self.builder, command).await
    }

    /// Status of one zone, or `None` when the reply is not understood.
    ///
    /// The power precheck and the zone query run under one lock.
    pub async fn zone_status(&self, zone: i32) -> Result<Option<ZoneStatus>> {
        let zone = self.builder.clamp_zone(zone);
        let mut link = self.link.lock().await;

        if self.builder.variant().requires_power_precheck() {
            let reply = link
                .request(&self.builder, &Command::SystemPowerStatus)
                .await?;
            let power = SystemPowerStatus::from_response(Some(&reply));
            if !power.as_ref().is_some_and(SystemPowerStatus::is_on) {
                tracing::debug!(zone, power = ?power, "System not on, zone reported off");
                return Ok(Some(ZoneStatus::off(zone)));
            }
        }

        let reply = link
            .request(&self.builder, &Command::ZoneStatus { zone })
            .await?;
        Ok(ZoneStatus::from_response(zone, Some(&reply)))
    }

    /// System power state
    pub async fn system_power_status(&self) -> Result<Option<SystemPowerStatus>> {
        let reply = self.request(&Command::SystemPowerStatus).await?;
        Ok(SystemPowerStatus::from_response(Some(&reply)))
    }

    /// Switch system power
    pub async fn set_system_power(&self, mode: PowerMode) -> Result<()> {
        self.request(&Command::SetSystemPower { mode }).await.map(drop)
    }

    /// Turn zone on or off
    pub async fn set_zone_power(&self, zone: i32, power: bool) -> Result<()> {
        self.request(&self.builder.set_zone_power(zone, power))
            .await
            .map(drop)
    }

    /// Set source for zone; the source is clamped to the valid range
    pub async fn set_zone_source(&self, zone: i32, source: i32) -> Result<()> {
        self.request(&self.builder.set_zone_source(zone, source))
            .await
            .map(drop)
    }

    /// Set source for all zones
    pub async fn set_all_zone_source(&self, source: i32) -> Result<()> {
        self.request(&self.builder.set_all_zone_source(source))
            .await
            .map(drop)
    }

    /// Lock front panel buttons
    pub async fn lock_front_buttons(&self) -> Result<()> {
        self.request(&Command::LockFrontButtons).await.map(drop)
    }

    /// Unlock front panel buttons
    pub async fn unlock_front_buttons(&self) -> Result<()> {
        self.request(&Command::UnlockFrontButtons).await.map(drop)
    }

    /// Report system locking status
    pub async fn lock_status(&self) -> Result<Option<LockStatus>> {
        let reply = self.request(&Command::LockStatus).await?;
        Ok(LockStatus::from_response(Some(&reply)))
    }
}

/// Connect to the matrix's control port and discard the login greeting
async fn connect_tcp_stream(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{}:{}", host, port);
    tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis(), "Connecting to TCP endpoint");

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| ProtocolError::ConnectionFailed(format!("{}: connect timed out", addr)))?
        .map_err(|e| ProtocolError::ConnectionFailed(format!("{}: {}", addr, e)))?;

    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY (continuing anyway)");
    }

    let mut greeting = [0u8; SOCKET_RECV];
    match tokio::time::timeout(timeout, stream.read(&mut greeting)).await {
        Ok(Ok(n)) => tracing::debug!(
            addr = %addr,
            greeting = %String::from_utf8_lossy(&greeting[..n]),
            "Discarded login greeting"
        ),
        Ok(Err(e)) => return Err(ProtocolError::ConnectionFailed(format!("{}: {}", addr, e))),
        Err(_) => tracing::debug!(addr = %addr, "No login greeting received"),
    }

    tracing::info!(addr = %addr, "TCP connection established");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_tcp_discards_greeting() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let device = tokio::spawn(async move {
            let (mut conn, _) = server.accept().await.unwrap();
            conn.write_all(b"Please Input Your Command :\r").await.unwrap();
            let mut buf = [0u8; 16];
            let n = conn.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"%9961.\r");
            conn.write_all(b"System UnLock!\r").await.unwrap();
        });

        let mut config = ConnectionConfig::tcp("127.0.0.1");
        config.transport = TransportConfig::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let client = AsyncBlackbird::open(&config).await.unwrap();
        let status = client.lock_status().await.unwrap();
        assert_eq!(status, Some(LockStatus { locked: false }));

        device.await.unwrap();
        client.close().await;
    }

    #[tokio::test]
    async fn test_connect_tcp_refused() {
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();
        drop(server);

        let result = connect_tcp_stream("127.0.0.1", port, Duration::from_millis(500)).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }
}
