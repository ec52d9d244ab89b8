//! Shared test doubles: a scripted blocking channel and a simulated
//! matrix behind a tokio duplex pipe.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use blackbird_core::protocol::{CommunicationChannel, ConnectionConfig, ProtocolVariant};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short-timeout configuration for tests
pub fn test_config(variant: ProtocolVariant) -> ConnectionConfig {
    ConnectionConfig {
        timeout_ms: 200,
        variant,
        ..Default::default()
    }
}

/// Canned replies keyed by the exact request bytes, consumed in order
#[derive(Default)]
struct Script {
    responses: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
    requests: Vec<Vec<u8>>,
    wire: Vec<u8>,
}

impl Script {
    fn respond(&mut self, request: &[u8], reply: &[u8]) {
        self.responses
            .entry(request.to_vec())
            .or_default()
            .push_back(reply.to_vec());
    }

    fn remaining(&self) -> usize {
        self.responses.values().map(VecDeque::len).sum()
    }

    /// Record a complete request and return its reply, if scripted
    fn take_reply(&mut self, request: Vec<u8>) -> Option<Vec<u8>> {
        let reply = self
            .responses
            .get_mut(&request)
            .and_then(VecDeque::pop_front);
        self.requests.push(request);
        reply
    }
}

// ---------------------------------------------------------------------------
// Blocking
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    script: Script,
    line: Vec<u8>,
    inbox: VecDeque<u8>,
    input_clears: usize,
}

/// Scripted matrix for the blocking client.
///
/// Clones share state, so a test keeps one handle while the client owns
/// the channel. Reads never block: an empty inbox reports a read timeout.
#[derive(Clone, Default)]
pub struct MockMatrix {
    state: Arc<Mutex<MockState>>,
}

impl MockMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, request: &[u8], reply: &[u8]) {
        self.state.lock().unwrap().script.respond(request, reply);
    }

    pub fn remaining(&self) -> usize {
        self.state.lock().unwrap().script.remaining()
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().script.requests.clone()
    }

    pub fn wire(&self) -> Vec<u8> {
        self.state.lock().unwrap().script.wire.clone()
    }

    pub fn input_clears(&self) -> usize {
        self.state.lock().unwrap().input_clears
    }

    /// Bytes sitting in the receive buffer before the next command
    pub fn push_stale(&self, bytes: &[u8]) {
        self.state.lock().unwrap().inbox.extend(bytes);
    }

    pub fn channel(&self) -> Box<dyn CommunicationChannel> {
        Box::new(self.clone())
    }
}

impl Read for MockMatrix {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        match state.inbox.pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        }
    }
}

impl Write for MockMatrix {
    /// Accepts a single byte per call so that unsynchronised writers
    /// would interleave on the wire.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(&byte) = buf.first() else {
            return Ok(0);
        };
        {
            let mut state = self.state.lock().unwrap();
            state.script.wire.push(byte);
            state.line.push(byte);
            if byte == b'\r' {
                let request = std::mem::take(&mut state.line);
                if let Some(reply) = state.script.take_reply(request) {
                    state.inbox.extend(reply);
                }
            }
        }
        std::thread::yield_now();
        Ok(1)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for MockMatrix {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input_buffer(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.input_clears += 1;
        state.inbox.clear();
        Ok(())
    }

    fn clear_output_buffer(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

// ---------------------------------------------------------------------------
// Async
// ---------------------------------------------------------------------------

/// Simulated matrix on the far end of a duplex pipe
#[derive(Clone)]
pub struct SimulatedMatrix {
    script: Arc<Mutex<Script>>,
    writer: Arc<tokio::sync::Mutex<WriteHalf<DuplexStream>>>,
}

impl SimulatedMatrix {
    /// Spawn the device task; returns the client end of the pipe
    pub fn spawn() -> (DuplexStream, SimulatedMatrix) {
        let (client, device) = tokio::io::duplex(1024);
        let (mut reader, writer) = tokio::io::split(device);
        let sim = SimulatedMatrix {
            script: Arc::new(Mutex::new(Script::default())),
            writer: Arc::new(tokio::sync::Mutex::new(writer)),
        };

        let task_sim = sim.clone();
        tokio::spawn(async move {
            let mut line = Vec::new();
            let mut buf = [0u8; 256];
            loop {
                let n = match reader.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                for &byte in &buf[..n] {
                    line.push(byte);
                    if byte != b'\r' {
                        continue;
                    }
                    let request = std::mem::take(&mut line);
                    let reply = {
                        let mut script = task_sim.script.lock().unwrap();
                        script.wire.extend_from_slice(&request);
                        script.take_reply(request)
                    };
                    if let Some(reply) = reply {
                        task_sim.send(&reply).await;
                    }
                }
            }
        });

        (client, sim)
    }

    pub fn respond(&self, request: &[u8], reply: &[u8]) {
        self.script.lock().unwrap().respond(request, reply);
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().remaining()
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn wire(&self) -> Vec<u8> {
        self.script.lock().unwrap().wire.clone()
    }

    /// Write raw bytes towards the client, unprompted
    pub async fn send(&self, bytes: &[u8]) {
        let mut writer = self.writer.lock().await;
        let _ = writer.write_all(bytes).await;
        let _ = writer.flush().await;
    }
}
