//! Frame accumulation
//!
//! A frame is complete once more than `skip` bytes have arrived and the
//! buffer ends with the terminator. Zone status replies contain a CR
//! between their two lines, so their `skip` keeps the first CR from
//! closing the frame early.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use super::stream::CommunicationChannel;
use super::{ProtocolError, Result, EOL};

/// Accumulates reply bytes until the terminator condition holds
#[derive(Debug, Clone)]
pub struct FrameReader {
    buf: Vec<u8>,
    skip: usize,
    terminator: &'static [u8],
}

impl FrameReader {
    /// Create a reader using the CR terminator
    pub fn new(skip: usize) -> Self {
        Self::with_terminator(skip, EOL)
    }

    /// Create a reader with a custom terminator
    pub fn with_terminator(skip: usize, terminator: &'static [u8]) -> Self {
        Self {
            buf: Vec::with_capacity(32),
            skip,
            terminator,
        }
    }

    /// Append one byte; true once the frame is complete
    pub fn push_byte(&mut self, byte: u8) -> bool {
        self.buf.push(byte);
        self.is_complete()
    }

    /// Append a whole chunk; the condition is only checked after the chunk
    pub fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        self.buf.extend_from_slice(chunk);
        self.is_complete()
    }

    /// Whether more than `skip` bytes arrived and the buffer ends with the terminator
    pub fn is_complete(&self) -> bool {
        self.buf.len() > self.skip && self.buf.ends_with(self.terminator)
    }

    /// Bytes received so far
    pub fn received(&self) -> &[u8] {
        &self.buf
    }

    /// Decode the accumulated bytes as ASCII
    pub fn into_string(self) -> Result<String> {
        if !self.buf.is_ascii() {
            return Err(ProtocolError::InvalidResponse(format!(
                "non-ASCII reply {:02x?}",
                self.buf
            )));
        }
        String::from_utf8(self.buf).map_err(|e| ProtocolError::InvalidResponse(e.to_string()))
    }

    /// Error describing a frame that never completed
    pub fn timeout(&self) -> ProtocolError {
        ProtocolError::timeout(&self.buf)
    }

    /// Read one byte at a time from a blocking source until the frame is
    /// complete.
    ///
    /// An empty read, a read timeout, or passing `deadline` all end the
    /// frame as a timeout carrying the partial bytes.
    pub fn read_from<R: Read + ?Sized>(self, source: &mut R, deadline: Instant) -> Result<String> {
        self.read_until(source, deadline, |_, _| Ok(()))
    }

    /// Like [`read_from`](Self::read_from), but each read on the channel
    /// is bounded by the time left before `deadline`, so a slow trickle of
    /// bytes cannot stretch the exchange past it.
    ///
    /// Leaves the channel timeout at whatever the last read used.
    pub fn read_from_channel<C: CommunicationChannel + ?Sized>(
        self,
        channel: &mut C,
        deadline: Instant,
    ) -> Result<String> {
        self.read_until(channel, deadline, |channel, remaining| {
            channel.set_timeout(remaining)
        })
    }

    fn read_until<R, F>(mut self, source: &mut R, deadline: Instant, mut before_read: F) -> Result<String>
    where
        R: Read + ?Sized,
        F: FnMut(&mut R, Duration) -> io::Result<()>,
    {
        let mut byte = [0u8; 1];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout());
            }
            before_read(source, remaining)?;

            match source.read(&mut byte) {
                Ok(0) => return Err(self.timeout()),
                Ok(_) => {
                    if self.push_byte(byte[0]) {
                        return self.into_string();
                    }
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Err(self.timeout());
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(ProtocolError::IoError(e)),
            }
        }
    }
}
