//! Framed transports
//!
//! A frame is one JSON document terminated by a line break. Both directions
//! are independent streams; the host writes commands to one and reads
//! envelopes from the other.

use crate::TransportError;
use crossbeam::channel::{self, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, ErrorKind, Write};

/// One side of a duplex, strictly request/response channel.
pub trait Transport: Send {
    /// Write one complete frame followed by the frame terminator.
    fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Block until one complete frame is available.
    ///
    /// Returns `Ok(None)` once the peer has closed its output. A frame that
    /// is not text yields [`TransportError::MalformedFrame`] and is consumed,
    /// so the next call reads the following frame.
    fn receive(&mut self) -> Result<Option<String>, TransportError>;

    /// Serialize `message` into a single frame and send it.
    fn send_json<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError>
    where
        Self: Sized,
    {
        // serde_json escapes control characters, so the text is delimiter-free
        let text = serde_json::to_string(message)
            .map_err(|e| TransportError::MalformedFrame(e.to_string()))?;
        self.send(&text)
    }

    /// Receive one frame and parse it as `T`.
    fn receive_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError>
    where
        Self: Sized,
    {
        match self.receive()? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| TransportError::MalformedFrame(format!("{}: {}", e, truncate(&text)))),
            None => Ok(None),
        }
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<Option<String>, TransportError> {
        (**self).receive()
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(120) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// Byte streams
// ============================================================================

/// Line-delimited frames over a pair of byte streams.
///
/// Any reader/writer pair works: pipes to a child process, sockets, or
/// in-memory buffers in tests. The foreign process conventionally answers
/// on its standard error stream, but nothing here depends on that.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
    line: Vec<u8>,
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: Vec::new(),
        }
    }

    /// Give back the underlying streams.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead + Send, W: Write + Send> Transport for LineTransport<R, W> {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if frame.contains('\n') {
            return Err(TransportError::EmbeddedDelimiter);
        }
        let write = |w: &mut W| -> std::io::Result<()> {
            w.write_all(frame.as_bytes())?;
            w.write_all(b"\n")?;
            w.flush()
        };
        write(&mut self.writer).map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Io(e),
        })?;
        tracing::trace!(len = frame.len(), "frame sent");
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return Ok(None);
            }
            let text = std::str::from_utf8(&self.line)
                .map_err(|e| TransportError::MalformedFrame(format!("frame is not UTF-8: {}", e)))?;
            let frame = text.trim_end_matches(['\n', '\r']);
            if frame.trim().is_empty() {
                continue;
            }
            tracing::trace!(len = frame.len(), "frame received");
            return Ok(Some(frame.to_string()));
        }
    }
}

// ============================================================================
// In-process channels
// ============================================================================

/// Frames passed over in-memory channels, for running a dispatcher on a
/// worker thread in the same process.
pub struct ChannelTransport {
    outgoing: Sender<String>,
    incoming: Receiver<String>,
}

impl ChannelTransport {
    /// Create two connected ends. Whatever one end sends, the other receives.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();
        (
            ChannelTransport { outgoing: a_tx, incoming: a_rx },
            ChannelTransport { outgoing: b_tx, incoming: b_rx },
        )
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        if frame.contains('\n') {
            return Err(TransportError::EmbeddedDelimiter);
        }
        self.outgoing
            .send(frame.to_string())
            .map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self) -> Result<Option<String>, TransportError> {
        // A disconnected sender is the in-memory end-of-stream
        Ok(self.incoming.recv().ok())
    }
}
