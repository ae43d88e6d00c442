//! Transport Layer
//!
//! Binds a [`Parser`] to an async byte stream. The connection owns the read
//! buffer, hands every chunk it reads to the parser and queues the resulting
//! events; outbound packets are serialised straight onto the stream.


use std::collections::VecDeque;
use std::fmt;
use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::parser::{Event, Parser};
use crate::protocol::{Packet, SerialisationFailure};

/// Initial capacity of the per-connection read buffer
const READ_BUFFER_SIZE: usize = 4096;

/// Errors from sending a packet
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    Serialise(SerialisationFailure),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "IO error: {}", e),
            TransportError::Serialise(e) => write!(f, "Serialisation error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::Serialise(e) => Some(e),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<SerialisationFailure> for TransportError {
    fn from(e: SerialisationFailure) -> Self {
        TransportError::Serialise(e)
    }
}

/// One MQTT connection over any async byte stream
pub struct Connection<S> {
    stream: S,
    parser: Parser,
    read_buf: BytesMut,
    write_buf: BytesMut,
    /// Decoded but not yet returned
    pending: VecDeque<Event>,
    /// Set once a Failure has been handed out or the peer closed
    finished: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, parser: Parser) -> Self {
        Self {
            stream,
            parser,
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            write_buf: BytesMut::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Next packet or failure from the peer.
    ///
    /// Returns `Ok(None)` on end of stream, and on every call after a
    /// [`Event::Failure`] has been returned.
    pub async fn next_event(&mut self) -> io::Result<Option<Event>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_failure() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Ok(Some(event));
            }

            if self.finished {
                return Ok(None);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.parser.buffered_len() > 0 {
                    debug!(
                        buffered = self.parser.buffered_len(),
                        "peer closed mid-packet"
                    );
                }
                self.finished = true;
                return Ok(None);
            }

            trace!(bytes = n, "read");
            let events = self.parser.data_received(&self.read_buf);
            self.read_buf.clear();
            self.pending.extend(events);
        }
    }

    /// Serialise `packet` and write it out in full
    pub async fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.write_buf.clear();
        packet.encode(&mut self.write_buf)?;
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        trace!(packet_type = %packet.packet_type(), bytes = self.write_buf.len(), "sent");
        Ok(())
    }

    /// Shut down the write half of the stream
    pub async fn close(&mut self) -> io::Result<()> {
        self.finished = true;
        self.stream.shutdown().await
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
