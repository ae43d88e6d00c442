//! MQTT Stream Parser
//!
//! Reassembles MQTT control packets from an arbitrarily chunked byte stream.
//! The parser performs no I/O: the owner of the connection feeds it every
//! chunk it reads, in order, and gets back the packets that became complete.
//!
//! Feeding the same bytes in any chunking yields the same sequence of events.
//! A [`Failure`] is terminal: the parser drops all later input and the owner
//! is expected to close the connection [MQTT-4.8.0-1].

mod table;


use std::fmt;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::codec::{
    read_fixed_header, Deserialiser, FixedHeader, Reader, DEFAULT_MAX_REMAINING_LENGTH,
    MAX_REMAINING_LENGTH,
};
use crate::protocol::{Packet, PacketType, ParseFailure};

/// Which side of the connection this parser decodes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Decodes what a client sends: CONNECT must come first
    Server,
    /// Decodes what a server sends: CONNACK must come first
    Client,
}

impl Role {
    /// The only packet type accepted first, and never again
    pub fn first_packet(self) -> PacketType {
        match self {
            Role::Server => PacketType::Connect,
            Role::Client => PacketType::ConnAck,
        }
    }

    /// Whether this role decodes the given packet type at all
    pub fn accepts(self, packet_type: PacketType) -> bool {
        self.table()[packet_type as usize].is_some()
    }

    fn table(self) -> &'static table::DispatchTable {
        match self {
            Role::Server => &table::SERVER_PACKETS,
            Role::Client => &table::CLIENT_PACKETS,
        }
    }
}

/// Observable state of the framing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHeader,
    CollectingBody,
    /// Terminal; all further input is discarded
    ProtocolViolation,
}

#[derive(Debug, Clone, Copy)]
enum State {
    AwaitingHeader,
    CollectingBody(FixedHeader),
    ProtocolViolation,
}

/// An unrecoverable stream condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    packet_type: Option<PacketType>,
    reason: String,
}

impl Failure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            packet_type: None,
            reason: reason.into(),
        }
    }

    /// Attach the type of the packet being decoded when this occurred
    pub fn with_packet_type(mut self, packet_type: PacketType) -> Self {
        self.packet_type = Some(packet_type);
        self
    }

    /// `None` when no fixed header was decoded, or its type is reserved
    pub fn packet_type(&self) -> Option<PacketType> {
        self.packet_type
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl From<ParseFailure> for Failure {
    fn from(e: ParseFailure) -> Self {
        match e {
            ParseFailure::OutOfData { .. } => {
                Failure::new(format!("Corrupt data, fell off the end: {}", e))
            }
            _ => Failure::new(e.to_string()),
        }
    }
}

/// One item emitted by [`Parser::data_received`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Packet(Packet),
    Failure(Failure),
}

impl Event {
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::Failure(_))
    }

    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Event::Packet(p) => Some(p),
            Event::Failure(_) => None,
        }
    }
}

/// Per-connection MQTT framing state machine
pub struct Parser {
    role: Role,
    packets: &'static table::DispatchTable,
    /// Unconsumed input; consumed bytes are split off the front
    buf: BytesMut,
    state: State,
    packet_count: u64,
    max_remaining_length: usize,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("buffered", &self.buf.len())
            .field("packet_count", &self.packet_count)
            .field("max_remaining_length", &self.max_remaining_length)
            .finish()
    }
}

impl Parser {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            packets: role.table(),
            buf: BytesMut::new(),
            state: State::AwaitingHeader,
            packet_count: 0,
            max_remaining_length: DEFAULT_MAX_REMAINING_LENGTH,
        }
    }

    /// Parser for the server side of a connection (expects CONNECT first)
    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    /// Parser for the client side of a connection (expects CONNACK first)
    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    /// Cap the remaining length a peer may announce, at most 268,435,455
    pub fn with_max_remaining_length(mut self, size: usize) -> Self {
        self.max_remaining_length = size.min(MAX_REMAINING_LENGTH);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::AwaitingHeader => Phase::AwaitingHeader,
            State::CollectingBody(_) => Phase::CollectingBody,
            State::ProtocolViolation => Phase::ProtocolViolation,
        }
    }

    /// Fixed header of the packet whose body is still being buffered
    pub fn pending_header(&self) -> Option<FixedHeader> {
        match self.state {
            State::CollectingBody(header) => Some(header),
            _ => None,
        }
    }

    /// Packets successfully decoded on this connection
    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Bytes received but not yet consumed
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    pub fn max_remaining_length(&self) -> usize {
        self.max_remaining_length
    }

    /// Feed the next chunk of the stream.
    ///
    /// Returns every packet completed by this chunk, in order. A returned
    /// [`Event::Failure`] is always the last event this parser ever emits.
    pub fn data_received(&mut self, data: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();

        if matches!(self.state, State::ProtocolViolation) {
            return events;
        }

        self.buf.extend_from_slice(data);

        loop {
            let header = match self.state {
                State::ProtocolViolation => break,
                State::CollectingBody(header) => header,
                State::AwaitingHeader => {
                    // Type byte plus at least one length byte
                    if self.buf.len() < 2 {
                        break;
                    }

                    match read_fixed_header(&self.buf) {
                        Ok(Some((header, header_len))) => {
                            if header.remaining_length > self.max_remaining_length {
                                let failure = Failure::from(ParseFailure::PacketTooLarge {
                                    length: header.remaining_length,
                                    limit: self.max_remaining_length,
                                });
                                self.fail(&mut events, tag(failure, header));
                                break;
                            }

                            self.buf.advance(header_len);
                            self.state = State::CollectingBody(header);
                            header
                        }
                        // Length field split across reads; keep the bytes
                        Ok(None) => break,
                        Err(e) => {
                            self.fail(&mut events, e.into());
                            break;
                        }
                    }
                }
            };

            if self.buf.len() < header.remaining_length {
                break;
            }

            match self.dispatch(header) {
                Ok(packet) => {
                    trace!(
                        packet_type = %packet.packet_type(),
                        remaining_length = header.remaining_length,
                        "decoded packet"
                    );
                    events.push(Event::Packet(packet));
                    self.packet_count += 1;
                    self.state = State::AwaitingHeader;
                }
                Err(failure) => {
                    self.fail(&mut events, tag(failure, header));
                    break;
                }
            }
        }

        events
    }

    /// Check ordering, look up the role's decoder and decode one framed body
    fn dispatch(&mut self, header: FixedHeader) -> Result<Packet, Failure> {
        let first = self.role.first_packet();

        // [MQTT-3.1.0-1] The first packet must be CONNECT (or CONNACK)
        if self.packet_count == 0 && header.packet_type != first as u8 {
            return Err(Failure::new(format!("{} packet was not first", first)));
        }

        // [MQTT-3.1.0-2] and never again
        if self.packet_count > 0 && header.packet_type == first as u8 {
            return Err(Failure::new(format!("Multiple {} packets", first)));
        }

        let deserialise: Deserialiser = self
            .packets
            .get(header.packet_type as usize)
            .copied()
            .flatten()
            .ok_or_else(|| {
                Failure::new(format!("Unimplemented packet type {}", header.packet_type))
            })?;

        let body = self.buf.split_to(header.remaining_length);
        let mut reader = Reader::new(&body);

        deserialise(header.flags, &mut reader).map_err(Failure::from)
    }

    fn fail(&mut self, events: &mut Vec<Event>, failure: Failure) {
        debug!(
            role = ?self.role,
            packets = self.packet_count,
            packet_type = ?failure.packet_type(),
            reason = failure.reason(),
            "protocol violation"
        );
        self.state = State::ProtocolViolation;
        self.buf = BytesMut::new();
        events.push(Event::Failure(failure));
    }
}

/// Name the packet a failure belongs to, once its header is known
fn tag(failure: Failure, header: FixedHeader) -> Failure {
    match PacketType::from_u8(header.packet_type) {
        Some(packet_type) => failure.with_packet_type(packet_type),
        None => failure,
    }
}
