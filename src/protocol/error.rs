//! Protocol error types

use std::fmt;

use super::PacketType;

/// Errors that can occur while decoding a fixed header or packet body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// A field ran past the end of the framed body
    OutOfData { needed: usize, available: usize },
    /// Remaining length needs a fifth continuation byte
    PacketTooBig,
    /// Remaining length is above the configured limit
    PacketTooLarge { length: usize, limit: usize },
    /// Ill-formed UTF-8 [MQTT-1.5.3-1]
    InvalidUtf8,
    /// UTF-8 encoding of a code point in U+D800..U+DFFF [MQTT-1.5.3-1]
    Surrogates,
    /// String contains U+0000 [MQTT-1.5.3-2]
    NullCharacter,
    /// Packet-specific conformance violation
    Malformed {
        packet: PacketType,
        reason: &'static str,
    },
}

impl ParseFailure {
    pub(crate) fn malformed(packet: PacketType, reason: &'static str) -> Self {
        ParseFailure::Malformed { packet, reason }
    }

    /// The packet type being decoded, when the failure is specific to one
    pub fn packet_type(&self) -> Option<PacketType> {
        match self {
            ParseFailure::Malformed { packet, .. } => Some(*packet),
            _ => None,
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfData { needed, available } => write!(
                f,
                "cannot read {} bytes, only {} available",
                needed, available
            ),
            Self::PacketTooBig => write!(f, "Too big packet size"),
            Self::PacketTooLarge { length, limit } => write!(
                f,
                "Packet too large: remaining length {} exceeds limit of {}",
                length, limit
            ),
            Self::InvalidUtf8 => write!(f, "Invalid UTF-8 string"),
            Self::Surrogates => write!(f, "Invalid UTF-8 string (contains surrogates)"),
            Self::NullCharacter => write!(f, "Invalid UTF-8 string (contains nulls)"),
            Self::Malformed { packet, reason } => write!(f, "{} in {}", reason, packet),
        }
    }
}

impl std::error::Error for ParseFailure {}

/// A packet value that cannot be put on the wire.
///
/// Serialisation borrows the value, so the caller still holds it; the failure
/// names its type and the violated invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialisationFailure {
    pub packet: PacketType,
    pub reason: &'static str,
}

impl SerialisationFailure {
    pub(crate) fn new(packet: PacketType, reason: &'static str) -> Self {
        Self { packet, reason }
    }
}

impl fmt::Display for SerialisationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot serialise {}: {}", self.packet, self.reason)
    }
}

impl std::error::Error for SerialisationFailure {}
