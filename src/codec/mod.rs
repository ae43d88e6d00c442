//! MQTT Packet Codec
//!
//! Bit-exact MQTT v3.1.1 encoding and decoding of fixed headers and packet
//! bodies. Framing (finding where a packet ends in a byte stream) lives in
//! [`crate::parser`]; this module only ever sees a header or one framed body.

mod decode;
mod encode;
mod reader;


pub(crate) use decode::{decode_as, Deserialiser};
pub use decode::Deserialise;
pub use encode::Serialise;
pub use reader::Reader;

use bytes::{BufMut, BytesMut};

use crate::protocol::{
    ConnAck, Connect, Disconnect, PacketType, ParseFailure, PingReq, PingResp, PubAck, PubComp,
    PubRec, PubRel, Publish, SerialisationFailure, SubAck, Subscribe, UnsubAck, Unsubscribe,
};

/// Maximum remaining length (268,435,455 bytes = ~256 MB)
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Default cap on an accepted remaining length
pub const DEFAULT_MAX_REMAINING_LENGTH: usize = 1024 * 1024; // 1 MB default

/// A packet type with a fixed type code on the wire
pub trait ControlPacket {
    const PACKET_TYPE: PacketType;
}

macro_rules! impl_control_packet {
    ($($packet:ident),* $(,)?) => {
        $(
            impl ControlPacket for $packet {
                const PACKET_TYPE: PacketType = PacketType::$packet;
            }
        )*
    };
}

impl_control_packet!(
    Connect,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
);

/// Decoded fixed header: type nibble, flags nibble and remaining length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    /// Raw 4-bit type code; 0 and 15 are reserved but still framed
    pub packet_type: u8,
    /// Low nibble of the first byte
    pub flags: u8,
    pub remaining_length: usize,
}

/// Read a fixed header from the front of `buf`.
///
/// Returns `Ok(None)` while the remaining-length field is still incomplete,
/// which is the normal outcome of a partial read and not an error. Returns the
/// header and the number of bytes it occupied once complete.
#[inline]
pub fn read_fixed_header(buf: &[u8]) -> Result<Option<(FixedHeader, usize)>, ParseFailure> {
    let Some(&first_byte) = buf.first() else {
        return Ok(None);
    };

    let Some((remaining_length, len_bytes)) = read_variable_int(&buf[1..])? else {
        return Ok(None);
    };

    Ok(Some((
        FixedHeader {
            packet_type: first_byte >> 4,
            flags: first_byte & 0x0F,
            remaining_length,
        },
        1 + len_bytes,
    )))
}

/// Read a Variable Byte Integer from buffer.
///
/// Returns `Ok(None)` if the buffer ends before the last byte, and
/// [`ParseFailure::PacketTooBig`] as soon as a fourth byte still has its
/// continuation bit set.
#[inline]
pub fn read_variable_int(buf: &[u8]) -> Result<Option<(usize, usize)>, ParseFailure> {
    let mut multiplier: usize = 1;
    let mut value: usize = 0;

    for pos in 0..4 {
        let Some(&byte) = buf.get(pos) else {
            return Ok(None);
        };

        value += ((byte & 0x7F) as usize) * multiplier;

        if (byte & 0x80) == 0 {
            return Ok(Some((value, pos + 1)));
        }

        multiplier *= 128;
    }

    Err(ParseFailure::PacketTooBig)
}

/// Write a Variable Byte Integer to buffer.
/// Returns bytes written, or `None` (writing nothing) if `value` is above
/// [`MAX_REMAINING_LENGTH`].
#[inline]
pub fn write_variable_int(buf: &mut BytesMut, mut value: usize) -> Option<usize> {
    if value > MAX_REMAINING_LENGTH {
        return None;
    }

    let mut count = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        count += 1;
        if value == 0 {
            break;
        }
    }
    Some(count)
}

/// Calculate the number of bytes needed to encode a Variable Byte Integer
#[inline]
pub fn variable_int_len(value: usize) -> usize {
    if value < 128 {
        1
    } else if value < 16_384 {
        2
    } else if value < 2_097_152 {
        3
    } else {
        4
    }
}

/// Write the type/flags byte and the remaining length
pub fn write_fixed_header(
    buf: &mut BytesMut,
    packet_type: PacketType,
    flags: u8,
    remaining_length: usize,
) -> Result<(), SerialisationFailure> {
    if remaining_length > MAX_REMAINING_LENGTH {
        return Err(SerialisationFailure::new(packet_type, "Packet too large"));
    }

    buf.reserve(1 + variable_int_len(remaining_length) + remaining_length);
    buf.put_u8(((packet_type as u8) << 4) | (flags & 0x0F));
    write_variable_int(buf, remaining_length)
        .ok_or_else(|| SerialisationFailure::new(packet_type, "Packet too large"))?;
    Ok(())
}

/// Write a UTF-8 encoded string with its u16 length prefix
#[inline]
pub fn write_string(
    buf: &mut BytesMut,
    s: &str,
    packet_type: PacketType,
) -> Result<(), SerialisationFailure> {
    // [MQTT-1.5.3-2] U+0000 is not allowed in any MQTT string
    if s.contains('\0') {
        return Err(SerialisationFailure::new(
            packet_type,
            "Invalid UTF-8 string (contains nulls)",
        ));
    }
    write_prefixed_data(buf, s.as_bytes(), packet_type)
}

/// Write binary data with its u16 length prefix
#[inline]
pub fn write_prefixed_data(
    buf: &mut BytesMut,
    data: &[u8],
    packet_type: PacketType,
) -> Result<(), SerialisationFailure> {
    let len = u16::try_from(data.len())
        .map_err(|_| SerialisationFailure::new(packet_type, "String too long"))?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}
