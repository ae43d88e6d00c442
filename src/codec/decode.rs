//! MQTT Packet Decoder
//!
//! Turns one framed packet body back into a packet value. The framer has
//! already split the flags nibble off the fixed header and bounded the body.

use tracing::warn;

use super::{ControlPacket, Reader};
use crate::protocol::{
    ConnAck, Connect, ConnectFlags, Disconnect, Packet, PacketType, ParseFailure, PingReq,
    PingResp, PubAck, PubComp, PubRec, PubRel, Publish, QoS, SubAck, Subscribe,
    SubscriptionTopicRequest, UnsubAck, Unsubscribe, PROTOCOL_LEVEL, PROTOCOL_NAME,
};

/// Decoding half of the per-packet contract
pub trait Deserialise: ControlPacket + Sized {
    /// Decode the body fields in wire order. Flags have already been checked
    /// against [`PacketType::required_flags`].
    fn decode_body(flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure>;

    /// Decode a packet from its fixed-header flags and framed body
    fn deserialise(flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        if let Some(required) = Self::PACKET_TYPE.required_flags() {
            if flags != required {
                return Err(ParseFailure::malformed(Self::PACKET_TYPE, "Bad flags"));
            }
        }
        Self::decode_body(flags, body)
    }
}

/// Entry in a role's dispatch table
pub(crate) type Deserialiser = fn(u8, &mut Reader<'_>) -> Result<Packet, ParseFailure>;

pub(crate) fn decode_as<P>(flags: u8, body: &mut Reader<'_>) -> Result<Packet, ParseFailure>
where
    P: Deserialise + Into<Packet>,
{
    P::deserialise(flags, body).map(Into::into)
}

impl Packet {
    /// Decode any packet type from its flags and framed body
    pub fn deserialise(
        packet_type: PacketType,
        flags: u8,
        body: &mut Reader<'_>,
    ) -> Result<Packet, ParseFailure> {
        match packet_type {
            PacketType::Connect => decode_as::<Connect>(flags, body),
            PacketType::ConnAck => decode_as::<ConnAck>(flags, body),
            PacketType::Publish => decode_as::<Publish>(flags, body),
            PacketType::PubAck => decode_as::<PubAck>(flags, body),
            PacketType::PubRec => decode_as::<PubRec>(flags, body),
            PacketType::PubRel => decode_as::<PubRel>(flags, body),
            PacketType::PubComp => decode_as::<PubComp>(flags, body),
            PacketType::Subscribe => decode_as::<Subscribe>(flags, body),
            PacketType::SubAck => decode_as::<SubAck>(flags, body),
            PacketType::Unsubscribe => decode_as::<Unsubscribe>(flags, body),
            PacketType::UnsubAck => decode_as::<UnsubAck>(flags, body),
            PacketType::PingReq => decode_as::<PingReq>(flags, body),
            PacketType::PingResp => decode_as::<PingResp>(flags, body),
            PacketType::Disconnect => decode_as::<Disconnect>(flags, body),
        }
    }
}

/// Fixed-size bodies must be consumed exactly
fn expect_end(packet: PacketType, body: &Reader<'_>) -> Result<(), ParseFailure> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(ParseFailure::malformed(packet, "Unexpected trailing data"))
    }
}

/// Padding after a complete CONNECT/CONNACK is tolerated: some clients send it.
fn warn_quirky(packet: PacketType, body: &Reader<'_>) {
    if !body.is_empty() {
        warn!(
            "Quirky {} -- packet length was {} bytes but only had {} bytes of useful data",
            packet,
            body.len(),
            body.position()
        );
    }
}

impl ConnectFlags {
    pub fn from_byte(byte: u8) -> Result<Self, ParseFailure> {
        // [MQTT-3.1.2-3] Reserved bit must be 0
        if (byte & 0x01) != 0 {
            return Err(ParseFailure::malformed(
                PacketType::Connect,
                "Reserved flag in CONNECT used",
            ));
        }

        let will_qos = QoS::from_u8((byte >> 3) & 0x03)
            .ok_or_else(|| ParseFailure::malformed(PacketType::Connect, "Invalid will QoS"))?;
        let will = (byte & 0x04) != 0;
        let will_retain = (byte & 0x20) != 0;

        // [MQTT-3.1.2-11] [MQTT-3.1.2-13] [MQTT-3.1.2-15]
        if !will && (will_retain || will_qos != QoS::AtMostOnce) {
            return Err(ParseFailure::malformed(
                PacketType::Connect,
                "Will QoS or retain set without will flag",
            ));
        }

        Ok(Self {
            username: (byte & 0x80) != 0,
            password: (byte & 0x40) != 0,
            will_retain,
            will_qos,
            will,
            clean_session: (byte & 0x02) != 0,
        })
    }
}

impl Deserialise for Connect {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let protocol_name = body.read_string()?;
        if protocol_name != PROTOCOL_NAME {
            return Err(ParseFailure::malformed(
                PacketType::Connect,
                "Bad protocol name",
            ));
        }

        if body.read_u8()? != PROTOCOL_LEVEL {
            return Err(ParseFailure::malformed(
                PacketType::Connect,
                "Bad protocol level",
            ));
        }

        let flags = ConnectFlags::from_byte(body.read_u8()?)?;

        // Keep alive, in seconds
        let keep_alive = body.read_u16()?;

        let client_id = body.read_string()?;

        // [MQTT-3.1.3-10] Will topic must be UTF-8
        let (will_topic, will_message) = if flags.will {
            let topic = body.read_string()?;
            let message = body.read_prefixed_data()?;
            (Some(topic), Some(message))
        } else {
            (None, None)
        };

        let username = if flags.username {
            Some(body.read_string()?)
        } else {
            None
        };

        let password = if flags.password {
            Some(body.read_string()?)
        } else {
            None
        };

        warn_quirky(PacketType::Connect, body);

        Ok(Connect {
            client_id,
            flags,
            keep_alive,
            will_topic,
            will_message,
            username,
            password,
        })
    }
}

impl Deserialise for ConnAck {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let acknowledge_flags = body.read_u8()?;
        // Only bit 0 is valid (session present), rest must be 0
        if (acknowledge_flags & 0xFE) != 0 {
            return Err(ParseFailure::malformed(
                PacketType::ConnAck,
                "Reserved flag used",
            ));
        }

        let return_code = body.read_u8()?;

        warn_quirky(PacketType::ConnAck, body);

        Ok(ConnAck {
            session_present: (acknowledge_flags & 0x01) != 0,
            return_code,
        })
    }
}

impl Deserialise for Publish {
    fn decode_body(flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let duplicate = (flags & 0x08) != 0;
        let retain = (flags & 0x01) != 0;

        // [MQTT-3.3.1-4] Both QoS bits set is not a QoS level
        let qos_level = QoS::from_u8((flags >> 1) & 0x03)
            .ok_or_else(|| ParseFailure::malformed(PacketType::Publish, "Invalid QoS value"))?;

        let topic_name = body.read_string()?;

        let packet_identifier = if qos_level != QoS::AtMostOnce {
            Some(body.read_u16()?)
        } else {
            None
        };

        // Payload (remainder)
        let payload = bytes::Bytes::copy_from_slice(body.rest());

        Ok(Publish {
            duplicate,
            qos_level,
            retain,
            topic_name,
            payload,
            packet_identifier,
        })
    }
}

macro_rules! impl_deserialise_ack {
    ($($packet:ident),* $(,)?) => {
        $(
            impl Deserialise for $packet {
                fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
                    let packet_identifier = body.read_u16()?;
                    expect_end(Self::PACKET_TYPE, body)?;
                    Ok($packet { packet_identifier })
                }
            }
        )*
    };
}

impl_deserialise_ack!(PubAck, PubRec, PubRel, PubComp, UnsubAck);

impl Deserialise for Subscribe {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let packet_identifier = body.read_u16()?;

        // [MQTT-3.8.3-3] At least one request; an empty payload runs off the end
        let mut topic_requests = Vec::new();
        loop {
            let topic_filter = body.read_string()?;
            let options = body.read_u8()?;

            if (options & 0xFC) != 0 {
                return Err(ParseFailure::malformed(
                    PacketType::Subscribe,
                    "Data in QoS Reserved area",
                ));
            }

            let max_qos = QoS::from_u8(options)
                .ok_or_else(|| ParseFailure::malformed(PacketType::Subscribe, "Invalid QoS"))?;

            topic_requests.push(SubscriptionTopicRequest {
                topic_filter,
                max_qos,
            });

            if body.is_empty() {
                break;
            }
        }

        Ok(Subscribe {
            packet_identifier,
            topic_requests,
        })
    }
}

impl Deserialise for SubAck {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let packet_identifier = body.read_u16()?;
        let return_codes = body.rest().to_vec();

        Ok(SubAck {
            packet_identifier,
            return_codes,
        })
    }
}

impl Deserialise for Unsubscribe {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        let packet_identifier = body.read_u16()?;

        let mut topics = Vec::new();
        while !body.is_empty() {
            topics.push(body.read_string()?);
        }

        // [MQTT-3.10.3-2] At least one topic filter
        if topics.is_empty() {
            return Err(ParseFailure::malformed(
                PacketType::Unsubscribe,
                "Must contain a payload",
            ));
        }

        Ok(Unsubscribe {
            packet_identifier,
            topics,
        })
    }
}

impl Deserialise for PingReq {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        expect_end(Self::PACKET_TYPE, body)?;
        Ok(PingReq)
    }
}

impl Deserialise for PingResp {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        expect_end(Self::PACKET_TYPE, body)?;
        Ok(PingResp)
    }
}

impl Deserialise for Disconnect {
    fn decode_body(_flags: u8, body: &mut Reader<'_>) -> Result<Self, ParseFailure> {
        expect_end(Self::PACKET_TYPE, body)?;
        Ok(Disconnect)
    }
}
