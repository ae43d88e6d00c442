//! MQTT Packet Encoder
//!
//! Each packet body is built into its own buffer first, so a value that fails
//! validation never leaves a partial packet in the caller's buffer.

use bytes::{BufMut, Bytes, BytesMut};

use super::{write_fixed_header, write_prefixed_data, write_string, ControlPacket};
use crate::protocol::{
    ConnAck, Connect, Disconnect, Packet, PacketType, PingReq, PingResp, PubAck, PubComp, PubRec,
    PubRel, Publish, QoS, SerialisationFailure, SubAck, Subscribe, UnsubAck, Unsubscribe,
    PROTOCOL_LEVEL, PROTOCOL_NAME,
};

/// Encoding half of the per-packet contract
pub trait Serialise: ControlPacket {
    /// Low nibble of the fixed header
    fn header_flags(&self) -> Result<u8, SerialisationFailure> {
        Ok(Self::PACKET_TYPE.required_flags().unwrap_or(0))
    }

    /// Variable header and payload, without the fixed header
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure>;

    /// Append the complete packet to `buf`
    fn encode(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        let flags = self.header_flags()?;
        let mut body = BytesMut::new();
        self.encode_body(&mut body)?;

        write_fixed_header(buf, Self::PACKET_TYPE, flags, body.len())?;
        buf.put_slice(&body);
        Ok(())
    }

    /// Assemble this into an on-wire message
    fn serialise(&self) -> Result<Bytes, SerialisationFailure> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl Packet {
    /// Append the complete packet to `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        match self {
            Packet::Connect(p) => p.encode(buf),
            Packet::ConnAck(p) => p.encode(buf),
            Packet::Publish(p) => p.encode(buf),
            Packet::PubAck(p) => p.encode(buf),
            Packet::PubRec(p) => p.encode(buf),
            Packet::PubRel(p) => p.encode(buf),
            Packet::PubComp(p) => p.encode(buf),
            Packet::Subscribe(p) => p.encode(buf),
            Packet::SubAck(p) => p.encode(buf),
            Packet::Unsubscribe(p) => p.encode(buf),
            Packet::UnsubAck(p) => p.encode(buf),
            Packet::PingReq(p) => p.encode(buf),
            Packet::PingResp(p) => p.encode(buf),
            Packet::Disconnect(p) => p.encode(buf),
        }
    }

    /// Assemble this into an on-wire message
    pub fn serialise(&self) -> Result<Bytes, SerialisationFailure> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl Serialise for Connect {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        let fail = |reason| SerialisationFailure::new(PacketType::Connect, reason);

        if self.flags.will != self.will_topic.is_some()
            || self.flags.will != self.will_message.is_some()
        {
            return Err(fail("Will flag does not match will topic and message"));
        }
        if !self.flags.will && (self.flags.will_retain || self.flags.will_qos != QoS::AtMostOnce) {
            return Err(fail("Will QoS or retain set without will flag"));
        }
        if self.flags.username != self.username.is_some() {
            return Err(fail("Username flag does not match username"));
        }
        if self.flags.password != self.password.is_some() {
            return Err(fail("Password flag does not match password"));
        }

        write_string(buf, PROTOCOL_NAME, PacketType::Connect)?;
        buf.put_u8(PROTOCOL_LEVEL);
        buf.put_u8(self.flags.to_byte());
        buf.put_u16(self.keep_alive);
        write_string(buf, &self.client_id, PacketType::Connect)?;

        if let (Some(topic), Some(message)) = (&self.will_topic, &self.will_message) {
            write_string(buf, topic, PacketType::Connect)?;
            write_prefixed_data(buf, message, PacketType::Connect)?;
        }

        if let Some(ref username) = self.username {
            write_string(buf, username, PacketType::Connect)?;
        }

        // Technically binary data, but only UTF-8 passwords are accepted
        if let Some(ref password) = self.password {
            write_string(buf, password, PacketType::Connect)?;
        }

        Ok(())
    }
}

impl Serialise for ConnAck {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        // 7 reserved bits + session present
        buf.put_u8(self.session_present as u8);
        buf.put_u8(self.return_code);
        Ok(())
    }
}

impl Serialise for Publish {
    fn header_flags(&self) -> Result<u8, SerialisationFailure> {
        Ok(((self.duplicate as u8) << 3) | ((self.qos_level as u8) << 1) | (self.retain as u8))
    }

    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        write_string(buf, &self.topic_name, PacketType::Publish)?;

        match (self.qos_level, self.packet_identifier) {
            (QoS::AtMostOnce, None) => {}
            (QoS::AtMostOnce, Some(_)) => {
                return Err(SerialisationFailure::new(
                    PacketType::Publish,
                    "Packet Identifier on non-QoS 1/2 packet",
                ));
            }
            (_, Some(packet_identifier)) => buf.put_u16(packet_identifier),
            (_, None) => {
                return Err(SerialisationFailure::new(
                    PacketType::Publish,
                    "QoS level > 0 but no Packet Identifier",
                ));
            }
        }

        buf.put_slice(&self.payload);
        Ok(())
    }
}

macro_rules! impl_serialise_ack {
    ($($packet:ident),* $(,)?) => {
        $(
            impl Serialise for $packet {
                fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
                    buf.put_u16(self.packet_identifier);
                    Ok(())
                }
            }
        )*
    };
}

impl_serialise_ack!(PubAck, PubRec, PubRel, PubComp, UnsubAck);

impl Serialise for Subscribe {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        if self.topic_requests.is_empty() {
            return Err(SerialisationFailure::new(
                PacketType::Subscribe,
                "Must contain at least one topic request",
            ));
        }

        buf.put_u16(self.packet_identifier);
        for request in &self.topic_requests {
            write_string(buf, &request.topic_filter, PacketType::Subscribe)?;
            // 6 reserved bits + max QoS
            buf.put_u8(request.max_qos as u8);
        }
        Ok(())
    }
}

impl Serialise for SubAck {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        buf.put_u16(self.packet_identifier);
        buf.put_slice(&self.return_codes);
        Ok(())
    }
}

impl Serialise for Unsubscribe {
    fn encode_body(&self, buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        if self.topics.is_empty() {
            return Err(SerialisationFailure::new(
                PacketType::Unsubscribe,
                "Must contain a payload",
            ));
        }

        buf.put_u16(self.packet_identifier);
        for topic in &self.topics {
            write_string(buf, topic, PacketType::Unsubscribe)?;
        }
        Ok(())
    }
}

impl Serialise for PingReq {
    fn encode_body(&self, _buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        Ok(())
    }
}

impl Serialise for PingResp {
    fn encode_body(&self, _buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        Ok(())
    }
}

impl Serialise for Disconnect {
    fn encode_body(&self, _buf: &mut BytesMut) -> Result<(), SerialisationFailure> {
        Ok(())
    }
}
