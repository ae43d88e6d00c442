//! MQTT Protocol definitions and types
//!
//! Defines the MQTT v3.1.1 control packets and the errors raised while
//! moving them on and off the wire.

use std::fmt;

mod error;
mod packet;

pub use error::{ParseFailure, SerialisationFailure};
pub use packet::*;

/// Protocol name carried in every CONNECT
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level for MQTT v3.1.1
pub const PROTOCOL_LEVEL: u8 = 4;

/// Quality of Service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    /// Decode a 2-bit QoS value. `0b11` is reserved [MQTT-3.3.1-4].
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// MQTT Packet Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Packet types 0 and 15 are reserved in v3.1.1
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(PacketType::Connect),
            2 => Some(PacketType::ConnAck),
            3 => Some(PacketType::Publish),
            4 => Some(PacketType::PubAck),
            5 => Some(PacketType::PubRec),
            6 => Some(PacketType::PubRel),
            7 => Some(PacketType::PubComp),
            8 => Some(PacketType::Subscribe),
            9 => Some(PacketType::SubAck),
            10 => Some(PacketType::Unsubscribe),
            11 => Some(PacketType::UnsubAck),
            12 => Some(PacketType::PingReq),
            13 => Some(PacketType::PingResp),
            14 => Some(PacketType::Disconnect),
            _ => None,
        }
    }

    /// The fixed header flags this packet type must carry.
    ///
    /// PUBLISH has no fixed value; its flags encode DUP, QoS and RETAIN.
    pub fn required_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0x02),
            _ => Some(0x00),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Connect => "Connect",
            PacketType::ConnAck => "ConnAck",
            PacketType::Publish => "Publish",
            PacketType::PubAck => "PubAck",
            PacketType::PubRec => "PubRec",
            PacketType::PubRel => "PubRel",
            PacketType::PubComp => "PubComp",
            PacketType::Subscribe => "Subscribe",
            PacketType::SubAck => "SubAck",
            PacketType::Unsubscribe => "Unsubscribe",
            PacketType::UnsubAck => "UnsubAck",
            PacketType::PingReq => "PingReq",
            PacketType::PingResp => "PingResp",
            PacketType::Disconnect => "Disconnect",
        };
        f.write_str(name)
    }
}
