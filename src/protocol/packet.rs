//! MQTT Packet Definitions
//!
//! One value type per v3.1.1 control packet. Values are plain data: they are
//! checked when decoded off the wire and again when serialised, never mutated
//! in between.

use bytes::Bytes;

use super::{PacketType, QoS};

/// MQTT Packet - closed set of the 14 v3.1.1 control packets
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    Connect(Box<Connect>),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(PubAck),
    PubRec(PubRec),
    PubRel(PubRel),
    PubComp(PubComp),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq(PingReq),
    PingResp(PingResp),
    Disconnect(Disconnect),
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq(_) => PacketType::PingReq,
            Packet::PingResp(_) => PacketType::PingResp,
            Packet::Disconnect(_) => PacketType::Disconnect,
        }
    }
}

macro_rules! impl_from_packet {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(p: $variant) -> Self {
                    Packet::$variant(p)
                }
            }
        )*
    };
}

impl_from_packet!(
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

impl From<Connect> for Packet {
    fn from(p: Connect) -> Self {
        Packet::Connect(Box::new(p))
    }
}

/// The flags byte of a CONNECT variable header.
///
/// Bit 0 is reserved; a CONNECT that sets it never decodes [MQTT-3.1.2-3].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectFlags {
    pub username: bool,
    pub password: bool,
    pub will_retain: bool,
    pub will_qos: QoS,
    pub will: bool,
    pub clean_session: bool,
}

impl ConnectFlags {
    pub fn to_byte(self) -> u8 {
        ((self.username as u8) << 7)
            | ((self.password as u8) << 6)
            | ((self.will_retain as u8) << 5)
            | ((self.will_qos as u8) << 3)
            | ((self.will as u8) << 2)
            | ((self.clean_session as u8) << 1)
    }
}

/// CONNECT packet (client -> server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    /// Client identifier
    pub client_id: String,
    pub flags: ConnectFlags,
    /// Keep alive interval in seconds
    pub keep_alive: u16,
    /// Present iff `flags.will`
    pub will_topic: Option<String>,
    /// Present iff `flags.will`
    pub will_message: Option<Bytes>,
    /// Present iff `flags.username`
    pub username: Option<String>,
    /// Present iff `flags.password`. Only UTF-8 passwords are accepted.
    pub password: Option<String>,
}

impl Default for Connect {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            flags: ConnectFlags {
                clean_session: true,
                ..Default::default()
            },
            keep_alive: 60,
            will_topic: None,
            will_message: None,
            username: None,
            password: None,
        }
    }
}

/// CONNACK packet (server -> client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnAck {
    /// Session present flag
    pub session_present: bool,
    /// Connect return code; 0 accepts the connection
    pub return_code: u8,
}

/// PUBLISH packet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publish {
    pub duplicate: bool,
    pub qos_level: QoS,
    pub retain: bool,
    pub topic_name: String,
    pub payload: Bytes,
    /// Required for QoS 1 and 2, forbidden for QoS 0
    pub packet_identifier: Option<u16>,
}

/// PUBACK packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAck {
    pub packet_identifier: u16,
}

/// PUBREC packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubRec {
    pub packet_identifier: u16,
}

/// PUBREL packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubRel {
    pub packet_identifier: u16,
}

/// PUBCOMP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubComp {
    pub packet_identifier: u16,
}

/// A single topic filter requested in a SUBSCRIBE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTopicRequest {
    pub topic_filter: String,
    pub max_qos: QoS,
}

impl SubscriptionTopicRequest {
    pub fn new(topic_filter: impl Into<String>, max_qos: QoS) -> Self {
        Self {
            topic_filter: topic_filter.into(),
            max_qos,
        }
    }
}

/// SUBSCRIBE packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_identifier: u16,
    /// At least one request is required on the wire [MQTT-3.8.3-3]
    pub topic_requests: Vec<SubscriptionTopicRequest>,
}

/// SUBACK packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_identifier: u16,
    /// One per requested filter: granted QoS 0-2, or 0x80 for failure
    pub return_codes: Vec<u8>,
}

/// UNSUBSCRIBE packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_identifier: u16,
    pub topics: Vec<String>,
}

/// UNSUBACK packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubAck {
    pub packet_identifier: u16,
}

/// PINGREQ packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingReq;

/// PINGRESP packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingResp;

/// DISCONNECT packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disconnect;
