//! Per-role packet dispatch tables, indexed by the 4-bit type code.
//!
//! A `None` slot is a type this role never receives: reserved codes 0 and 15,
//! and packets that only flow the other way.

use crate::codec::{decode_as, Deserialiser};
use crate::protocol::{
    ConnAck, Connect, Disconnect, PingReq, PingResp, PubAck, PubComp, PubRec, PubRel, Publish,
    SubAck, Subscribe, UnsubAck, Unsubscribe,
};

pub(super) type DispatchTable = [Option<Deserialiser>; 16];

/// Packets a client may send to a server
pub(super) static SERVER_PACKETS: DispatchTable = [
    None,
    Some(decode_as::<Connect> as Deserialiser),
    None,
    Some(decode_as::<Publish> as Deserialiser),
    Some(decode_as::<PubAck> as Deserialiser),
    Some(decode_as::<PubRec> as Deserialiser),
    Some(decode_as::<PubRel> as Deserialiser),
    Some(decode_as::<PubComp> as Deserialiser),
    Some(decode_as::<Subscribe> as Deserialiser),
    None,
    Some(decode_as::<Unsubscribe> as Deserialiser),
    None,
    Some(decode_as::<PingReq> as Deserialiser),
    None,
    Some(decode_as::<Disconnect> as Deserialiser),
    None,
];

/// Packets a server may send to a client
pub(super) static CLIENT_PACKETS: DispatchTable = [
    None,
    None,
    Some(decode_as::<ConnAck> as Deserialiser),
    Some(decode_as::<Publish> as Deserialiser),
    Some(decode_as::<PubAck> as Deserialiser),
    Some(decode_as::<PubRec> as Deserialiser),
    Some(decode_as::<PubRel> as Deserialiser),
    Some(decode_as::<PubComp> as Deserialiser),
    None,
    Some(decode_as::<SubAck> as Deserialiser),
    None,
    Some(decode_as::<UnsubAck> as Deserialiser),
    None,
    Some(decode_as::<PingResp> as Deserialiser),
    None,
    None,
];
