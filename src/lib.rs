//! mqtt-wire - MQTT v3.1.1 packet codec and stream parser
//!
//! Bit-exact encoding and decoding of the fourteen MQTT v3.1.1 control
//! packets, and an incremental parser that reassembles them from an
//! arbitrarily chunked byte stream.
//!
//! ```
//! use mqtt_wire::{Event, Parser, Role};
//!
//! let mut parser = Parser::new(Role::Server);
//! let connect = b"\x10\x13\x00\x04MQTT\x04\x02\x00\x78\x00\x07test123";
//!
//! let mut events = Vec::new();
//! for byte in connect.chunks(1) {
//!     events.extend(parser.data_received(byte));
//! }
//! assert_eq!(events.len(), 1);
//! assert!(matches!(events[0], Event::Packet(_)));
//! ```

pub mod codec;
pub mod config;
pub mod parser;
pub mod protocol;
pub mod transport;

pub use codec::{Deserialise, Serialise};
pub use config::Config;
pub use parser::{Event, Failure, Parser, Phase, Role};
pub use protocol::{Packet, PacketType, ParseFailure, QoS, SerialisationFailure};
pub use transport::{Connection, TransportError};
