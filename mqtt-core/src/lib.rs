//! Codec for MQTT v3.1.1 control packets.
//!
//! Parsing and serialization are pure functions of a byte [`Cursor`]; nothing
//! here talks to a socket. See `mqtt-client` for the connection engine built
//! on top of this codec.

mod cursor;
mod decode;
mod encode;
mod error;
mod packet;

pub use cursor::Cursor;
pub use decode::{read_fixed_header, read_packet, FixedHeader};
pub use encode::encode_packet;
pub use error::{Error, Result};
pub use packet::{
    Connect, ConnectAck, ConnectReturnCode, LastWill, Packet, PacketId, PacketType, Publish,
    PublishAck, PublishComplete, PublishReceived, PublishRelease, QoS, Subscribe, SubscribeAck,
    SubscribeReturnCode, Unsubscribe, UnsubscribeAck, PROTOCOL_LEVEL, PROTOCOL_NAME,
};
