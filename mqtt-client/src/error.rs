use mqtt_core::{ConnectReturnCode, PacketType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] mqtt_core::Error),

    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: &'static str },

    #[error("the connection to the broker is broken")]
    BrokenConnection,

    #[error("not connected")]
    NotConnected,

    #[error("broker rejected the connection: {return_code}")]
    ConnectRejected { return_code: ConnectReturnCode },

    #[error("received an unexpected packet while waiting for {waiting_for}")]
    UnexpectedPacket { waiting_for: PacketType },
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn type_name(t: PacketType) -> &'static str {
    match t {
        PacketType::Connect => "CONNECT",
        PacketType::ConnectAck => "CONNACK",
        PacketType::Publish => "PUBLISH",
        PacketType::PublishAck => "PUBACK",
        PacketType::PublishReceived => "PUBREC",
        PacketType::PublishRelease => "PUBREL",
        PacketType::PublishComplete => "PUBCOMP",
        PacketType::Subscribe => "SUBSCRIBE",
        PacketType::SubscribeAck => "SUBACK",
        PacketType::Unsubscribe => "UNSUBSCRIBE",
        PacketType::UnsubscribeAck => "UNSUBACK",
        PacketType::PingRequest => "PINGREQ",
        PacketType::PingResponse => "PINGRESP",
        PacketType::Disconnect => "DISCONNECT",
    }
}
