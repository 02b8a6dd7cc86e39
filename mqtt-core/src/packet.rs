use std::convert::TryFrom;
use std::fmt;

/// MQTT v3.1.1 protocol level, sent in the CONNECT variable header.
pub const PROTOCOL_LEVEL: u8 = 4;
pub const PROTOCOL_NAME: &str = "MQTT";

pub const CONNECT_FLAG_CLEAN_SESSION: u8 = 0b0000_0010;
pub const CONNECT_FLAG_WILL: u8 = 0b0000_0100;
pub const CONNECT_FLAG_WILL_RETAIN: u8 = 0b0010_0000;
pub const CONNECT_FLAG_USERNAME: u8 = 0b1000_0000;
pub const CONNECT_FLAG_PASSWORD: u8 = 0b0100_0000;
pub const CONNECT_FLAG_WILL_QOS_SHIFT: u8 = 3;

/// The reserved fixed-header flag nibble carried by PUBREL, SUBSCRIBE and
/// UNSUBSCRIBE.
pub const RESERVED_FLAGS: u8 = 0b0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnectAck = 2,
    Publish = 3,
    PublishAck = 4,
    PublishReceived = 5,
    PublishRelease = 6,
    PublishComplete = 7,
    Subscribe = 8,
    SubscribeAck = 9,
    Unsubscribe = 10,
    UnsubscribeAck = 11,
    PingRequest = 12,
    PingResponse = 13,
    Disconnect = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        use PacketType::*;
        Ok(match value {
            1 => Connect,
            2 => ConnectAck,
            3 => Publish,
            4 => PublishAck,
            5 => PublishReceived,
            6 => PublishRelease,
            7 => PublishComplete,
            8 => Subscribe,
            9 => SubscribeAck,
            10 => Unsubscribe,
            11 => UnsubscribeAck,
            12 => PingRequest,
            13 => PingResponse,
            14 => Disconnect,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(()),
        }
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            QoS::AtMostOnce => "at-most-once",
            QoS::AtLeastOnce => "at-least-once",
            QoS::ExactlyOnce => "exactly-once",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUserNameOrPassword = 4,
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        use ConnectReturnCode::*;
        Ok(match value {
            0 => Accepted,
            1 => UnacceptableProtocolVersion,
            2 => IdentifierRejected,
            3 => ServerUnavailable,
            4 => BadUserNameOrPassword,
            5 => NotAuthorized,
            _ => return Err(()),
        })
    }
}

impl ConnectReturnCode {
    /// `Ok(())` if the broker accepted the connection, `Err(self)` otherwise.
    pub fn ok(self) -> Result<(), Self> {
        if self == ConnectReturnCode::Accepted {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectReturnCode::Accepted => "connection accepted",
            ConnectReturnCode::UnacceptableProtocolVersion => "unacceptable protocol version",
            ConnectReturnCode::IdentifierRejected => "client identifier rejected",
            ConnectReturnCode::ServerUnavailable => "server unavailable",
            ConnectReturnCode::BadUserNameOrPassword => "bad user name or password",
            ConnectReturnCode::NotAuthorized => "not authorized",
        };
        f.write_str(s)
    }
}

pub type PacketId = u16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub last_will: Option<LastWill>,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    pub message: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAck {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic_name: String,
    pub packet_id: Option<PacketId>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishAck {
    pub packet_id: PacketId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceived {
    pub packet_id: PacketId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRelease {
    pub packet_id: PacketId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishComplete {
    pub packet_id: PacketId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    pub packet_id: PacketId,
    pub filters: Vec<(String, QoS)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeReturnCode {
    Success(QoS),
    Failure,
}

impl SubscribeReturnCode {
    pub const FAILURE: u8 = 0x80;

    pub fn from_byte(byte: u8) -> Self {
        if byte & 0x80 != 0 {
            return SubscribeReturnCode::Failure;
        }
        match QoS::try_from(byte & 0b11) {
            Ok(qos) => SubscribeReturnCode::Success(qos),
            Err(()) => SubscribeReturnCode::Failure,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            SubscribeReturnCode::Success(qos) => qos as u8,
            SubscribeReturnCode::Failure => Self::FAILURE,
        }
    }
}

impl From<SubscribeReturnCode> for u8 {
    fn from(code: SubscribeReturnCode) -> u8 {
        code.to_byte()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeAck {
    pub packet_id: PacketId,
    pub status: Vec<SubscribeReturnCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsubscribe {
    pub packet_id: PacketId,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubscribeAck {
    pub packet_id: PacketId,
}

/// One arm per MQTT v3.1.1 control packet type. Parse dispatches on the
/// fixed header's type nibble; serialize is per-arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    ConnectAck(ConnectAck),
    Publish(Publish),
    PublishAck(PublishAck),
    PublishReceived(PublishReceived),
    PublishRelease(PublishRelease),
    PublishComplete(PublishComplete),
    Subscribe(Subscribe),
    SubscribeAck(SubscribeAck),
    Unsubscribe(Unsubscribe),
    UnsubscribeAck(UnsubscribeAck),
    PingRequest,
    PingResponse,
    Disconnect,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnectAck(_) => PacketType::ConnectAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PublishAck(_) => PacketType::PublishAck,
            Packet::PublishReceived(_) => PacketType::PublishReceived,
            Packet::PublishRelease(_) => PacketType::PublishRelease,
            Packet::PublishComplete(_) => PacketType::PublishComplete,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubscribeAck(_) => PacketType::SubscribeAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubscribeAck(_) => PacketType::UnsubscribeAck,
            Packet::PingRequest => PacketType::PingRequest,
            Packet::PingResponse => PacketType::PingResponse,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    /// The packet type this request is expecting back, if any. `None` means
    /// the transaction correlator should not wait for anything (PUBLISH at
    /// QoS 0, DISCONNECT, and every response/auto-ack packet itself).
    pub fn expected_response(&self) -> Option<PacketType> {
        match self {
            Packet::Connect(_) => Some(PacketType::ConnectAck),
            Packet::Publish(p) => match p.qos {
                QoS::AtMostOnce => None,
                QoS::AtLeastOnce => Some(PacketType::PublishAck),
                QoS::ExactlyOnce => Some(PacketType::PublishReceived),
            },
            Packet::PublishRelease(_) => Some(PacketType::PublishComplete),
            Packet::Subscribe(_) => Some(PacketType::SubscribeAck),
            Packet::Unsubscribe(_) => Some(PacketType::UnsubscribeAck),
            Packet::PingRequest => Some(PacketType::PingResponse),
            _ => None,
        }
    }
}
