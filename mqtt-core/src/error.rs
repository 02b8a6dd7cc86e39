use thiserror::Error;

/// Failures the codec can report while parsing or serializing a control packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The cursor ran out of bytes before a parser finished; the caller should
    /// buffer more data and retry rather than treat this as corruption.
    #[error("not enough bytes buffered yet")]
    Incomplete,

    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: &'static str },

    #[error("string field was not well-formed UTF-8")]
    Utf8,

    #[error("remaining length exceeds the protocol maximum of 268,435,455 bytes")]
    RemainingLengthTooLarge,

    #[error("unknown control packet type {0}")]
    UnknownPacketType(u8),

    #[error("frame declared {declared} remaining bytes but only {available} were available")]
    PayloadMismatch { declared: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
