//! Blocking connection engine for MQTT v3.1.1.
//!
//! [`Connection`] opens a transport, starts a receiver thread that
//! demultiplexes inbound frames and a watchdog thread that keeps the
//! session alive, then exposes a synchronous request/response API: every
//! operation that expects a reply blocks the calling thread until it
//! arrives, times out, or the connection is declared broken. Wire framing
//! and packet types live in `mqtt-core`; this crate only adds the sockets,
//! threads, and correlation around it.

mod connection;
mod error;
mod options;
mod queues;
mod receiver;
mod transport;
mod watchdog;

pub use connection::Connection;
pub use error::{Error, Result};
pub use options::{ConnectOptions, Message};
pub use transport::Transport;

pub use mqtt_core::{LastWill, PacketId, QoS, SubscribeReturnCode};
