use std::time::Duration;

use mqtt_core::LastWill;

/// A received application message, handed out by [`Connection::get_incoming`](crate::Connection::get_incoming).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Everything the CONNECT handshake needs, built incrementally.
///
/// Mirrors the teacher's `Connector` builder, minus the fields that only
/// make sense for protocol versions or transports this engine doesn't
/// support.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub(crate) client_id: String,
    pub(crate) clean_session: bool,
    pub(crate) last_will: Option<LastWill>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
    pub(crate) transaction_timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn new(client_id: impl Into<String>) -> Self {
        ConnectOptions {
            client_id: client_id.into(),
            clean_session: true,
            last_will: None,
            username: None,
            password: None,
            transaction_timeout: None,
        }
    }

    pub fn clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    pub fn last_will(mut self, will: LastWill) -> Self {
        self.last_will = Some(will);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<Vec<u8>>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Overrides the default request/response timeout (min(10s, 1.5 *
    /// keep-alive)) used for every transaction on this connection.
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }
}
