use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use mqtt_core::{
    encode_packet, Connect, Packet, PacketId, PacketType, Publish, PublishRelease, QoS, Subscribe,
    SubscribeReturnCode, Unsubscribe,
};

use crate::error::{type_name, Error, Result};
use crate::options::{ConnectOptions, Message};
use crate::queues::InboundQueues;
use crate::receiver::spawn_receiver;
use crate::transport::Transport;
use crate::watchdog::spawn_watchdog;

/// The write half plus everything a caller must hold the transaction lock
/// to touch: the wire and the packet-id counter.
pub(crate) struct TransactionState<T> {
    pub(crate) writer: T,
    next_packet_id: u16,
}

impl<T> TransactionState<T> {
    fn next_packet_id(&mut self) -> PacketId {
        loop {
            self.next_packet_id = self.next_packet_id.wrapping_add(1);
            if self.next_packet_id != 0 {
                return self.next_packet_id;
            }
        }
    }
}

pub(crate) struct IncomingQueue {
    items: Mutex<std::collections::VecDeque<Message>>,
}

impl IncomingQueue {
    fn new() -> Self {
        IncomingQueue {
            items: Mutex::new(std::collections::VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, message: Message) {
        self.items.lock().unwrap().push_back(message);
    }

    fn pop(&self) -> Option<Message> {
        self.items.lock().unwrap().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }
}

/// Shared engine state: the receiver and watchdog threads each hold an
/// `Arc` to this, alongside the `Connection` handle the caller holds.
pub(crate) struct Inner<T> {
    pub(crate) transaction: Mutex<TransactionState<T>>,
    pub(crate) queues: InboundQueues,
    pub(crate) incoming: IncomingQueue,
    keep_connection: AtomicBool,
    pub(crate) receiver_alive: AtomicBool,
    pub(crate) last_activity: Mutex<Instant>,
    pub(crate) keep_alive: Duration,
    transaction_timeout: Duration,
}

impl<T: Transport> Inner<T> {
    fn write_locked(&self, state: &mut TransactionState<T>, packet: &Packet) -> Result<()> {
        let bytes = encode_packet(packet)?;
        log::debug!("-> {:?} ({} bytes)", packet.packet_type(), bytes.len());
        log::trace!("{}", hexplay::HexViewBuilder::new(&bytes).finish());
        state.writer.write_all(&bytes)?;
        state.writer.flush()?;
        *self.last_activity.lock().unwrap() = Instant::now();
        Ok(())
    }

    fn wait_for(&self, resp_type: PacketType, timeout: Duration) -> Result<Packet> {
        match self.queues.wait_and_take(resp_type, timeout) {
            Some(packet) => {
                log::debug!("<- {:?}", packet.packet_type());
                Ok(packet)
            }
            None if !self.receiver_alive.load(Ordering::Acquire) => Err(Error::BrokenConnection),
            None => Err(Error::Timeout {
                waiting_for: type_name(resp_type),
            }),
        }
    }

    /// Runs `request` through the full clear -> send -> wait -> dequeue
    /// sequence under one acquisition of the transaction mutex, so at most
    /// one transaction is ever in flight on this connection.
    fn send_and_wait(&self, request: Packet, timeout: Duration) -> Result<Option<Packet>> {
        let expected = request.expected_response();
        let mut state = self.transaction.lock().unwrap();
        if let Some(resp_type) = expected {
            self.queues.clear(resp_type);
        }
        self.write_locked(&mut state, &request)?;
        match expected {
            None => Ok(None),
            Some(resp_type) => self.wait_for(resp_type, timeout).map(Some),
        }
    }

    fn connect(&self, options: &ConnectOptions) -> Result<bool> {
        let timeout = options.transaction_timeout.unwrap_or(self.transaction_timeout);
        let request = Packet::Connect(Connect {
            clean_session: options.clean_session,
            keep_alive: self.keep_alive.as_secs() as u16,
            client_id: options.client_id.clone(),
            last_will: options.last_will.clone(),
            username: options.username.clone(),
            password: options.password.clone(),
        });
        match self.send_and_wait(request, timeout)? {
            Some(Packet::ConnectAck(ack)) => {
                ack.return_code
                    .ok()
                    .map_err(|return_code| Error::ConnectRejected { return_code })?;
                self.keep_connection.store(true, Ordering::Release);
                Ok(ack.session_present)
            }
            _ => Err(Error::UnexpectedPacket {
                waiting_for: PacketType::ConnectAck,
            }),
        }
    }

    fn publish_qos0(&self, retain: bool, topic: String, payload: Vec<u8>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let request = Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain,
            topic_name: topic,
            packet_id: None,
            payload,
        });
        self.send_and_wait(request, self.transaction_timeout)?;
        Ok(())
    }

    fn publish_qos1(&self, retain: bool, dup: bool, topic: String, payload: Vec<u8>) -> Result<PacketId> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let mut state = self.transaction.lock().unwrap();
        let packet_id = state.next_packet_id();
        let request = Packet::Publish(Publish {
            dup,
            qos: QoS::AtLeastOnce,
            retain,
            topic_name: topic,
            packet_id: Some(packet_id),
            payload,
        });
        self.queues.clear(PacketType::PublishAck);
        self.write_locked(&mut state, &request)?;
        self.wait_for(PacketType::PublishAck, self.transaction_timeout)?;
        Ok(packet_id)
    }

    /// QoS 2 is a single non-reentrant PUBLISH/PUBREC then PUBREL/PUBCOMP
    /// sequence, run under one acquisition of the transaction mutex rather
    /// than as two independent transactions.
    fn publish_qos2(&self, retain: bool, dup: bool, topic: String, payload: Vec<u8>) -> Result<PacketId> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let mut state = self.transaction.lock().unwrap();
        let packet_id = state.next_packet_id();
        let publish = Packet::Publish(Publish {
            dup,
            qos: QoS::ExactlyOnce,
            retain,
            topic_name: topic,
            packet_id: Some(packet_id),
            payload,
        });
        self.queues.clear(PacketType::PublishReceived);
        self.write_locked(&mut state, &publish)?;
        self.wait_for(PacketType::PublishReceived, self.transaction_timeout)?;

        let release = Packet::PublishRelease(PublishRelease { packet_id });
        self.queues.clear(PacketType::PublishComplete);
        self.write_locked(&mut state, &release)?;
        self.wait_for(PacketType::PublishComplete, self.transaction_timeout)?;

        Ok(packet_id)
    }

    fn subscribe(&self, filters: Vec<(String, QoS)>) -> Result<Vec<SubscribeReturnCode>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let mut state = self.transaction.lock().unwrap();
        let packet_id = state.next_packet_id();
        let request = Packet::Subscribe(Subscribe { packet_id, filters });
        self.queues.clear(PacketType::SubscribeAck);
        self.write_locked(&mut state, &request)?;
        match self.wait_for(PacketType::SubscribeAck, self.transaction_timeout)? {
            Packet::SubscribeAck(ack) => Ok(ack.status),
            _ => Err(Error::UnexpectedPacket {
                waiting_for: PacketType::SubscribeAck,
            }),
        }
    }

    fn unsubscribe(&self, filters: Vec<String>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let mut state = self.transaction.lock().unwrap();
        let packet_id = state.next_packet_id();
        let request = Packet::Unsubscribe(Unsubscribe { packet_id, filters });
        self.queues.clear(PacketType::UnsubscribeAck);
        self.write_locked(&mut state, &request)?;
        self.wait_for(PacketType::UnsubscribeAck, self.transaction_timeout)?;
        Ok(())
    }

    pub(crate) fn ping(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.send_and_wait(Packet::PingRequest, self.transaction_timeout)?;
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let mut state = self.transaction.lock().unwrap();
        self.keep_connection.store(false, Ordering::Release);
        self.write_locked(&mut state, &Packet::Disconnect)?;
        state.writer.shutdown()?;
        Ok(())
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.keep_connection.load(Ordering::Acquire) && self.receiver_alive.load(Ordering::Acquire)
    }
}

fn default_transaction_timeout(keep_alive: Duration) -> Duration {
    let suggested = Duration::from_secs(10);
    let cap = keep_alive.mul_f64(1.5);
    if keep_alive.is_zero() {
        suggested
    } else {
        suggested.min(cap)
    }
}

/// A live connection to an MQTT v3.1.1 broker.
///
/// Constructing one opens the transport and starts the receiver and
/// keep-alive watchdog threads; [`Connection::connect`] then performs the
/// CONNECT/CONNACK handshake over it.
pub struct Connection<T: Transport> {
    inner: Arc<Inner<T>>,
    receiver_join: Mutex<Option<JoinHandle<()>>>,
    watchdog_stop: Arc<AtomicBool>,
    watchdog_join: Mutex<Option<JoinHandle<()>>>,
}

impl Connection<TcpStream> {
    pub fn open<A: ToSocketAddrs>(addr: A, keep_alive: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::with_transport(stream, keep_alive)
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(transport: T, keep_alive: Duration) -> Result<Self> {
        let reader = transport.try_clone()?;
        let inner = Arc::new(Inner {
            transaction: Mutex::new(TransactionState {
                writer: transport,
                next_packet_id: 0,
            }),
            queues: InboundQueues::new(),
            incoming: IncomingQueue::new(),
            keep_connection: AtomicBool::new(false),
            receiver_alive: AtomicBool::new(true),
            last_activity: Mutex::new(Instant::now()),
            keep_alive,
            transaction_timeout: default_transaction_timeout(keep_alive),
        });

        let receiver_join = spawn_receiver(reader, Arc::clone(&inner));
        let watchdog_stop = Arc::new(AtomicBool::new(false));
        let watchdog_join = spawn_watchdog(Arc::clone(&inner), Arc::clone(&watchdog_stop));

        Ok(Connection {
            inner,
            receiver_join: Mutex::new(Some(receiver_join)),
            watchdog_stop,
            watchdog_join: Mutex::new(Some(watchdog_join)),
        })
    }

    pub fn connect(&self, options: &ConnectOptions) -> Result<bool> {
        self.inner.connect(options)
    }

    pub fn publish_qos0(&self, retain: bool, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.inner.publish_qos0(retain, topic.into(), payload.into())
    }

    pub fn publish_qos1(
        &self,
        retain: bool,
        dup: bool,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<PacketId> {
        self.inner.publish_qos1(retain, dup, topic.into(), payload.into())
    }

    pub fn publish_qos2(
        &self,
        retain: bool,
        dup: bool,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<PacketId> {
        self.inner.publish_qos2(retain, dup, topic.into(), payload.into())
    }

    pub fn subscribe(&self, filters: &[(&str, QoS)]) -> Result<Vec<SubscribeReturnCode>> {
        let filters = filters.iter().map(|(f, q)| (f.to_string(), *q)).collect();
        self.inner.subscribe(filters)
    }

    pub fn unsubscribe(&self, filters: &[&str]) -> Result<()> {
        let filters = filters.iter().map(|f| f.to_string()).collect();
        self.inner.unsubscribe(filters)
    }

    pub fn ping(&self) -> Result<()> {
        self.inner.ping()
    }

    /// Sends DISCONNECT, shuts the transport down, and joins the watchdog
    /// and receiver threads in that order.
    pub fn disconnect(&self) -> Result<()> {
        let result = self.inner.disconnect();
        self.join_background_threads();
        result
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_incoming_empty(&self) -> bool {
        self.inner.incoming.is_empty()
    }

    pub fn get_incoming(&self) -> Option<Message> {
        self.inner.incoming.pop()
    }

    fn join_background_threads(&self) {
        self.watchdog_stop.store(true, Ordering::Release);
        if let Some(handle) = self.watchdog_join.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.receiver_join.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.join_background_threads();
    }
}
