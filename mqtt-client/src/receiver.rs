use std::io::{Read, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mqtt_core::{encode_packet, Cursor, Packet, PublishAck, PublishComplete, PublishReceived, QoS};

use crate::connection::Inner;
use crate::options::Message;
use crate::transport::Transport;

const READ_CHUNK: usize = 4096;

/// Background thread that owns the read half of the transport: pulls bytes
/// into a rolling buffer, peels off as many complete frames as are
/// buffered, and hands each to the inbound handler before blocking on the
/// next read.
pub(crate) fn spawn_receiver<T: Transport>(mut reader: T, inner: Arc<Inner<T>>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            loop {
                let mut cur = Cursor::new(&buffer);
                match mqtt_core::read_packet(&mut cur) {
                    Ok(Some(packet)) => {
                        let consumed = buffer.len() - cur.size();
                        buffer.drain(..consumed);
                        handle_frame(packet, &inner);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::error!("malformed frame from broker, closing connection: {}", e);
                        die(&inner);
                        return;
                    }
                }
            }

            match reader.read(&mut chunk) {
                Ok(0) => {
                    log::info!("broker closed the connection");
                    die(&inner);
                    return;
                }
                Ok(n) => {
                    log::trace!("{}", hexplay::HexViewBuilder::new(&chunk[..n]).finish());
                    buffer.extend_from_slice(&chunk[..n]);
                }
                Err(e) => {
                    log::error!("transport read error: {}", e);
                    die(&inner);
                    return;
                }
            }
        }
    })
}

fn die<T: Transport>(inner: &Arc<Inner<T>>) {
    inner.receiver_alive.store(false, Ordering::Release);
    inner.queues.notify_broken();
}

/// Auto-acks inbound PUBLISH and PUBREL, queues application messages, and
/// routes everything else to the transaction correlator's per-type queue.
fn handle_frame<T: Transport>(packet: Packet, inner: &Arc<Inner<T>>) {
    match packet {
        Packet::Publish(p) => {
            let ack = match (p.qos, p.packet_id) {
                (QoS::AtLeastOnce, Some(packet_id)) => Some(Packet::PublishAck(PublishAck { packet_id })),
                (QoS::ExactlyOnce, Some(packet_id)) => {
                    Some(Packet::PublishReceived(PublishReceived { packet_id }))
                }
                _ => None,
            };
            inner.incoming.push(Message {
                topic: p.topic_name,
                payload: p.payload,
                retain: p.retain,
            });
            if let Some(ack) = ack {
                send_auto_ack(inner, &ack);
            }
        }
        Packet::PublishRelease(r) => {
            send_auto_ack(inner, &Packet::PublishComplete(PublishComplete { packet_id: r.packet_id }));
        }
        other => inner.queues.put(other.packet_type(), other),
    }
}

fn send_auto_ack<T: Transport>(inner: &Arc<Inner<T>>, packet: &Packet) {
    let bytes = match encode_packet(packet) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("failed to encode auto-ack {:?}: {}", packet.packet_type(), e);
            return;
        }
    };
    log::debug!("-> {:?} (auto-ack)", packet.packet_type());
    let mut state = inner.transaction.lock().unwrap();
    if let Err(e) = state.writer.write_all(&bytes).and_then(|_| state.writer.flush()) {
        log::warn!("failed to send auto-ack {:?}: {}", packet.packet_type(), e);
    }
}
