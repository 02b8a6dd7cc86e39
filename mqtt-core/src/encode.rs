use crate::cursor::{put_string, put_u16, put_varint};
use crate::error::{Error, Result};
use crate::packet::*;

/// Serializes a packet to its wire bytes: fixed header (type+flags, then the
/// remaining-length varint) followed by the variable header and payload.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>> {
    let (flags, body) = encode_body(packet)?;
    let mut out = Vec::with_capacity(2 + body.len());
    out.push(((packet.packet_type() as u8) << 4) | flags);
    put_varint(&mut out, body.len());
    out.extend_from_slice(&body);
    Ok(out)
}

fn encode_body(packet: &Packet) -> Result<(u8, Vec<u8>)> {
    Ok(match packet {
        Packet::Connect(c) => (0, encode_connect(c)),
        Packet::ConnectAck(a) => (0, encode_connack(a)),
        Packet::Publish(p) => (publish_flags(p), encode_publish(p)?),
        Packet::PublishAck(a) => (0, encode_packet_id(a.packet_id)),
        Packet::PublishReceived(a) => (0, encode_packet_id(a.packet_id)),
        Packet::PublishRelease(a) => (RESERVED_FLAGS, encode_packet_id(a.packet_id)),
        Packet::PublishComplete(a) => (0, encode_packet_id(a.packet_id)),
        Packet::Subscribe(s) => (RESERVED_FLAGS, encode_subscribe(s)),
        Packet::SubscribeAck(s) => (0, encode_suback(s)),
        Packet::Unsubscribe(u) => (RESERVED_FLAGS, encode_unsubscribe(u)),
        Packet::UnsubscribeAck(u) => (0, encode_packet_id(u.packet_id)),
        Packet::PingRequest => (0, Vec::new()),
        Packet::PingResponse => (0, Vec::new()),
        Packet::Disconnect => (0, Vec::new()),
    })
}

fn publish_flags(p: &Publish) -> u8 {
    let mut flags = 0u8;
    if p.dup {
        flags |= 0b1000;
    }
    flags |= (p.qos as u8) << 1;
    if p.retain {
        flags |= 0b1;
    }
    flags
}

fn encode_packet_id(id: PacketId) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    put_u16(&mut out, id);
    out
}

fn encode_connect(c: &Connect) -> Vec<u8> {
    let mut out = Vec::new();
    put_string(&mut out, PROTOCOL_NAME);
    out.push(PROTOCOL_LEVEL);

    let mut flags = 0u8;
    if c.clean_session {
        flags |= CONNECT_FLAG_CLEAN_SESSION;
    }
    if let Some(will) = &c.last_will {
        flags |= CONNECT_FLAG_WILL;
        flags |= (will.qos as u8) << CONNECT_FLAG_WILL_QOS_SHIFT;
        if will.retain {
            flags |= CONNECT_FLAG_WILL_RETAIN;
        }
    }
    if c.username.is_some() {
        flags |= CONNECT_FLAG_USERNAME;
    }
    if c.password.is_some() {
        flags |= CONNECT_FLAG_PASSWORD;
    }
    out.push(flags);

    put_u16(&mut out, c.keep_alive);
    put_string(&mut out, &c.client_id);

    if let Some(will) = &c.last_will {
        put_string(&mut out, &will.topic);
        put_u16(&mut out, will.message.len() as u16);
        out.extend_from_slice(&will.message);
    }
    if let Some(username) = &c.username {
        put_string(&mut out, username);
    }
    if let Some(password) = &c.password {
        put_u16(&mut out, password.len() as u16);
        out.extend_from_slice(password);
    }

    out
}

fn encode_connack(a: &ConnectAck) -> Vec<u8> {
    vec![if a.session_present { 1 } else { 0 }, a.return_code as u8]
}

fn encode_publish(p: &Publish) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    put_string(&mut out, &p.topic_name);
    match (p.qos, p.packet_id) {
        (QoS::AtMostOnce, None) => {}
        (QoS::AtMostOnce, Some(_)) => {
            return Err(Error::MalformedFrame {
                reason: "QoS 0 PUBLISH must not carry a packet id",
            })
        }
        (_, Some(id)) => put_u16(&mut out, id),
        (_, None) => {
            return Err(Error::MalformedFrame {
                reason: "QoS>0 PUBLISH must carry a packet id",
            })
        }
    }
    out.extend_from_slice(&p.payload);
    Ok(out)
}

fn encode_subscribe(s: &Subscribe) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, s.packet_id);
    for (filter, qos) in &s.filters {
        put_string(&mut out, filter);
        out.push(*qos as u8);
    }
    out
}

fn encode_suback(s: &SubscribeAck) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, s.packet_id);
    for status in &s.status {
        out.push(status.to_byte());
    }
    out
}

fn encode_unsubscribe(u: &Unsubscribe) -> Vec<u8> {
    let mut out = Vec::new();
    put_u16(&mut out, u.packet_id);
    for filter in &u.filters {
        put_string(&mut out, filter);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_varint_encoding() {
        let mut out = Vec::new();
        put_varint(&mut out, 321);
        assert_eq!(out, vec![0xC1, 0x02]);
    }

    #[test]
    fn s2_connect_serialize() {
        let connect = Connect {
            clean_session: true,
            keep_alive: 10,
            client_id: "a".into(),
            last_will: None,
            username: None,
            password: None,
        };
        let bytes = encode_packet(&Packet::Connect(connect)).unwrap();
        assert_eq!(
            bytes,
            vec![
                0x10, 0x0D, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A, 0x00,
                0x01, b'a',
            ]
        );
    }

    #[test]
    fn s5_pubrel_first_byte() {
        let bytes = encode_packet(&Packet::PublishRelease(PublishRelease { packet_id: 7 })).unwrap();
        assert_eq!(bytes[0], 0x62);
        assert_eq!(bytes, vec![0x62, 0x02, 0x00, 0x07]);
    }

    #[test]
    fn s6_ping_bytes() {
        assert_eq!(
            encode_packet(&Packet::PingRequest).unwrap(),
            vec![0xC0, 0x00]
        );
        assert_eq!(
            encode_packet(&Packet::PingResponse).unwrap(),
            vec![0xD0, 0x00]
        );
    }

    #[test]
    fn connect_with_will_and_credentials_respects_field_order() {
        let connect = Connect {
            clean_session: false,
            keep_alive: 60,
            client_id: "dev-1".into(),
            last_will: Some(LastWill {
                qos: QoS::AtLeastOnce,
                retain: true,
                topic: "status/dev-1".into(),
                message: b"offline".to_vec(),
            }),
            username: Some("alice".into()),
            password: Some(b"hunter2".to_vec()),
        };
        let bytes = encode_packet(&Packet::Connect(connect.clone())).unwrap();

        let mut cur = crate::cursor::Cursor::new(&bytes);
        let parsed = crate::decode::read_packet(&mut cur).unwrap().unwrap();
        assert_eq!(parsed, Packet::Connect(connect));
    }

    #[test]
    fn publish_qos0_rejects_packet_id() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic_name: "t".into(),
            packet_id: Some(1),
            payload: Vec::new(),
        };
        assert!(encode_packet(&Packet::Publish(publish)).is_err());
    }

    #[test]
    fn publish_qos1_requires_packet_id() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic_name: "t".into(),
            packet_id: None,
            payload: Vec::new(),
        };
        assert!(encode_packet(&Packet::Publish(publish)).is_err());
    }

    #[test]
    fn suback_round_trips_failure_byte() {
        let ack = SubscribeAck {
            packet_id: 9,
            status: vec![
                SubscribeReturnCode::Success(QoS::ExactlyOnce),
                SubscribeReturnCode::Failure,
            ],
        };
        let bytes = encode_packet(&Packet::SubscribeAck(ack.clone())).unwrap();
        let mut cur = crate::cursor::Cursor::new(&bytes);
        let parsed = crate::decode::read_packet(&mut cur).unwrap().unwrap();
        assert_eq!(parsed, Packet::SubscribeAck(ack));
    }
}
