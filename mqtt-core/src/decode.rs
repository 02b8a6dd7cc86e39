use std::convert::TryFrom;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::packet::*;

#[derive(Debug, Clone, Copy)]
pub struct FixedHeader {
    pub packet_type: PacketType,
    pub flags: u8,
    pub remaining_length: usize,
}

pub fn read_fixed_header(cur: &mut Cursor) -> Result<FixedHeader> {
    let first = cur.peek(0).ok_or(Error::Incomplete)?;
    cur.skip(1);
    let type_nibble = first >> 4;
    let flags = first & 0x0F;
    let packet_type =
        PacketType::try_from(type_nibble).map_err(|_| Error::UnknownPacketType(type_nibble))?;
    let remaining_length = cur.read_varint()?;
    Ok(FixedHeader {
        packet_type,
        flags,
        remaining_length,
    })
}

fn check_reserved_flags(header: &FixedHeader) -> Result<()> {
    if header.flags != RESERVED_FLAGS {
        return Err(Error::MalformedFrame {
            reason: "reserved fixed-header flags must be 0b0010",
        });
    }
    Ok(())
}

/// Reads a length-prefixed binary field (will message, password) out of a
/// body cursor that is already bounded to the frame's declared Remaining
/// Length. Unlike the network read buffer, this slice will never grow, so
/// running short here means the field's own length prefix lied about how
/// much data follows it — a malformed frame, not data to wait for.
fn read_declared_bytes(body: &mut Cursor, declared: usize) -> Result<Vec<u8>> {
    let available = body.size();
    if declared > available {
        return Err(Error::PayloadMismatch { declared, available });
    }
    body.read_bytes(declared)
}

fn expect_empty_body(header: &FixedHeader) -> Result<()> {
    if header.remaining_length != 0 {
        return Err(Error::MalformedFrame {
            reason: "expected an empty variable header and payload",
        });
    }
    Ok(())
}

/// Attempts to read one whole packet from the front of `cur`. Returns
/// `Ok(None)` if the buffer does not yet contain a complete frame, leaving
/// `cur` untouched so the caller can retry once more bytes arrive.
pub fn read_packet(cur: &mut Cursor) -> Result<Option<Packet>> {
    let mut probe = *cur;
    let header = match read_fixed_header(&mut probe) {
        Ok(header) => header,
        Err(Error::Incomplete) => return Ok(None),
        Err(e) => return Err(e),
    };
    if probe.size() < header.remaining_length {
        return Ok(None);
    }
    let mut body = probe.shorten(header.remaining_length);
    let packet = decode_body(&header, &mut body).map_err(|e| {
        log::debug!("failed to decode {:?} frame: {}", header.packet_type, e);
        e
    })?;
    *cur = probe;
    Ok(Some(packet))
}

fn decode_body(header: &FixedHeader, body: &mut Cursor) -> Result<Packet> {
    use PacketType::*;
    match header.packet_type {
        Connect => decode_connect(body),
        ConnectAck => decode_connack(header, body),
        Publish => decode_publish(header, body),
        PublishAck => Ok(Packet::PublishAck(PublishAck {
            packet_id: body.read_u16()?,
        })),
        PublishReceived => Ok(Packet::PublishReceived(PublishReceived {
            packet_id: body.read_u16()?,
        })),
        PublishRelease => {
            check_reserved_flags(header)?;
            Ok(Packet::PublishRelease(PublishRelease {
                packet_id: body.read_u16()?,
            }))
        }
        PublishComplete => Ok(Packet::PublishComplete(PublishComplete {
            packet_id: body.read_u16()?,
        })),
        Subscribe => {
            check_reserved_flags(header)?;
            decode_subscribe(body)
        }
        SubscribeAck => decode_suback(body),
        Unsubscribe => {
            check_reserved_flags(header)?;
            decode_unsubscribe(body)
        }
        UnsubscribeAck => Ok(Packet::UnsubscribeAck(UnsubscribeAck {
            packet_id: body.read_u16()?,
        })),
        PingRequest => {
            expect_empty_body(header)?;
            Ok(Packet::PingRequest)
        }
        PingResponse => {
            expect_empty_body(header)?;
            Ok(Packet::PingResponse)
        }
        Disconnect => {
            expect_empty_body(header)?;
            Ok(Packet::Disconnect)
        }
    }
}

fn decode_connect(body: &mut Cursor) -> Result<Packet> {
    let protocol_name = body.read_string()?;
    if protocol_name != PROTOCOL_NAME {
        return Err(Error::MalformedFrame {
            reason: "unexpected protocol name",
        });
    }
    let protocol_level = body.peek(0).ok_or(Error::Incomplete)?;
    body.skip(1);
    if protocol_level != PROTOCOL_LEVEL {
        return Err(Error::MalformedFrame {
            reason: "unsupported protocol level",
        });
    }

    let flags = body.peek(0).ok_or(Error::Incomplete)?;
    body.skip(1);
    let keep_alive = body.read_u16()?;
    let client_id = body.read_string()?;

    let will_flag = flags & CONNECT_FLAG_WILL != 0;
    let will_retain = flags & CONNECT_FLAG_WILL_RETAIN != 0;
    let will_qos_bits = (flags >> CONNECT_FLAG_WILL_QOS_SHIFT) & 0b11;
    let username_flag = flags & CONNECT_FLAG_USERNAME != 0;
    let password_flag = flags & CONNECT_FLAG_PASSWORD != 0;
    let clean_session = flags & CONNECT_FLAG_CLEAN_SESSION != 0;

    if password_flag && !username_flag {
        return Err(Error::MalformedFrame {
            reason: "password flag set without user name flag",
        });
    }
    if !will_flag && (will_qos_bits != 0 || will_retain) {
        return Err(Error::MalformedFrame {
            reason: "will qos/retain set without will flag",
        });
    }

    let last_will = if will_flag {
        let topic = body.read_string()?;
        let message_len = body.read_u16()? as usize;
        let message = read_declared_bytes(body, message_len)?;
        let qos = QoS::try_from(will_qos_bits).map_err(|_| Error::MalformedFrame {
            reason: "invalid will qos",
        })?;
        Some(LastWill {
            qos,
            retain: will_retain,
            topic,
            message,
        })
    } else {
        None
    };

    let username = if username_flag {
        Some(body.read_string()?)
    } else {
        None
    };
    let password = if password_flag {
        let len = body.read_u16()? as usize;
        Some(read_declared_bytes(body, len)?)
    } else {
        None
    };

    Ok(Packet::Connect(Connect {
        clean_session,
        keep_alive,
        client_id,
        last_will,
        username,
        password,
    }))
}

fn decode_connack(header: &FixedHeader, body: &mut Cursor) -> Result<Packet> {
    if header.remaining_length != 2 {
        return Err(Error::MalformedFrame {
            reason: "CONNACK remaining length must be 2",
        });
    }
    let ack_flags = body.peek(0).ok_or(Error::Incomplete)?;
    body.skip(1);
    let return_code_byte = body.peek(0).ok_or(Error::Incomplete)?;
    body.skip(1);
    let return_code = ConnectReturnCode::try_from(return_code_byte).map_err(|_| {
        Error::MalformedFrame {
            reason: "unknown connect return code",
        }
    })?;
    Ok(Packet::ConnectAck(ConnectAck {
        session_present: ack_flags & 0b1 != 0,
        return_code,
    }))
}

fn decode_publish(header: &FixedHeader, body: &mut Cursor) -> Result<Packet> {
    let dup = header.flags & 0b1000 != 0;
    let qos_bits = (header.flags >> 1) & 0b11;
    let retain = header.flags & 0b1 != 0;
    let qos = QoS::try_from(qos_bits).map_err(|_| Error::MalformedFrame {
        reason: "invalid publish qos in fixed header flags",
    })?;
    let topic_name = body.read_string()?;
    let packet_id = if qos != QoS::AtMostOnce {
        Some(body.read_u16()?)
    } else {
        None
    };
    let payload = body.read_remaining();
    Ok(Packet::Publish(Publish {
        dup,
        qos,
        retain,
        topic_name,
        packet_id,
        payload,
    }))
}

fn decode_subscribe(body: &mut Cursor) -> Result<Packet> {
    let packet_id = body.read_u16()?;
    let mut filters = Vec::new();
    while body.size() > 0 {
        let filter = body.read_string()?;
        let qos_byte = body.peek(0).ok_or(Error::Incomplete)?;
        body.skip(1);
        let qos = QoS::try_from(qos_byte & 0b11).map_err(|_| Error::MalformedFrame {
            reason: "invalid requested qos in subscribe payload",
        })?;
        filters.push((filter, qos));
    }
    if filters.is_empty() {
        return Err(Error::MalformedFrame {
            reason: "SUBSCRIBE must list at least one topic filter",
        });
    }
    Ok(Packet::Subscribe(Subscribe { packet_id, filters }))
}

fn decode_suback(body: &mut Cursor) -> Result<Packet> {
    let packet_id = body.read_u16()?;
    let mut status = Vec::new();
    while body.size() > 0 {
        let byte = body.peek(0).ok_or(Error::Incomplete)?;
        body.skip(1);
        status.push(SubscribeReturnCode::from_byte(byte));
    }
    Ok(Packet::SubscribeAck(SubscribeAck { packet_id, status }))
}

fn decode_unsubscribe(body: &mut Cursor) -> Result<Packet> {
    let packet_id = body.read_u16()?;
    let mut filters = Vec::new();
    while body.size() > 0 {
        filters.push(body.read_string()?);
    }
    if filters.is_empty() {
        return Err(Error::MalformedFrame {
            reason: "UNSUBSCRIBE must list at least one topic filter",
        });
    }
    Ok(Packet::Unsubscribe(Unsubscribe { packet_id, filters }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode_packet;

    #[test]
    fn s3_connack_parse() {
        let bytes = [0x20, 0x02, 0x01, 0x00];
        let mut cur = Cursor::new(&bytes);
        let packet = read_packet(&mut cur).unwrap().unwrap();
        assert_eq!(
            packet,
            Packet::ConnectAck(ConnectAck {
                session_present: true,
                return_code: ConnectReturnCode::Accepted,
            })
        );
    }

    #[test]
    fn incomplete_frame_does_not_consume_cursor() {
        let bytes = [0x20, 0x02, 0x01];
        let mut cur = Cursor::new(&bytes);
        assert_eq!(read_packet(&mut cur).unwrap(), None);
        assert_eq!(cur.size(), 3);
    }

    #[test]
    fn unknown_packet_type_is_malformed() {
        let bytes = [0x00, 0x00];
        let mut cur = Cursor::new(&bytes);
        assert!(matches!(
            read_packet(&mut cur),
            Err(Error::UnknownPacketType(0))
        ));
    }

    #[test]
    fn s4_publish_qos1_round_trip() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: true,
            topic_name: "t".into(),
            packet_id: Some(1),
            payload: b"hi".to_vec(),
        };
        let packet = Packet::Publish(publish);
        let bytes = encode_packet(&packet).unwrap();
        assert_eq!(bytes[0], 0x33);

        let mut cur = Cursor::new(&bytes);
        let parsed = read_packet(&mut cur).unwrap().unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn publish_qos0_has_no_packet_id() {
        let bytes_publish = Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic_name: "a/b".into(),
            packet_id: None,
            payload: Vec::new(),
        };
        let packet = Packet::Publish(bytes_publish);
        let bytes = encode_packet(&packet).unwrap();
        let mut cur = Cursor::new(&bytes);
        let parsed = read_packet(&mut cur).unwrap().unwrap();
        match parsed {
            Packet::Publish(p) => assert_eq!(p.packet_id, None),
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn connect_requires_password_flag_to_imply_username_flag() {
        // flags byte: password bit set, username bit clear
        let mut body = vec![];
        body.extend_from_slice(&[0x00, 0x04]);
        body.extend_from_slice(b"MQTT");
        body.push(PROTOCOL_LEVEL);
        body.push(CONNECT_FLAG_PASSWORD);
        body.extend_from_slice(&[0x00, 0x0A]);
        body.extend_from_slice(&[0x00, 0x00]); // empty client id

        let mut frame = vec![0x10];
        crate::cursor::put_varint(&mut frame, body.len());
        frame.extend_from_slice(&body);

        let mut cur = Cursor::new(&frame);
        assert!(matches!(
            read_packet(&mut cur),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[test]
    fn reserved_flags_enforced_for_pubrel() {
        let bytes = [0x60, 0x02, 0x00, 0x07];
        let mut cur = Cursor::new(&bytes);
        assert!(matches!(
            read_packet(&mut cur),
            Err(Error::MalformedFrame { .. })
        ));
    }

    #[test]
    fn will_message_length_exceeding_body_is_payload_mismatch() {
        // Will flag set; the will message's own length prefix claims more
        // bytes than the frame's Remaining Length actually leaves for it.
        let mut body = vec![];
        body.extend_from_slice(&[0x00, 0x04]);
        body.extend_from_slice(b"MQTT");
        body.push(PROTOCOL_LEVEL);
        body.push(CONNECT_FLAG_WILL);
        body.extend_from_slice(&[0x00, 0x0A]);
        body.extend_from_slice(&[0x00, 0x00]); // empty client id
        body.extend_from_slice(&[0x00, 0x01]); // will topic length
        body.extend_from_slice(b"t"); // well-formed topic
        body.extend_from_slice(&[0x00, 0x05]); // will message declares 5 bytes
        body.extend_from_slice(b"ab"); // but only 2 are present

        let mut frame = vec![0x10];
        crate::cursor::put_varint(&mut frame, body.len());
        frame.extend_from_slice(&body);

        let mut cur = Cursor::new(&frame);
        assert_eq!(
            read_packet(&mut cur),
            Err(Error::PayloadMismatch {
                declared: 5,
                available: 2,
            })
        );
    }

    #[test]
    fn subscribe_rejects_empty_filter_list() {
        let bytes = [0x82, 0x02, 0x00, 0x01];
        let mut cur = Cursor::new(&bytes);
        assert!(matches!(
            read_packet(&mut cur),
            Err(Error::MalformedFrame { .. })
        ));
    }
}
