//! Drives `Connection` against a loopback `TcpListener` standing in for a
//! broker, since there's no real broker available to these tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use mqtt_client::{ConnectOptions, Connection, Error};

fn accept_one(listener: TcpListener) -> TcpStream {
    let (stream, _) = listener.accept().unwrap();
    stream
}

fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).unwrap();
    let mut remaining = vec![header[1]];
    let mut len = (header[1] & 0x7F) as usize;
    let mut shift = 7;
    let mut last = header[1];
    while last & 0x80 != 0 {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).unwrap();
        remaining.push(byte[0]);
        len += ((byte[0] & 0x7F) as usize) << shift;
        shift += 7;
        last = byte[0];
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    let mut frame = vec![header[0]];
    frame.extend(remaining);
    frame.extend(body);
    frame
}

fn respond_to_connect(stream: &mut TcpStream) {
    let _connect = read_frame(stream);
    stream.write_all(&[0x20, 0x02, 0x00, 0x00]).unwrap(); // CONNACK, session_present=false, accepted
    stream.flush().unwrap();
}

#[test]
fn s5_qos2_full_handshake() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let mut stream = accept_one(listener);
        respond_to_connect(&mut stream);

        let publish = read_frame(&mut stream);
        assert_eq!(publish[0] >> 4, 3); // PUBLISH
        stream.write_all(&[0x50, 0x02, 0x00, 0x01]).unwrap(); // PUBREC(1)
        stream.flush().unwrap();

        let pubrel = read_frame(&mut stream);
        assert_eq!(pubrel, vec![0x62, 0x02, 0x00, 0x01]);
        stream.write_all(&[0x70, 0x02, 0x00, 0x01]).unwrap(); // PUBCOMP(1)
        stream.flush().unwrap();
    });

    let connection = Connection::open(addr, Duration::from_secs(60)).unwrap();
    connection.connect(&ConnectOptions::new("s5-client")).unwrap();

    let packet_id = connection.publish_qos2(false, false, "x", b"y".to_vec()).unwrap();
    assert_eq!(packet_id, 1);

    server.join().unwrap();
}

#[test]
fn s6_keep_alive_ping() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let mut stream = accept_one(listener);
        respond_to_connect(&mut stream);

        let ping = read_frame(&mut stream);
        assert_eq!(ping, vec![0xC0, 0x00]);
        stream.write_all(&[0xD0, 0x00]).unwrap();
        stream.flush().unwrap();
    });

    let connection = Connection::open(addr, Duration::from_secs(2)).unwrap();
    connection.connect(&ConnectOptions::new("s6-client")).unwrap();

    thread::sleep(Duration::from_secs(3));
    assert!(connection.is_connected());

    server.join().unwrap();
}

#[test]
fn transact_before_connect_fails_with_not_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    // Never accept; the point is that no operation below should touch the wire.
    let connection = Connection::open(addr, Duration::from_secs(60)).unwrap();

    assert!(matches!(
        connection.publish_qos0(false, "x", b"y".to_vec()),
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        connection.publish_qos1(false, false, "x", b"y".to_vec()),
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        connection.publish_qos2(false, false, "x", b"y".to_vec()),
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        connection.subscribe(&[("x", mqtt_client::QoS::AtMostOnce)]),
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        connection.unsubscribe(&["x"]),
        Err(Error::NotConnected)
    ));
    assert!(matches!(connection.ping(), Err(Error::NotConnected)));

    drop(listener);
}

#[test]
fn s7_broken_connection_fails_pending_and_future_calls() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let mut stream = accept_one(listener);
        respond_to_connect(&mut stream);
        let _subscribe = read_frame(&mut stream);
        // Close without ever sending SUBACK.
    });

    let connection = Connection::open(addr, Duration::from_secs(60)).unwrap();
    connection.connect(&ConnectOptions::new("s7-client")).unwrap();

    let result = connection.subscribe(&[("topic/a", mqtt_client::QoS::AtMostOnce)]);
    assert!(result.is_err());

    // Give the receiver thread a moment to observe EOF and flip the flag.
    thread::sleep(Duration::from_millis(200));
    assert!(!connection.is_connected());
    assert!(connection.ping().is_err());

    server.join().unwrap();
}
