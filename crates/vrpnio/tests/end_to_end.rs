//! End-to-end scenarios against an in-process fake VRPN server.
//!
//! The fake server owns the real protocol exchange: it waits for the UDP
//! rendezvous datagram, dials back over TCP, swaps magic cookies, consumes
//! the client's udp-description, then runs a per-test script over the
//! control and data sockets.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use vrpnio::client::Connection;
use vrpnio::registry::Registry;
use vrpnio::remote::{
    AnalogRemote, ButtonRecord, ButtonRemote, Remote, TrackerRecord, TrackerRemote,
};
use vrpnio::wire::{
    encode_message, magic_cookie, Message, MessageHeader, COOKIE_LENGTH, HEADER_LENGTH,
};

const LOCALHOST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

struct FakeServer {
    control: TcpStream,
    /// Where the client asked us to push UDP data.
    data_target: SocketAddr,
}

impl FakeServer {
    fn send_tcp(&mut self, msg: &Message) {
        let mut buf = BytesMut::new();
        encode_message(msg, &mut buf);
        self.control.write_all(&buf).unwrap();
    }

    fn send_udp(&self, msgs: &[Message]) {
        let mut datagram = BytesMut::new();
        for msg in msgs {
            encode_message(msg, &mut datagram);
        }
        let socket = UdpSocket::bind((LOCALHOST, 0)).unwrap();
        socket.send_to(&datagram, self.data_target).unwrap();
    }

    fn read_tcp(&mut self) -> Message {
        read_message(&mut self.control)
    }
}

fn read_message(stream: &mut TcpStream) -> Message {
    let mut header_buf = [0u8; HEADER_LENGTH];
    stream.read_exact(&mut header_buf).unwrap();
    let header = MessageHeader::parse(&header_buf).unwrap();
    let mut payload = vec![0u8; header.aligned_len as usize];
    stream.read_exact(&mut payload).unwrap();
    payload.truncate(header.raw_len as usize);
    Message {
        header,
        payload: payload.into(),
    }
}

/// Bind the server's well-known UDP port and answer one client connect.
fn spawn_server<F>(script: F) -> (u16, thread::JoinHandle<()>)
where
    F: FnOnce(FakeServer) + Send + 'static,
{
    let rendezvous = UdpSocket::bind((LOCALHOST, 0)).unwrap();
    let port = rendezvous.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let mut buf = [0u8; 128];
        let (n, _) = rendezvous.recv_from(&mut buf).unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        let text = text.trim_end_matches('\0');
        let (addr, dial_port) = text.split_once(' ').unwrap();
        let addr: Ipv4Addr = addr.parse().unwrap();
        let dial_port: u16 = dial_port.parse().unwrap();

        let mut control = TcpStream::connect((addr, dial_port)).unwrap();
        control.write_all(&magic_cookie()).unwrap();
        let mut cookie = [0u8; COOKIE_LENGTH];
        control.read_exact(&mut cookie).unwrap();
        assert_eq!(&cookie[..16], &magic_cookie()[..16]);

        let description = read_message(&mut control);
        assert_eq!(description.header.type_id, -3);
        let data_addr: Ipv4Addr = String::from_utf8(description.payload.to_vec())
            .unwrap()
            .parse()
            .unwrap();
        let data_target = SocketAddr::from((data_addr, description.header.sender as u16));

        script(FakeServer {
            control,
            data_target,
        });
    });

    (port, handle)
}

fn connect(port: u16, registry: Arc<Registry>) -> Connection {
    let mut conn = Connection::new("127.0.0.1", port, LOCALHOST, registry);
    conn.connect(3, Duration::from_secs(2)).unwrap();
    assert!(conn.connected());
    conn
}

fn pump_until(conn: &mut Connection, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition never reached");
        conn.read_messages().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn button_change_reaches_adapter() {
    let (port, server) = spawn_server(|mut server| {
        server.send_tcp(&Message::sender_description(0, "DTrack"));
        server.send_tcp(&Message::type_description(5, "vrpn_Button Change"));

        let mut payload = Vec::new();
        payload.extend_from_slice(&3i32.to_be_bytes());
        payload.extend_from_slice(&1i32.to_be_bytes());
        server.send_tcp(&Message::application(0, 5, payload));

        park(server);
    });

    let registry = Arc::new(Registry::new());
    let mut button = ButtonRemote::new("DTrack", Arc::clone(&registry));
    button.register();

    let mut conn = connect(port, registry);
    pump_until(&mut conn, || !button.events().is_empty());

    let event = button.events().try_recv().unwrap();
    assert_eq!(event.record, ButtonRecord::Change { button: 3, state: 1 });
    assert_eq!(event.header.sender, 0);
    assert_eq!(event.header.type_id, 5);

    conn.force_disconnect();
    server.join().unwrap();
}

#[test]
fn udp_datagram_fans_out_to_adapters_in_order() {
    let (port, server) = spawn_server(|mut server| {
        server.send_tcp(&Message::sender_description(0, "Tracker0"));
        server.send_tcp(&Message::type_description(4, "vrpn_Tracker Pos_Quat"));
        server.send_tcp(&Message::type_description(7, "vrpn_Analog Channel"));

        // One datagram, three messages: two poses and an analog update.
        let pose_a = pose_payload(1, [1.0, 2.0, 3.0]);
        let pose_b = pose_payload(2, [4.0, 5.0, 6.0]);
        let mut analog = Vec::new();
        analog.extend_from_slice(&1.0f64.to_be_bytes());
        analog.extend_from_slice(&0.25f64.to_be_bytes());
        server.send_udp(&[
            Message::application(0, 4, pose_a),
            Message::application(0, 4, pose_b),
            Message::application(0, 7, analog),
        ]);

        park(server);
    });

    let registry = Arc::new(Registry::new());
    let mut tracker = TrackerRemote::new("Tracker0", Arc::clone(&registry));
    let mut analog = AnalogRemote::new("Tracker0", Arc::clone(&registry));
    tracker.register();
    analog.register();

    let mut conn = connect(port, Arc::clone(&registry));
    pump_until(&mut conn, || {
        tracker.events().len() == 2 && !analog.events().is_empty()
    });

    let first = tracker.events().try_recv().unwrap();
    let second = tracker.events().try_recv().unwrap();
    assert!(matches!(
        first.record,
        TrackerRecord::Pose { sensor: 1, position: [1.0, 2.0, 3.0], .. }
    ));
    assert!(matches!(
        second.record,
        TrackerRecord::Pose { sensor: 2, .. }
    ));
    assert_eq!(analog.events().try_recv().unwrap().channels, vec![0.25]);

    conn.force_disconnect();
    server.join().unwrap();
}

#[test]
fn tracker_request_round_trip() {
    let (port, server) = spawn_server(|mut server| {
        server.send_tcp(&Message::sender_description(2, "Tracker0"));
        server.send_tcp(&Message::type_description(
            9,
            "vrpn_Tracker Request_Tracker_Workspace",
        ));

        // The client's workspace request: empty payload, addressed by the
        // announced IDs.
        let request = server.read_tcp();
        assert_eq!(request.header.sender, 2);
        assert_eq!(request.header.type_id, 9);
        assert!(request.payload.is_empty());

        park(server);
    });

    let registry = Arc::new(Registry::new());
    let mut tracker = TrackerRemote::new("Tracker0", Arc::clone(&registry));
    tracker.register();

    let mut conn = connect(port, Arc::clone(&registry));

    // Before the announcements land, the request is silently skipped.
    tracker.request_workspace(&mut conn).unwrap();

    pump_until(&mut conn, || {
        registry.sender_id("Tracker0").is_some()
            && registry
                .type_id("vrpn_Tracker Request_Tracker_Workspace")
                .is_some()
    });
    tracker.request_workspace(&mut conn).unwrap();

    server.join().unwrap();
    conn.force_disconnect();
}

#[test]
fn reannounced_sender_keeps_routing() {
    let (port, server) = spawn_server(|mut server| {
        server.send_tcp(&Message::sender_description(0, "DTrack"));
        server.send_tcp(&Message::type_description(5, "vrpn_Button Change"));
        // The server restarts its device and re-announces under a new ID.
        server.send_tcp(&Message::sender_description(6, "DTrack"));

        let mut payload = Vec::new();
        payload.extend_from_slice(&1i32.to_be_bytes());
        payload.extend_from_slice(&0i32.to_be_bytes());
        server.send_tcp(&Message::application(6, 5, payload));

        park(server);
    });

    let registry = Arc::new(Registry::new());
    let mut button = ButtonRemote::new("DTrack", Arc::clone(&registry));
    button.register();

    let mut conn = connect(port, Arc::clone(&registry));
    pump_until(&mut conn, || !button.events().is_empty());

    assert_eq!(registry.sender_name(0), None);
    assert_eq!(registry.sender_id("DTrack"), Some(6));
    let event = button.events().try_recv().unwrap();
    assert_eq!(event.record, ButtonRecord::Change { button: 1, state: 0 });

    conn.force_disconnect();
    server.join().unwrap();
}

#[test]
fn server_close_turns_connected_false() {
    let (port, server) = spawn_server(|server| {
        // Dropping the control socket ends the session.
        drop(server);
    });

    let registry = Arc::new(Registry::new());
    let mut conn = Connection::new("127.0.0.1", port, LOCALHOST, registry);
    conn.connect(3, Duration::from_secs(2)).unwrap();
    server.join().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while conn.connected() {
        assert!(Instant::now() < deadline, "close never observed");
        let _ = conn.read_messages();
        thread::sleep(Duration::from_millis(1));
    }

    // The reader loop's recovery path: force a clean slate, then a bounded
    // reconnect toward a dead endpoint stays disconnected without erroring.
    conn.force_disconnect();
    conn.reconnect(1, Duration::from_millis(50)).unwrap();
    assert!(!conn.connected());
}

fn pose_payload(sensor: i32, position: [f64; 3]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&sensor.to_be_bytes());
    payload.extend_from_slice(&[0u8; 4]);
    for v in position {
        payload.extend_from_slice(&v.to_be_bytes());
    }
    for q in [0.0f64, 0.0, 0.0, 1.0] {
        payload.extend_from_slice(&q.to_be_bytes());
    }
    payload
}

/// Keep the control socket open until the client side closes it.
fn park(mut server: FakeServer) {
    let mut sink = [0u8; 1];
    let _ = server.control.read(&mut sink);
}
