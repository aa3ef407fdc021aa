use std::io::{Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};
use vrpnio_registry::{dispatch, Registry};
use vrpnio_wire::{
    decode_datagram, encode_message, magic_cookie, parse_name_payload, Message, MessageHeader,
    MessageKind, COOKIE_LENGTH, HEADER_LENGTH, UDP_BUFFER_LENGTH,
};

use crate::error::{ClientError, Result};
use crate::sys;

/// Callback invoked with every decoded message, regardless of type.
/// Diagnostics and testing surface; not required for normal operation.
pub type MessageObserver = Box<dyn FnMut(&Message) + Send>;

/// Tunables for the connect loop and the message pump.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to sleep between accept polls while waiting for the server
    /// to dial back.
    pub accept_poll_interval: Duration,
    /// Largest aligned payload accepted on the control stream. A larger
    /// declared length is treated as stream corruption.
    pub max_message_len: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            accept_poll_interval: Duration::from_millis(10),
            max_message_len: 64 * 1024,
        }
    }
}

/// A connection to a VRPN server.
///
/// Owns at most one TCP control socket and one UDP data socket; the two are
/// either both present or both absent. All reading happens through
/// [`read_messages`](Self::read_messages), intended to be pumped from a
/// single reader thread.
pub struct Connection {
    host: String,
    port: u16,
    local_bind: Ipv4Addr,
    registry: Arc<Registry>,
    config: ConnectionConfig,
    tcp_control: Option<TcpStream>,
    udp_data: Option<UdpSocket>,
    observer: Option<MessageObserver>,
}

impl Connection {
    /// Create a disconnected connection toward `host:port`, binding local
    /// sockets on `local_bind`.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        local_bind: Ipv4Addr,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            local_bind,
            registry,
            config: ConnectionConfig::default(),
            tcp_control: None,
            udp_data: None,
            observer: None,
        }
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// The registry this connection feeds.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Install the generic message observer.
    pub fn set_message_observer(&mut self, observer: MessageObserver) {
        self.observer = Some(observer);
    }

    /// Whether both sockets exist and the control socket is still live.
    ///
    /// Liveness is a non-blocking one-byte peek: a readable socket with zero
    /// bytes means the peer closed.
    pub fn connected(&self) -> bool {
        match (&self.tcp_control, &self.udp_data) {
            (Some(tcp), Some(_)) => tcp_alive(tcp),
            _ => false,
        }
    }

    /// Initiate the control and data connections.
    ///
    /// Up to `max_attempts` times (forever when `max_attempts <= 0`), sends
    /// a rendezvous datagram to the server's well-known UDP port and waits
    /// up to `timeout` for the server to dial back to a local TCP listener.
    /// The first accepted stream becomes the control socket, after which the
    /// magic-cookie exchange runs and the local UDP data endpoint is
    /// announced over TCP.
    ///
    /// Exhausting all attempts is not an error; the connection simply stays
    /// disconnected and the caller inspects [`connected`](Self::connected).
    pub fn connect(&mut self, max_attempts: i32, timeout: Duration) -> Result<()> {
        if self.connected() {
            return Err(ClientError::AlreadyConnected);
        }

        let remote = self.resolve()?;
        let listener = TcpListener::bind((self.local_bind, 0))?;
        listener.set_nonblocking(true)?;
        let listener_port = listener.local_addr()?.port();
        let udp_data = UdpSocket::bind((self.local_bind, 0))?;

        let mut stream = None;
        let infinite = max_attempts <= 0;
        let mut attempt = 0;
        while stream.is_none() && (infinite || attempt < max_attempts) {
            attempt += 1;
            stream = self.try_rendezvous(&listener, listener_port, remote, timeout)?;
        }

        let Some(stream) = stream else {
            debug!(attempt, "no connection after final attempt");
            return Ok(());
        };

        if let Err(err) = self.handshake(&stream, &udp_data, timeout) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(err);
        }

        info!(host = %self.host, port = self.port, "connected");
        self.tcp_control = Some(stream);
        self.udp_data = Some(udp_data);
        Ok(())
    }

    /// Orderly shutdown of both sockets.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.connected() {
            return Err(ClientError::NotConnected);
        }
        if let Some(tcp) = self.tcp_control.take() {
            let _ = tcp.shutdown(Shutdown::Both);
        }
        self.udp_data = None;
        info!(host = %self.host, "disconnected");
        Ok(())
    }

    /// Best-effort shutdown of whichever sockets exist. Never fails and
    /// always leaves the connection cleared; used before reconnecting
    /// regardless of the current believed state.
    pub fn force_disconnect(&mut self) {
        if let Some(tcp) = self.tcp_control.take() {
            let _ = tcp.shutdown(Shutdown::Both);
        }
        self.udp_data = None;
    }

    /// [`force_disconnect`](Self::force_disconnect) followed by
    /// [`connect`](Self::connect).
    pub fn reconnect(&mut self, max_attempts: i32, timeout: Duration) -> Result<()> {
        self.force_disconnect();
        self.connect(max_attempts, timeout)
    }

    /// Drain all currently available messages from both sockets.
    ///
    /// Never blocks: each socket is read only while it has more than a
    /// header's worth of bytes available. Description messages update the
    /// registry directly; everything else goes through dispatch. Returns the
    /// number of messages handled, `Ok(0)` when not connected.
    ///
    /// A transport error mid-pump clears both sockets (so `connected()`
    /// turns false) and surfaces as the `Err`; the reader loop treats that
    /// as a cue to reconnect.
    pub fn read_messages(&mut self) -> Result<usize> {
        if !self.connected() {
            return Ok(0);
        }
        match self.pump_sockets() {
            Ok(handled) => Ok(handled),
            Err(err) => {
                self.force_disconnect();
                Err(err)
            }
        }
    }

    /// Send a message over the TCP control socket.
    pub fn send(&mut self, msg: &Message) -> Result<()> {
        let Some(tcp) = self.tcp_control.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        let mut buf = BytesMut::new();
        encode_message(msg, &mut buf);
        tcp.write_all(&buf)?;
        Ok(())
    }

    fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port).to_socket_addrs()?;
        addrs
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ClientError::Resolve {
                host: self.host.clone(),
            })
    }

    /// One rendezvous attempt: announce the listener over UDP, then poll
    /// the listener for the server's dial-back until `timeout` elapses.
    fn try_rendezvous(
        &self,
        listener: &TcpListener,
        listener_port: u16,
        remote: SocketAddr,
        timeout: Duration,
    ) -> Result<Option<TcpStream>> {
        let datagram = format!("{} {}\0", self.local_bind, listener_port);
        let setup = UdpSocket::bind((self.local_bind, 0))?;
        if let Err(err) = setup.send_to(datagram.as_bytes(), remote) {
            // Unreachable server: burn the attempt, let the caller retry.
            warn!(%remote, %err, "rendezvous send failed");
            return Ok(None);
        }
        debug!(%remote, port = listener_port, "sent rendezvous datagram");

        let deadline = Instant::now() + timeout;
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "server dialed back");
                    return Ok(Some(stream));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(self.config.accept_poll_interval);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Cookie exchange plus the udp-description announcement, all under
    /// `timeout` as the socket deadline. Runs before the stream is stored,
    /// so a failure leaves the connection cleanly disconnected.
    fn handshake(&self, stream: &TcpStream, udp_data: &UdpSocket, timeout: Duration) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut server_cookie = [0u8; COOKIE_LENGTH];
        (&mut &*stream).read_exact(&mut server_cookie)?;
        debug!(
            cookie = %String::from_utf8_lossy(&server_cookie).trim_end(),
            "received server cookie"
        );
        (&mut &*stream).write_all(&magic_cookie())?;

        let udp_port = udp_data.local_addr()?.port();
        let description = Message::udp_description(&self.local_bind.to_string(), udp_port);
        let mut buf = BytesMut::new();
        encode_message(&description, &mut buf);
        (&mut &*stream).write_all(&buf)?;
        debug!(udp_port, "announced udp data endpoint");

        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;
        Ok(())
    }

    fn pump_sockets(&mut self) -> Result<usize> {
        let mut handled = 0;

        // Control stream: exactly one message per iteration, since the
        // payload must be read in a second call sized by the header.
        loop {
            let msg = {
                let Some(stream) = self.tcp_control.as_mut() else {
                    break;
                };
                if sys::available(stream)? <= HEADER_LENGTH {
                    break;
                }
                read_stream_message(stream, self.config.max_message_len)?
            };
            self.handle_message(msg);
            handled += 1;
        }

        // Data socket: one datagram may carry several back-to-back messages.
        loop {
            let msgs = {
                let Some(socket) = self.udp_data.as_ref() else {
                    break;
                };
                if sys::available(socket)? <= HEADER_LENGTH {
                    break;
                }
                let mut buf = [0u8; UDP_BUFFER_LENGTH];
                let received = socket.recv(&mut buf)?;
                decode_datagram(&buf[..received])
            };
            for msg in msgs {
                self.handle_message(msg);
                handled += 1;
            }
        }

        Ok(handled)
    }

    fn handle_message(&mut self, msg: Message) {
        match msg.kind() {
            MessageKind::SenderDescription => match parse_name_payload(&msg.payload) {
                // The described ID travels in the header's sender field.
                Ok(name) => self.registry.register_sender(msg.header.sender, &name),
                Err(err) => warn!(%err, "malformed sender description dropped"),
            },
            MessageKind::TypeDescription => match parse_name_payload(&msg.payload) {
                Ok(name) => self.registry.register_type(msg.header.sender, &name),
                Err(err) => warn!(%err, "malformed type description dropped"),
            },
            // Anything else, including a udp description echoed by the
            // server, goes through dispatch and drops on a lookup miss.
            _ => {
                dispatch::route(&self.registry, &msg);
            }
        }

        if let Some(observer) = self.observer.as_mut() {
            observer(&msg);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.force_disconnect();
    }
}

/// Non-blocking one-byte peek. `Ok(0)` means the peer closed.
fn tcp_alive(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }
    let mut byte = [0u8; 1];
    let alive = match stream.peek(&mut byte) {
        Ok(0) => false,
        Ok(_) => true,
        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => true,
        Err(_) => false,
    };
    let _ = stream.set_nonblocking(false);
    alive
}

/// Read one message off the control stream: header first, then a second
/// read sized to the declared aligned length, truncated to the raw length.
fn read_stream_message(stream: &mut TcpStream, max_message_len: u32) -> Result<Message> {
    let mut header_buf = [0u8; HEADER_LENGTH];
    stream.read_exact(&mut header_buf)?;
    let header = MessageHeader::parse(&header_buf)?;

    if header.aligned_len > max_message_len {
        return Err(ClientError::Oversized {
            declared: header.aligned_len,
            max: max_message_len,
        });
    }

    let mut payload = vec![0u8; header.aligned_len as usize];
    stream.read_exact(&mut payload)?;
    payload.truncate(header.raw_len as usize);

    Ok(Message {
        header,
        payload: Bytes::from(payload),
    })
}
