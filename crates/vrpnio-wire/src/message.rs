use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::header::{MessageHeader, HEADER_LENGTH};

/// Largest UDP datagram the protocol sends in one piece.
pub const UDP_BUFFER_LENGTH: usize = 1472;

const SENDER_DESCRIPTION: i32 = -1;
const TYPE_DESCRIPTION: i32 = -2;
const UDP_DESCRIPTION: i32 = -3;

/// Classification of a message by its type ID.
///
/// Negative IDs are the built-in control messages that bootstrap naming and
/// the UDP rendezvous; everything non-negative is an application type whose
/// meaning is established at runtime by type-description messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The server announces the name behind a sender ID (type −1).
    SenderDescription,
    /// The server announces the name behind a type ID (type −2).
    TypeDescription,
    /// Either side announces its UDP data endpoint (type −3).
    UdpDescription,
    /// Application data; routed through the handler table.
    Application(i32),
}

impl MessageKind {
    /// Classify a wire type ID.
    pub fn from_wire(type_id: i32) -> Self {
        match type_id {
            SENDER_DESCRIPTION => MessageKind::SenderDescription,
            TYPE_DESCRIPTION => MessageKind::TypeDescription,
            UDP_DESCRIPTION => MessageKind::UdpDescription,
            id => MessageKind::Application(id),
        }
    }

    /// The type ID this kind travels as.
    pub fn wire_id(&self) -> i32 {
        match self {
            MessageKind::SenderDescription => SENDER_DESCRIPTION,
            MessageKind::TypeDescription => TYPE_DESCRIPTION,
            MessageKind::UdpDescription => UDP_DESCRIPTION,
            MessageKind::Application(id) => *id,
        }
    }
}

/// A decoded message: header plus the raw payload, padding stripped.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl Message {
    /// Create an application message for a given sender and type.
    pub fn application(sender: i32, type_id: i32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: MessageHeader::new(payload.len() as u32, sender, type_id),
            payload,
        }
    }

    /// UDP-description message announcing where the server may push data.
    ///
    /// The address travels as the payload text and the port in the header's
    /// sender field.
    pub fn udp_description(addr: &str, port: u16) -> Self {
        let payload = Bytes::copy_from_slice(addr.as_bytes());
        Self {
            header: MessageHeader::new(payload.len() as u32, i32::from(port), UDP_DESCRIPTION),
            payload,
        }
    }

    /// Sender-description message naming `id`, as a server would send it.
    pub fn sender_description(id: i32, name: &str) -> Self {
        let payload = encode_name_payload(name);
        Self {
            header: MessageHeader::new(payload.len() as u32, id, SENDER_DESCRIPTION),
            payload,
        }
    }

    /// Type-description message naming `id`, as a server would send it.
    pub fn type_description(id: i32, name: &str) -> Self {
        let payload = encode_name_payload(name);
        Self {
            header: MessageHeader::new(payload.len() as u32, id, TYPE_DESCRIPTION),
            payload,
        }
    }

    /// Classify this message by its type ID.
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_wire(self.header.type_id)
    }
}

/// Encode a message into its wire form: header, payload, zero padding up to
/// the aligned length.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) {
    dst.reserve(msg.header.wire_size());
    dst.put_slice(&msg.header.pack());
    dst.put_slice(&msg.payload);
    dst.put_bytes(0, (msg.header.aligned_len - msg.header.raw_len) as usize);
}

/// Decode every complete message out of one UDP datagram.
///
/// A datagram may carry several back-to-back messages; the cursor advances
/// by `24 + aligned_len` per message. Trailing bytes too short to hold a
/// further complete message are dropped. Order is preserved.
pub fn decode_datagram(buf: &[u8]) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut cursor = 0;

    while buf.len() - cursor >= HEADER_LENGTH {
        // Infallible: at least HEADER_LENGTH bytes remain.
        let header = match MessageHeader::parse(&buf[cursor..]) {
            Ok(h) => h,
            Err(_) => break,
        };

        let body = cursor + HEADER_LENGTH;
        if buf.len() - body < header.aligned_len as usize {
            break;
        }

        messages.push(Message {
            header,
            payload: Bytes::copy_from_slice(&buf[body..body + header.raw_len as usize]),
        });
        cursor = body + header.aligned_len as usize;
    }

    messages
}

/// Encode a name payload: big-endian u32 length followed by the UTF-8 bytes.
pub fn encode_name_payload(name: &str) -> Bytes {
    let bytes = name.as_bytes();
    let mut buf = BytesMut::with_capacity(4 + bytes.len());
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
    buf.freeze()
}

/// Parse a name payload as carried by sender/type description messages.
///
/// Padding NUL bytes commonly survive inside the declared length; the
/// registry strips them on registration.
pub fn parse_name_payload(payload: &[u8]) -> Result<String> {
    if payload.len() < 4 {
        return Err(WireError::Truncated {
            needed: 4,
            got: payload.len(),
        });
    }

    let declared = u32::from_be_bytes(payload[0..4].try_into().unwrap()) as usize;
    if declared > payload.len() - 4 {
        return Err(WireError::NameLength {
            declared,
            available: payload.len() - 4,
        });
    }

    Ok(String::from_utf8_lossy(&payload[4..4 + declared]).into_owned())
}
