//! VRPN wire format: pure encoding and decoding, no I/O.
//!
//! Every VRPN message is framed with a 24-byte header of five big-endian
//! 32-bit fields:
//! - Total length including the header
//! - Two reserved words (zero on send, ignored on receive)
//! - Sender ID
//! - Type ID
//!
//! The payload follows, padded with zero bytes to an 8-byte boundary. The
//! padding is wire-only; decoded payloads carry exactly the raw length.
//! Negative type IDs are reserved for the built-in control messages that
//! bootstrap naming and the UDP rendezvous.

pub mod cookie;
pub mod error;
pub mod header;
pub mod message;

pub use cookie::{magic_cookie, COOKIE_LENGTH, MAGIC_VERSION};
pub use error::{Result, WireError};
pub use header::{aligned_len, MessageHeader, ALIGNMENT, HEADER_LENGTH};
pub use message::{
    decode_datagram, encode_message, encode_name_payload, parse_name_payload, Message, MessageKind,
    UDP_BUFFER_LENGTH,
};
