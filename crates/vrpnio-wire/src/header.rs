use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Size of the fixed message header in bytes.
pub const HEADER_LENGTH: usize = 24;

/// Payload bytes on the wire are padded up to a multiple of this.
pub const ALIGNMENT: u32 = 8;

/// Round a raw payload length up to the next alignment boundary.
///
/// A length already on the boundary is unchanged.
pub fn aligned_len(raw: u32) -> u32 {
    if raw % ALIGNMENT == 0 {
        raw
    } else {
        raw + (ALIGNMENT - raw % ALIGNMENT)
    }
}

/// The fixed header carried by every VRPN message.
///
/// `raw_len` is the logical payload length; `aligned_len` is what actually
/// travels on the wire after padding. Always `aligned_len >= raw_len`,
/// `aligned_len % 8 == 0` and `aligned_len - raw_len < 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Payload length before alignment padding.
    pub raw_len: u32,
    /// Payload length rounded up to the 8-byte boundary.
    pub aligned_len: u32,
    /// Server-assigned sender ID. Description messages reuse this field
    /// for the ID being described.
    pub sender: i32,
    /// Server-assigned type ID; negative values are control messages.
    pub type_id: i32,
}

impl MessageHeader {
    /// Build a header for a payload of `payload_len` bytes.
    pub fn new(payload_len: u32, sender: i32, type_id: i32) -> Self {
        Self {
            raw_len: payload_len,
            aligned_len: aligned_len(payload_len),
            sender,
            type_id,
        }
    }

    /// Parse a header from the first 24 bytes of `buf`.
    ///
    /// The two reserved words at offsets 4 and 8 are ignored. Errors only
    /// when `buf` is shorter than the header.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LENGTH {
            return Err(WireError::Truncated {
                needed: HEADER_LENGTH,
                got: buf.len(),
            });
        }

        let total = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let raw_len = total.saturating_sub(HEADER_LENGTH as u32);
        let sender = i32::from_be_bytes(buf[12..16].try_into().unwrap());
        let type_id = i32::from_be_bytes(buf[16..20].try_into().unwrap());

        Ok(Self {
            raw_len,
            aligned_len: aligned_len(raw_len),
            sender,
            type_id,
        })
    }

    /// Pack this header into its 24-byte wire form.
    pub fn pack(&self) -> [u8; HEADER_LENGTH] {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH);
        buf.put_u32(HEADER_LENGTH as u32 + self.raw_len);
        buf.put_u32(0);
        buf.put_u32(0);
        buf.put_i32(self.sender);
        buf.put_i32(self.type_id);

        let mut out = [0u8; HEADER_LENGTH];
        out[..buf.len()].copy_from_slice(&buf);
        out
    }

    /// Total bytes this message occupies on the wire (header + padding).
    pub fn wire_size(&self) -> usize {
        HEADER_LENGTH + self.aligned_len as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_len_rounds_up_to_eight() {
        for raw in 0u32..64 {
            let aligned = aligned_len(raw);
            if raw % 8 == 0 {
                assert_eq!(aligned, raw);
            } else {
                assert_eq!(aligned, raw + (8 - raw % 8));
            }
            assert!(aligned >= raw);
            assert_eq!(aligned % 8, 0);
            assert!(aligned - raw < 8);
        }
    }

    #[test]
    fn pack_parse_roundtrip() {
        let header = MessageHeader::new(13, 7, 42);
        assert_eq!(header.raw_len, 13);
        assert_eq!(header.aligned_len, 16);

        let parsed = MessageHeader::parse(&header.pack()).unwrap();
        assert_eq!(parsed.sender, 7);
        assert_eq!(parsed.type_id, 42);
        assert_eq!(parsed.raw_len, 13);
        assert_eq!(parsed.aligned_len, 16);
    }

    #[test]
    fn parse_negative_type_id() {
        let header = MessageHeader::new(8, 9000, -3);
        let parsed = MessageHeader::parse(&header.pack()).unwrap();
        assert_eq!(parsed.type_id, -3);
        assert_eq!(parsed.sender, 9000);
    }

    #[test]
    fn parse_truncated_buffer() {
        let result = MessageHeader::parse(&[0u8; 23]);
        assert!(matches!(
            result,
            Err(WireError::Truncated { needed: 24, got: 23 })
        ));
    }

    #[test]
    fn wire_size_includes_padding() {
        let header = MessageHeader::new(5, 0, 0);
        assert_eq!(header.wire_size(), 24 + 8);
        let empty = MessageHeader::new(0, 0, 0);
        assert_eq!(empty.wire_size(), 24);
    }
}
