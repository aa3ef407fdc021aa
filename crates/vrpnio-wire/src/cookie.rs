/// Magic version string exchanged during the TCP handshake.
pub const MAGIC_VERSION: &str = "vrpn: ver. 07.34  0";

/// Both sides send exactly this many bytes of cookie.
pub const COOKIE_LENGTH: usize = 24;

/// The 24-byte cookie this client sends: the magic version string,
/// space-padded (or truncated) to the fixed length.
pub fn magic_cookie() -> [u8; COOKIE_LENGTH] {
    let mut cookie = [b' '; COOKIE_LENGTH];
    let bytes = MAGIC_VERSION.as_bytes();
    let n = bytes.len().min(COOKIE_LENGTH);
    cookie[..n].copy_from_slice(&bytes[..n]);
    cookie
}
