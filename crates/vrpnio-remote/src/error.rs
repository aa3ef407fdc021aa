/// Errors raised while decoding a device payload.
///
/// Always non-fatal: the adapter logs the error and drops the message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload length does not match the shape's expected byte count.
    #[error("{shape}: payload is {got} bytes, expected {expected}")]
    Length {
        shape: &'static str,
        expected: usize,
        got: usize,
    },

    /// A count field is negative, fractional, or absurdly large.
    #[error("{shape}: invalid element count {count}")]
    Count { shape: &'static str, count: f64 },
}
