/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// `connect` was called on a live connection.
    #[error("already connected")]
    AlreadyConnected,

    /// `disconnect` or `send` was called without a live connection.
    #[error("not connected")]
    NotConnected,

    /// The server hostname has no IPv4 address.
    #[error("no IPv4 address found for host '{host}'")]
    Resolve { host: String },

    /// A message on the control stream declares a length beyond the
    /// configured maximum. The stream can no longer be re-synchronized.
    #[error("message declares {declared} bytes (max {max}); stream corrupt")]
    Oversized { declared: u32, max: u32 },

    /// Wire-level decode error.
    #[error("wire error: {0}")]
    Wire(#[from] vrpnio_wire::WireError),

    /// An I/O error occurred on one of the sockets.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
