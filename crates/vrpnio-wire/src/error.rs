/// Errors that can occur while decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The buffer is too short to hold what its header declares.
    #[error("truncated buffer ({got} bytes, need {needed})")]
    Truncated { needed: usize, got: usize },

    /// A name payload declares more bytes than the payload contains.
    #[error("name length {declared} exceeds payload ({available} bytes)")]
    NameLength { declared: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
