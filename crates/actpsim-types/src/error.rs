use std::fmt;

/// Result type for actpsim-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// A string did not name a known transaction state
    InvalidState(String),

    /// A monetary amount was out of range (non-positive or overflowing)
    InvalidAmount(i64),

    /// An id did not match the `prefix-N` shape expected for its field
    InvalidId(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidState(s) => write!(f, "Invalid transaction state: {}", s),
            Error::InvalidAmount(n) => write!(f, "Invalid amount: {}", n),
            Error::InvalidId(id) => write!(f, "Invalid id: {}", id),
        }
    }
}

impl std::error::Error for Error {}
