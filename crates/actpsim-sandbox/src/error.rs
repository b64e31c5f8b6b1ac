use std::fmt;

/// Result type for actpsim-sandbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the sandbox layer.
///
/// Script failures never surface here; they travel inside
/// `ExecuteResult.error` so one agent's failure stays recoverable. This
/// enum covers host-level faults only.
#[derive(Debug)]
pub enum Error {
    /// Persistent state could not be converted across the VM boundary
    StateConversion(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::StateConversion(msg) => write!(f, "State conversion error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
