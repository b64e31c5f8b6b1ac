use std::fmt;

/// Result type for actpsim-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the runtime layer
#[derive(Debug)]
pub enum Error {
    /// Engine layer error (invalid transition, unknown reference, ...)
    Engine(actpsim_engine::Error),

    /// Worker protocol failure (handshake, fatal message, channel loss)
    Worker(String),

    /// Job queue rejection (full queue, duplicate supplied id)
    Queue(String),

    /// Invalid command against the current state
    InvalidOperation(String),

    /// Persisted document failed schema validation
    Storage(String),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON (de)serialization failed
    Serde(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Engine(err) => write!(f, "Engine error: {}", err),
            Error::Worker(msg) => write!(f, "Worker error: {}", msg),
            Error::Queue(msg) => write!(f, "Job queue error: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Engine(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl From<actpsim_engine::Error> for Error {
    fn from(err: actpsim_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}
