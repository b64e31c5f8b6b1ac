use std::fmt;

use actpsim_types::TxState;

/// Result type for actpsim-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the engine layer
#[derive(Debug)]
pub enum Error {
    /// Referenced agent does not exist
    UnknownAgent(String),

    /// Referenced connection does not exist
    UnknownConnection(String),

    /// Requested transition is not an edge of the lifecycle table
    InvalidTransition { from: TxState, to: TxState },

    /// Event log failed structural validation
    InvalidLog(String),

    /// JSON (de)serialization failed
    Serde(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownAgent(id) => write!(f, "Unknown agent: {}", id),
            Error::UnknownConnection(id) => write!(f, "Unknown transaction: {}", id),
            Error::InvalidTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            Error::InvalidLog(msg) => write!(f, "Invalid event log: {}", msg),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}
