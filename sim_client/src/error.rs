//! Client errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach simulator at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("simulator connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed simulator message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("simulator closed the connection")]
    Disconnected,

    #[error("simulator rejected `{command}`: {message}")]
    Remote { command: String, message: String },

    #[error("unexpected result for `{command}`: {detail}")]
    UnexpectedResult { command: String, detail: String },

    #[error("deadline passed before `{command}` could complete")]
    DeadlineExceeded { command: String },
}

impl ClientError {
    /// True when the failure is the caller's deadline, not the link.
    pub fn is_deadline(&self) -> bool {
        matches!(self, ClientError::DeadlineExceeded { .. })
    }
}
