//! Transport error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection lost to source {source_id}")]
    ConnectionLost { source_id: String },
    #[error("malformed frame at line {line}: {reason}")]
    MalformedFrame { line: usize, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// A single bad frame can be skipped; the other errors end the stream
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::MalformedFrame { .. })
    }
}
