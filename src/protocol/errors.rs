use thiserror::Error;

use crate::session::SessionSummary;

/// Failures reported by a [`ByteSource`](crate::protocol::source::ByteSource).
///
/// Every variant ends the frame stream; nothing in the decoder retries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying reader reported end of file.
    #[error("byte source reached end of stream")]
    EndOfStream,

    /// The source was shut down on request (Ctrl-C, owner dropped the session).
    #[error("byte source closed")]
    Closed,

    /// Wrapper around IO errors from the reader or serial port.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True for the two ways a session ends without anything going wrong.
    pub fn is_orderly(&self) -> bool {
        matches!(self, TransportError::EndOfStream | TransportError::Closed)
    }
}

/// Returned by the power-band codec when the value block has the wrong width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BandsError {
    #[error("power band block must be 24 bytes, got {0}")]
    Length(usize),
}

/// Errors surfaced by an [`EventSink`](crate::emitter::EventSink).
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("sample file error: {0}")]
    SampleFile(#[from] SampleFileError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while writing or reading persisted band samples.
#[derive(Debug, Error)]
pub enum SampleFileError {
    /// Wrapper around IO errors (file creation, writes, reads).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Another process already holds the session file.
    #[error("sample file {0} is locked by another process")]
    Locked(String),

    /// The file ends in the middle of a record.
    #[error("trailing partial record: {0} bytes")]
    Truncated(usize),
}

/// Terminal outcome of [`Session::run`](crate::session::Session::run).
///
/// Both variants carry the summary of the session up to the failure.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport: {source}")]
    Transport {
        #[source]
        source: TransportError,
        summary: SessionSummary,
    },

    #[error("emitter: {source}")]
    Emit {
        #[source]
        source: EmitError,
        summary: SessionSummary,
    },
}

impl SessionError {
    pub fn summary(&self) -> &SessionSummary {
        match self {
            SessionError::Transport { summary, .. } | SessionError::Emit { summary, .. } => summary,
        }
    }
}
