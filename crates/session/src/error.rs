//! Session and backend error types.

use crate::slot::SlotId;

/// Errors returned to callers of session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("slot not found: {0}")]
    SlotNotFound(SlotId),

    #[error("slot {0} is locked while it has a file")]
    SlotLocked(SlotId),

    #[error("file limit reached ({0})")]
    LimitReached(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session abandoned after a fatal backend failure")]
    Abandoned,

    #[error("upload controller has stopped")]
    ControllerStopped,
}

/// Errors reported by a [`Backend`](crate::Backend) implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (connection, DNS, timeout...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an unexpected status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend is unusable; the session must be abandoned.
    #[error("fatal backend failure (HTTP {status})")]
    Fatal { status: u16 },

    #[error("protocol error: {0}")]
    Protocol(#[from] multiupload_protocol::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Returns `true` if the failure must abandon the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
