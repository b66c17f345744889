//! Error types for the session layer.

use crate::SessionId;

/// Errors that can occur while registering or reaching sessions.
///
/// All of these are recoverable: the handler reports them to the
/// requesting user and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The requested username is empty or cannot be carried by the line
    /// grammar (whitespace or angle brackets).
    #[error("invalid username {0:?}")]
    InvalidUsername(String),

    /// Another active session already holds this username.
    #[error("username {0:?} is already online")]
    UsernameTaken(String),

    /// The registry holds its maximum number of sessions.
    #[error("registry is full ({0} sessions)")]
    Full(usize),

    /// This session id is already registered.
    #[error("session {0} is already registered")]
    AlreadyRegistered(SessionId),

    /// No active session has this username.
    #[error("{0:?} is not online")]
    NotOnline(String),

    /// The session's outbound queue is closed; its writer has gone away.
    #[error("session {0} is disconnected")]
    Disconnected(SessionId),
}

/// Errors from constructing an [`AuthGate`](crate::AuthGate).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A stored digest was not 64 hexadecimal characters.
    #[error("invalid SHA-256 digest: expected 64 hex characters")]
    InvalidDigest,
}
