//! Session types: the data structures that represent one connected user.
//!
//! A "session" is the server's record of a connection. It tracks:
//! - WHO the user is (`SessionId`, and a username once approved)
//! - WHERE to send their output (an outbound queue drained by a writer task)
//! - WHETHER they may broadcast (the mute flag)
//! - WHEN they connected

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, Notify};

use crate::SessionError;

/// Counter for generating unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A unique, monotonically assigned identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Allocates the next id. Ids are never reused within a process.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// Transitions are strictly ordered, except that any state may close:
///
/// ```text
/// Connecting → AwaitingUsername → Active → Closed
///      └──────────────┴───────────────────────↗
/// ```
///
/// - **Connecting**: the socket was accepted; streams are being set up.
/// - **AwaitingUsername**: prompted for a name; retries are unbounded.
/// - **Active**: registered; lines are dispatched as chat or commands.
/// - **Closed**: removed from the registry, transport shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingUsername,
    Active,
    Closed,
}

impl SessionState {
    /// Returns the next state on the happy path, or `None` once closed.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::AwaitingUsername),
            Self::AwaitingUsername => Some(Self::Active),
            Self::Active => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        match target {
            Self::Closed => self != Self::Closed,
            _ => self.next() == Some(target),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingUsername => write!(f, "AwaitingUsername"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Channel sender feeding a session's writer task.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// The registry's record of an active session.
///
/// Sending never touches the socket: lines go into an unbounded queue that
/// the session's writer task drains. That keeps broadcasts non-blocking
/// while the registry lock is held, and a slow reader only delays itself.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Which session this is.
    pub id: SessionId,

    /// The approved, unique username.
    pub username: String,

    /// When `true`, plain chat from this user is not broadcast.
    pub muted: bool,

    /// When the connection was accepted.
    pub connected_at: DateTime<Local>,

    outbound: OutboundSender,

    /// Wakes the session's reader when it is removed by someone else.
    kick: Arc<Notify>,
}

impl SessionHandle {
    /// Creates an unmuted handle.
    pub fn new(
        id: SessionId,
        username: impl Into<String>,
        connected_at: DateTime<Local>,
        outbound: OutboundSender,
        kick: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            muted: false,
            connected_at,
            outbound,
            kick,
        }
    }

    /// Queues one line for delivery to this session.
    ///
    /// # Errors
    /// Returns [`SessionError::Disconnected`] if the writer task is gone.
    pub fn send(&self, line: impl Into<String>) -> Result<(), SessionError> {
        self.outbound
            .send(line.into())
            .map_err(|_| SessionError::Disconnected(self.id))
    }

    /// Tells the session's reader to stop; used after a ban.
    ///
    /// A permit is stored if the reader isn't waiting yet, so the signal
    /// can't be missed.
    pub fn kick(&self) {
        self.kick.notify_one();
    }
}
