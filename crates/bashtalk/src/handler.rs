//! Per-connection handler: username handshake, chat loop, and teardown.
//!
//! Each admitted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the session's outbound queue. The flow:
//!   1. Prompt for a username until one is approved (AwaitingUsername)
//!   2. Register, replay history, announce the join (Active)
//!   3. Loop: read a line → dispatch as chat or command
//!   4. Remove from the registry, announce the departure, flush, close
//!
//! Command handling takes an [`ActiveSession`], which only a successful
//! handshake produces; a session that hasn't been approved has no way
//! to reach the dispatcher.

use std::sync::Arc;

use bashtalk_protocol::{format, reserved};
use bashtalk_session::{OutboundSender, SessionError, SessionHandle, SessionId, SessionState};
use bashtalk_transport::{Connection, TcpLineConnection};
use chrono::{DateTime, Local};
use tokio::sync::{mpsc, Notify};

use crate::dispatch::{dispatch, Flow};
use crate::server::ServerState;
use crate::BashTalkError;

/// Tracks the session state machine and logs each transition.
struct Lifecycle {
    id: SessionId,
    state: SessionState,
}

impl Lifecycle {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
        }
    }

    fn advance(&mut self, to: SessionState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal session transition {} -> {}",
            self.state,
            to
        );
        tracing::debug!(session_id = %self.id, from = %self.state, %to, "session state");
        self.state = to;
    }
}

/// What the reader saw when it asked for the next line.
pub(crate) enum Inbound {
    Line(String),
    /// The peer closed its side.
    Closed,
    /// Another session removed this one (ban).
    Kicked,
}

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Exit,
    Dropped,
    Banned,
    Failed,
}

/// A connection that has been accepted but not yet approved.
struct PendingSession {
    id: SessionId,
    conn: Arc<TcpLineConnection>,
    outbound: OutboundSender,
    kick: Arc<Notify>,
    connected_at: DateTime<Local>,
}

/// A registered session. Only [`await_username`] creates one.
pub(crate) struct ActiveSession {
    pub(crate) id: SessionId,
    pub(crate) username: String,
    pub(crate) state: Arc<ServerState>,
    conn: Arc<TcpLineConnection>,
    outbound: OutboundSender,
    kick: Arc<Notify>,
}

impl ActiveSession {
    /// Queues a line to this session only.
    pub(crate) fn send(&self, line: impl Into<String>) {
        if self.outbound.send(line.into()).is_err() {
            tracing::debug!(session_id = %self.id, "outbound queue closed");
        }
    }

    /// Queues a `<# server #>` notice to this session only.
    pub(crate) fn notice(&self, text: &str) {
        self.send(format::server_notice(&format::timestamp(), text));
    }

    /// Waits for the next inbound line, or for a kick.
    pub(crate) async fn read_line(&self) -> Result<Inbound, BashTalkError> {
        tokio::select! {
            biased;
            _ = self.kick.notified() => Ok(Inbound::Kicked),
            read = self.conn.recv() => Ok(match read? {
                Some(line) => Inbound::Line(line),
                None => Inbound::Closed,
            }),
        }
    }
}

/// Removes the session from the registry if the handler unwinds without
/// reaching its normal teardown.
///
/// `Drop` is synchronous, so the async lock is taken in a spawned task.
struct RegistrationGuard {
    id: SessionId,
    state: Arc<ServerState>,
    armed: bool,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut registry = state.registry.lock().await;
            if let Some(handle) = registry.remove(id) {
                let notice = format::server_notice(
                    &format::timestamp(),
                    &format::left(&handle.username),
                );
                registry.broadcast(&notice);
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: TcpLineConnection,
    state: Arc<ServerState>,
) -> Result<(), BashTalkError> {
    let conn = Arc::new(conn);
    let id = SessionId::next();
    let mut lifecycle = Lifecycle::new(id);
    tracing::debug!(session_id = %id, conn_id = %conn.id(), addr = %conn.peer_addr(), "handling new connection");

    let (outbound, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), rx));

    let pending = PendingSession {
        id,
        conn,
        outbound,
        kick: Arc::new(Notify::new()),
        connected_at: Local::now(),
    };

    lifecycle.advance(SessionState::AwaitingUsername);
    let result = match await_username(pending, &state).await {
        Ok(Some(session)) => {
            lifecycle.advance(SessionState::Active);
            let mut guard = RegistrationGuard {
                id,
                state: Arc::clone(&state),
                armed: true,
            };
            let (departure, result) = match run_active(&session).await {
                Ok(departure) => (departure, Ok(())),
                Err(e) => (Departure::Failed, Err(e)),
            };
            close(session, departure).await;
            guard.armed = false;
            result
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    lifecycle.advance(SessionState::Closed);

    // Every sender is gone now; the writer drains what's queued, then
    // shuts the socket down.
    if let Err(e) = writer.await {
        tracing::debug!(session_id = %id, error = %e, "writer task failed");
    }
    result
}

/// Writes queued lines to the socket until every sender is dropped, then
/// closes the sending side.
async fn write_loop(
    conn: Arc<TcpLineConnection>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = conn.send(&line).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            return;
        }
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

/// Prompts until a username is approved.
///
/// Returns `Ok(None)` if the peer hangs up first. On approval the session
/// is registered, the cached history and end-of-history line are queued,
/// the join is broadcast, and the online list is sent, all under the
/// cache and registry locks, so no broadcast can slip in between.
async fn await_username(
    pending: PendingSession,
    state: &Arc<ServerState>,
) -> Result<Option<ActiveSession>, BashTalkError> {
    let PendingSession {
        id,
        conn,
        outbound,
        kick,
        connected_at,
    } = pending;
    let queue = |line: &str| {
        if outbound.send(line.to_string()).is_err() {
            tracing::debug!(session_id = %id, "outbound queue closed");
        }
    };

    loop {
        queue(reserved::USERNAME_PROMPT);
        let Some(candidate) = conn.recv().await? else {
            tracing::debug!(session_id = %id, "closed before choosing a username");
            return Ok(None);
        };
        let candidate = candidate.trim();

        let handle = SessionHandle::new(
            id,
            candidate,
            connected_at,
            outbound.clone(),
            Arc::clone(&kick),
        );

        let cache = state.cache.lock().await;
        let mut registry = state.registry.lock().await;
        match registry.register(handle) {
            Ok(()) => {
                queue(reserved::USERNAME_APPROVED);
                for line in cache.iter() {
                    queue(line);
                }
                queue(reserved::END_OF_HISTORY);

                let ts = format::timestamp();
                registry.broadcast(&format::server_notice(&ts, &format::joined(candidate)));
                queue(&format::online_users(&registry.usernames()));
                drop(registry);
                drop(cache);

                tracing::info!(
                    session_id = %id,
                    username = candidate,
                    "{candidate} has joined the server as client {id}"
                );
                return Ok(Some(ActiveSession {
                    id,
                    username: candidate.to_string(),
                    state: Arc::clone(state),
                    conn,
                    outbound,
                    kick,
                }));
            }
            Err(SessionError::Full(max)) => {
                tracing::warn!(session_id = %id, max, "registry full during handshake");
                queue(reserved::MAX_CLIENTS_REACHED);
                return Ok(None);
            }
            Err(e) => {
                tracing::debug!(session_id = %id, error = %e, "username rejected");
                queue(reserved::USERNAME_REJECTED);
            }
        }
    }
}

/// Reads and dispatches lines until the session ends.
async fn run_active(session: &ActiveSession) -> Result<Departure, BashTalkError> {
    loop {
        let line = match session.read_line().await? {
            Inbound::Line(line) => line,
            Inbound::Closed => return Ok(Departure::Dropped),
            Inbound::Kicked => return Ok(Departure::Banned),
        };

        match dispatch(session, &line).await? {
            Flow::Continue => {}
            Flow::Exit => return Ok(Departure::Exit),
            Flow::Closed => return Ok(Departure::Dropped),
            Flow::Kicked => return Ok(Departure::Banned),
        }
    }
}

/// Deregisters the session and announces the departure.
///
/// A banned session was already removed by the moderator's handler, so
/// nothing is announced for it here.
async fn close(session: ActiveSession, departure: Departure) {
    let mut registry = session.state.registry.lock().await;
    match registry.remove(session.id) {
        Some(handle) => {
            let notice = format::server_notice(
                &format::timestamp(),
                &format::left(&handle.username),
            );
            registry.broadcast(&notice);
            tracing::info!(
                session_id = %session.id,
                username = %session.username,
                ?departure,
                "{} has left the server",
                session.username
            );
        }
        None => {
            tracing::info!(
                session_id = %session.id,
                username = %session.username,
                ?departure,
                "session closed after removal"
            );
        }
    }
}
