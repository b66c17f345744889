//! The registry: tracks every active session.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Admitting a session once it has an approved username
//! - Keeping usernames unique and the session count bounded
//! - Looking sessions up by username
//! - Delivering broadcasts to everyone
//!
//! # Concurrency note
//!
//! `Registry` is NOT thread-safe by itself; it uses plain maps. The server
//! owns one instance behind a `tokio::sync::Mutex`, which makes each
//! check-then-insert sequence (uniqueness, capacity) a single critical
//! section. None of these methods await, so the lock is never held across
//! network I/O.

use std::collections::{BTreeMap, HashMap};

use crate::{SessionError, SessionHandle, SessionId};

/// Default maximum number of concurrently registered sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 50;

/// Checks that a username can be registered and carried by the wire
/// grammar.
///
/// # Errors
/// Returns [`SessionError::InvalidUsername`] if the name is empty or
/// contains whitespace, `<` or `>`.
pub fn validate_username(name: &str) -> Result<(), SessionError> {
    let bad_char = |c: char| c.is_whitespace() || c == '<' || c == '>';
    if name.is_empty() || name.chars().any(bad_char) {
        return Err(SessionError::InvalidUsername(name.to_string()));
    }
    Ok(())
}

/// The shared directory of active sessions.
///
/// ```text
/// accept ──→ username approved ──→ register() ──→ remove()
///                                      │              ↑
///                                      ▼              │
///                                   [Active] ─(exit / ban / EOF)
/// ```
pub struct Registry {
    /// Active sessions keyed by id. A `BTreeMap` keeps them in id order,
    /// which is accept order, so listings are stable.
    sessions: BTreeMap<SessionId, SessionHandle>,

    /// Username index, kept in sync with `sessions`.
    by_name: HashMap<String, SessionId>,

    max_sessions: usize,
}

impl Registry {
    /// Creates an empty registry admitting at most `max_sessions`.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            by_name: HashMap::new(),
            max_sessions,
        }
    }

    /// Adds an approved session.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`]: see [`validate_username`]
    /// - [`SessionError::UsernameTaken`]: exact, case-sensitive match
    /// - [`SessionError::AlreadyRegistered`]: the id is present already
    /// - [`SessionError::Full`]: the registry is at capacity
    pub fn register(&mut self, handle: SessionHandle) -> Result<(), SessionError> {
        validate_username(&handle.username)?;
        if self.by_name.contains_key(&handle.username) {
            return Err(SessionError::UsernameTaken(handle.username));
        }
        if self.sessions.contains_key(&handle.id) {
            return Err(SessionError::AlreadyRegistered(handle.id));
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::Full(self.max_sessions));
        }

        tracing::info!(
            session_id = %handle.id,
            username = %handle.username,
            online = self.sessions.len() + 1,
            "session registered"
        );
        self.by_name.insert(handle.username.clone(), handle.id);
        self.sessions.insert(handle.id, handle);
        Ok(())
    }

    /// Removes a session, freeing its username. Returns the removed
    /// handle, or `None` if it was not registered.
    pub fn remove(&mut self, id: SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.remove(&id)?;
        self.by_name.remove(&handle.username);
        tracing::info!(
            session_id = %id,
            username = %handle.username,
            online = self.sessions.len(),
            "session removed"
        );
        Some(handle)
    }

    /// Removes the session holding `username`.
    pub fn remove_by_username(&mut self, username: &str) -> Option<SessionHandle> {
        let id = *self.by_name.get(username)?;
        self.remove(id)
    }

    /// Looks up a session by exact username.
    pub fn find_by_username(&self, username: &str) -> Option<&SessionHandle> {
        self.by_name
            .get(username)
            .and_then(|id| self.sessions.get(id))
    }

    /// Usernames of every registered session, in accept order.
    pub fn usernames(&self) -> Vec<String> {
        self.sessions
            .values()
            .map(|h| h.username.clone())
            .collect()
    }

    /// Sets the mute flag of the session holding `username`.
    ///
    /// Muting an already-muted user is allowed and changes nothing.
    ///
    /// # Errors
    /// Returns [`SessionError::NotOnline`] if nobody holds the name.
    pub fn set_muted(&mut self, username: &str, muted: bool) -> Result<(), SessionError> {
        let id = self
            .by_name
            .get(username)
            .ok_or_else(|| SessionError::NotOnline(username.to_string()))?;
        let handle = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotOnline(username.to_string()))?;
        handle.muted = muted;
        Ok(())
    }

    /// Returns `true` if the session is registered and muted.
    pub fn is_muted(&self, id: SessionId) -> bool {
        self.sessions.get(&id).is_some_and(|h| h.muted)
    }

    /// Queues a line to one session.
    ///
    /// # Errors
    /// - [`SessionError::NotOnline`] (with the id as text) if not registered
    /// - [`SessionError::Disconnected`] if its queue is closed
    pub fn send_to(&self, id: SessionId, line: &str) -> Result<(), SessionError> {
        self.sessions
            .get(&id)
            .ok_or_else(|| SessionError::NotOnline(id.to_string()))?
            .send(line)
    }

    /// Queues `line` to every registered session. Returns how many
    /// sessions accepted it.
    ///
    /// A failure for one recipient is logged and skipped; it never stops
    /// delivery to the others.
    pub fn broadcast(&self, line: &str) -> usize {
        let mut delivered = 0;
        for handle in self.sessions.values() {
            match handle.send(line) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = %handle.id,
                        username = %handle.username,
                        error = %e,
                        "broadcast delivery failed"
                    );
                }
            }
        }
        delivered
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The capacity bound.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `Registry`.
    //!
    //! Test names follow `test_{function}_{scenario}_{expected}`. Each
    //! helper session keeps its receiver so tests can observe exactly what
    //! was queued to it.

    use std::sync::Arc;

    use chrono::Local;
    use tokio::sync::{mpsc, Notify};

    use super::*;

    type Rx = mpsc::UnboundedReceiver<String>;

    fn session(name: &str) -> (SessionHandle, Rx) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(
            SessionId::next(),
            name,
            Local::now(),
            tx,
            Arc::new(Notify::new()),
        );
        (handle, rx)
    }

    fn drain(rx: &mut Rx) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_new_user_is_findable() {
        let mut reg = Registry::default();
        let (alice, _rx) = session("alice");
        let id = alice.id;

        reg.register(alice).expect("should register");

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find_by_username("alice").map(|h| h.id), Some(id));
        assert_eq!(reg.usernames(), vec!["alice"]);
    }

    #[test]
    fn test_register_duplicate_username_returns_taken() {
        let mut reg = Registry::default();
        let (a1, _rx1) = session("alice");
        let (a2, _rx2) = session("alice");
        reg.register(a1).unwrap();

        let result = reg.register(a2);

        assert_eq!(result, Err(SessionError::UsernameTaken("alice".into())));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_usernames_are_case_sensitive() {
        let mut reg = Registry::default();
        let (a, _rx1) = session("alice");
        let (b, _rx2) = session("Alice");
        reg.register(a).unwrap();
        reg.register(b).expect("different case is a different name");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_register_invalid_usernames_rejected() {
        let mut reg = Registry::default();
        for bad in ["", "two words", "<alice>", "tab\there"] {
            let (h, _rx) = session(bad);
            assert!(
                matches!(reg.register(h), Err(SessionError::InvalidUsername(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(reg.is_empty());
    }

    #[test]
    fn test_register_at_capacity_returns_full() {
        let mut reg = Registry::new(2);
        let (a, _ra) = session("a");
        let (b, _rb) = session("b");
        let (c, _rc) = session("c");
        reg.register(a).unwrap();
        reg.register(b).unwrap();

        assert_eq!(reg.register(c), Err(SessionError::Full(2)));
        assert_eq!(reg.len(), 2);
        assert!(reg.len() <= reg.max_sessions());
    }

    #[test]
    fn test_register_same_id_twice_returns_already_registered() {
        let mut reg = Registry::default();
        let (a, _ra) = session("a");
        let mut renamed = a.clone();
        renamed.username = "a2".into();
        reg.register(a).unwrap();

        assert!(matches!(
            reg.register(renamed),
            Err(SessionError::AlreadyRegistered(_))
        ));
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_frees_username_for_reuse() {
        let mut reg = Registry::default();
        let (bob, _rx) = session("bob");
        let id = bob.id;
        reg.register(bob).unwrap();

        let removed = reg.remove(id).expect("was registered");
        assert_eq!(removed.username, "bob");
        assert!(reg.find_by_username("bob").is_none());

        let (bob2, _rx2) = session("bob");
        reg.register(bob2).expect("name is free again");
    }

    #[test]
    fn test_remove_unknown_returns_none() {
        let mut reg = Registry::default();
        assert!(reg.remove(SessionId(u64::MAX)).is_none());
    }

    #[test]
    fn test_remove_by_username_removes_matching_session() {
        let mut reg = Registry::default();
        let (bob, _rx) = session("bob");
        reg.register(bob).unwrap();

        assert!(reg.remove_by_username("bob").is_some());
        assert!(reg.remove_by_username("bob").is_none());
        assert!(reg.is_empty());
    }

    // =====================================================================
    // usernames() / set_muted()
    // =====================================================================

    #[test]
    fn test_usernames_in_accept_order() {
        let mut reg = Registry::default();
        let (a, _ra) = session("zed");
        let (b, _rb) = session("amy");
        reg.register(b).unwrap();
        reg.register(a).unwrap();
        // "zed" was created (accepted) first, so it lists first.
        assert_eq!(reg.usernames(), vec!["zed", "amy"]);
    }

    #[test]
    fn test_set_muted_toggles_and_is_idempotent() {
        let mut reg = Registry::default();
        let (bob, _rx) = session("bob");
        let id = bob.id;
        reg.register(bob).unwrap();

        reg.set_muted("bob", true).unwrap();
        reg.set_muted("bob", true).unwrap();
        assert!(reg.is_muted(id));

        reg.set_muted("bob", false).unwrap();
        assert!(!reg.is_muted(id));
    }

    #[test]
    fn test_set_muted_unknown_returns_not_online() {
        let mut reg = Registry::default();
        assert_eq!(
            reg.set_muted("ghost", true),
            Err(SessionError::NotOnline("ghost".into()))
        );
    }

    // =====================================================================
    // broadcast() / send_to()
    // =====================================================================

    #[test]
    fn test_broadcast_reaches_every_session() {
        let mut reg = Registry::default();
        let (a, mut ra) = session("a");
        let (b, mut rb) = session("b");
        reg.register(a).unwrap();
        reg.register(b).unwrap();

        assert_eq!(reg.broadcast("hi"), 2);
        assert_eq!(drain(&mut ra), vec!["hi"]);
        assert_eq!(drain(&mut rb), vec!["hi"]);
    }

    #[test]
    fn test_broadcast_isolates_failed_recipient() {
        let mut reg = Registry::default();
        let (a, mut ra) = session("a");
        let (b, rb) = session("b");
        let (c, mut rc) = session("c");
        reg.register(a).unwrap();
        reg.register(b).unwrap();
        reg.register(c).unwrap();
        drop(rb); // b's writer is gone

        assert_eq!(reg.broadcast("still here"), 2);
        assert_eq!(drain(&mut ra), vec!["still here"]);
        assert_eq!(drain(&mut rc), vec!["still here"]);
    }

    #[test]
    fn test_send_to_delivers_only_to_target() {
        let mut reg = Registry::default();
        let (a, mut ra) = session("a");
        let (b, mut rb) = session("b");
        let b_id = b.id;
        reg.register(a).unwrap();
        reg.register(b).unwrap();

        reg.send_to(b_id, "psst").unwrap();

        assert!(drain(&mut ra).is_empty());
        assert_eq!(drain(&mut rb), vec!["psst"]);
    }

    #[test]
    fn test_send_to_unknown_returns_not_online() {
        let reg = Registry::default();
        assert!(matches!(
            reg.send_to(SessionId(u64::MAX), "x"),
            Err(SessionError::NotOnline(_))
        ));
    }
}
