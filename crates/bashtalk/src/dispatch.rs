//! Routes each inbound line of an active session to chat or a command.

use bashtalk_protocol::{format, reserved, Command, ParseError, ParsedLine};

use crate::handler::{ActiveSession, Inbound};
use crate::BashTalkError;

const MUTED: &str = "You are currently muted.";
const MALFORMED: &str = "Malformed message.";
const PASSWORD_PROMPT: &str = "Enter password: ";
const CACHE_CLEARED: &str = "Cache cleared.";
const AUTH_FAILED: &str = "Authentication failed.";

/// What the session loop should do after a line is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The user asked to leave.
    Exit,
    /// The peer hung up mid-command.
    Closed,
    /// The session was banned while handling the line.
    Kicked,
}

/// Handles one fresh inbound line.
pub(crate) async fn dispatch(
    session: &ActiveSession,
    line: &str,
) -> Result<Flow, BashTalkError> {
    let parsed = match ParsedLine::parse(line, 0) {
        Ok(parsed) => parsed,
        Err(ParseError::Empty) => return Ok(Flow::Continue),
        Err(e) => {
            tracing::debug!(session_id = %session.id, error = %e, "malformed line");
            session.notice(MALFORMED);
            return Ok(Flow::Continue);
        }
    };

    let Some(name) = parsed.command.as_deref() else {
        broadcast_chat(session, &parsed).await;
        return Ok(Flow::Continue);
    };

    let command = Command::lookup(name);
    let allowed = command.is_some_and(Command::allowed_while_muted);
    if !allowed && is_muted(session).await {
        session.notice(MUTED);
        return Ok(Flow::Continue);
    }

    let Some(command) = command else {
        session.send(format::invalid_command(name));
        send_help(session);
        return Ok(Flow::Continue);
    };

    let parsed = match command.arity() {
        0 => parsed,
        n => match ParsedLine::parse(line, n) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(session_id = %session.id, %command, error = %e, "bad arguments");
                session.notice(command.usage());
                return Ok(Flow::Continue);
            }
        },
    };
    tracing::debug!(session_id = %session.id, %command, "command");

    if command.requires_password() {
        match challenge_password(session).await? {
            Challenge::Passed => {}
            Challenge::Failed => {
                session.notice(AUTH_FAILED);
                return Ok(Flow::Continue);
            }
            Challenge::Ended(flow) => return Ok(flow),
        }
    }

    match command {
        Command::Exit => Ok(Flow::Exit),
        Command::ClearCache => {
            session.state.cache.lock().await.clear();
            tracing::info!(username = %session.username, "message cache cleared");
            session.notice(CACHE_CLEARED);
            Ok(Flow::Continue)
        }
        Command::PrivateMessage => {
            private_message(session, &parsed).await;
            Ok(Flow::Continue)
        }
        Command::Users => {
            let names = session.state.registry.lock().await.usernames();
            session.send(format::online_users(&names));
            Ok(Flow::Continue)
        }
        Command::Help => {
            send_help(session);
            Ok(Flow::Continue)
        }
        Command::Mute => {
            set_muted(session, &parsed, true).await;
            Ok(Flow::Continue)
        }
        Command::Unmute => {
            set_muted(session, &parsed, false).await;
            Ok(Flow::Continue)
        }
        Command::Ban => ban(session, &parsed).await,
    }
}

async fn is_muted(session: &ActiveSession) -> bool {
    session.state.registry.lock().await.is_muted(session.id)
}

/// Appends a plain line to the history and fans it out.
///
/// The line is rebuilt under the session's own username, whatever sender
/// token the client wrote. The cache lock is held across the broadcast so
/// history order matches delivery order.
async fn broadcast_chat(session: &ActiveSession, parsed: &ParsedLine) {
    if parsed.message.is_empty() {
        return;
    }
    if parsed.sender != session.username {
        tracing::debug!(session_id = %session.id, claimed = %parsed.sender, "sender token rewritten");
    }
    let line = format::chat_line(&parsed.timestamp, &session.username, &parsed.message);

    let mut cache = session.state.cache.lock().await;
    let registry = session.state.registry.lock().await;
    if registry.is_muted(session.id) {
        drop(registry);
        drop(cache);
        session.notice(MUTED);
        return;
    }
    registry.broadcast(&line);
    cache.append(line);
}

fn send_help(session: &ActiveSession) {
    for line in format::HELP_LINES {
        session.send(*line);
    }
}

/// Extracts the password from a challenge reply: the message field of a
/// well-formed line, or the whole trimmed line otherwise.
fn password_attempt(reply: &str) -> String {
    match ParsedLine::parse(reply, 0) {
        Ok(parsed) if parsed.command.is_none() => parsed.message,
        _ => reply.trim().to_string(),
    }
}

/// Outcome of a password challenge.
enum Challenge {
    Passed,
    Failed,
    /// The session ended while waiting; carries how.
    Ended(Flow),
}

/// Prompts for the admin password and checks the next line.
///
/// The reply is consumed here and never dispatched. No reply within the
/// configured timeout counts as a failure.
async fn challenge_password(session: &ActiveSession) -> Result<Challenge, BashTalkError> {
    session.notice(PASSWORD_PROMPT);

    let timeout = session.state.password_timeout;
    let reply = match tokio::time::timeout(timeout, session.read_line()).await {
        Ok(inbound) => inbound?,
        Err(_) => {
            tracing::warn!(session_id = %session.id, username = %session.username, "password challenge timed out");
            return Ok(Challenge::Failed);
        }
    };

    let reply = match reply {
        Inbound::Line(reply) => reply,
        Inbound::Closed => return Ok(Challenge::Ended(Flow::Closed)),
        Inbound::Kicked => return Ok(Challenge::Ended(Flow::Kicked)),
    };

    if session.state.auth.verify(&password_attempt(&reply)) {
        Ok(Challenge::Passed)
    } else {
        tracing::warn!(session_id = %session.id, username = %session.username, "authentication failed");
        Ok(Challenge::Failed)
    }
}

async fn private_message(session: &ActiveSession, parsed: &ParsedLine) {
    let (Some(recipient), false) = (parsed.arg(0), parsed.message.is_empty()) else {
        session.notice(Command::PrivateMessage.usage());
        return;
    };

    let registry = session.state.registry.lock().await;
    let Some(target_id) = registry.find_by_username(recipient).map(|h| h.id) else {
        drop(registry);
        session.notice(&format::not_online(recipient));
        return;
    };

    let line = format::private_message(
        &parsed.timestamp,
        &session.username,
        recipient,
        &parsed.message,
    );
    if let Err(e) = registry.send_to(target_id, &line) {
        tracing::warn!(error = %e, "private message not delivered");
    }
    drop(registry);
    if target_id != session.id {
        session.send(line);
    }
}

async fn set_muted(session: &ActiveSession, parsed: &ParsedLine, muted: bool) {
    let Some(target) = parsed.arg(0) else {
        let command = if muted { Command::Mute } else { Command::Unmute };
        session.notice(command.usage());
        return;
    };

    let mut registry = session.state.registry.lock().await;
    match registry.set_muted(target, muted) {
        Ok(()) => {
            let ts = format::timestamp();
            registry.broadcast(&format::mute_notice(&ts, &session.username, target, muted));
            tracing::info!(actor = %session.username, user = target, muted, "mute changed");
        }
        Err(_) => {
            drop(registry);
            session.notice(&format::not_online(target));
        }
    }
}

/// Removes `target` after the password challenge has passed.
async fn ban(session: &ActiveSession, parsed: &ParsedLine) -> Result<Flow, BashTalkError> {
    let Some(target) = parsed.arg(0) else {
        session.notice(Command::Ban.usage());
        return Ok(Flow::Continue);
    };

    let mut registry = session.state.registry.lock().await;
    let Some(banned) = registry.remove_by_username(target) else {
        drop(registry);
        session.notice(&format::not_online(target));
        return Ok(Flow::Continue);
    };

    if let Err(e) = banned.send(reserved::BANNED) {
        tracing::debug!(error = %e, "ban line not delivered");
    }
    banned.kick();
    registry.broadcast(&format::ban_notice(&format::timestamp(), target));
    tracing::info!(actor = %session.username, user = target, session_id = %banned.id, "user banned");

    if banned.id == session.id {
        return Ok(Flow::Kicked);
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_attempt_well_formed_takes_message() {
        assert_eq!(password_attempt("[10:00] <alice> hunter2"), "hunter2");
    }

    #[test]
    fn test_password_attempt_keeps_inner_spaces() {
        assert_eq!(
            password_attempt("[10:00] <alice> correct horse"),
            "correct horse"
        );
    }

    #[test]
    fn test_password_attempt_bare_line_is_trimmed() {
        assert_eq!(password_attempt("  hunter2 \r"), "hunter2");
    }

    #[test]
    fn test_password_attempt_command_shaped_reply_uses_whole_line() {
        assert_eq!(
            password_attempt("[10:00] <alice> /exit"),
            "[10:00] <alice> /exit"
        );
    }
}
