//! Outbound line formatting.
//!
//! Chat lines look like `[HH:mm] <username> text`, server notices like
//! `[HH:mm] <# server #> text`. Every function takes the timestamp as a
//! string so callers decide the clock; [`timestamp`] reads local time.

use chrono::Timelike;

/// The sender tag used for server-originated notices.
pub const SERVER_TAG: &str = "# server #";

/// Static command reference, one wire line per entry.
pub const HELP_LINES: &[&str] = &[
    "Commands:",
    "\tExit: /exit",
    "\tClear cache (superuser): /clear_cache",
    "\tUsers online: /users",
    "\tPrivate message: /pmsg <user> <message>",
    "\tMute: /mute <user>",
    "\tUnmute: /unmute <user>",
    "\tBan (superuser): /ban <user>",
    "\tHelp: /help",
];

/// Returns the current local time as `[HH:mm]`.
pub fn timestamp() -> String {
    timestamp_at(&chrono::Local::now())
}

/// Formats any clock value as `[HH:mm]`.
pub fn timestamp_at(time: &impl Timelike) -> String {
    format!("[{:02}:{:02}]", time.hour(), time.minute())
}

/// `"{ts} <{sender}> {text}"`
pub fn chat_line(ts: &str, sender: &str, text: &str) -> String {
    format!("{ts} <{sender}> {text}")
}

/// `"{ts} <# server #> {text}"`
pub fn server_notice(ts: &str, text: &str) -> String {
    chat_line(ts, SERVER_TAG, text)
}

/// `"Private: {ts} <{sender}@{recipient}> {text}"`
pub fn private_message(
    ts: &str,
    sender: &str,
    recipient: &str,
    text: &str,
) -> String {
    format!("Private: {ts} <{sender}@{recipient}> {text}")
}

/// `"Online Users: [alice, bob]"`
pub fn online_users<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<&str>>()
        .join(", ");
    format!("Online Users: [{joined}]")
}

/// Notice text for a join.
pub fn joined(username: &str) -> String {
    format!("{username} has joined the server.")
}

/// Notice text for a departure.
pub fn left(username: &str) -> String {
    format!("{username} has left the server.")
}

/// `"\"{username}\" is not online."`
pub fn not_online(username: &str) -> String {
    format!("\"{username}\" is not online.")
}

/// Broadcast after a mute or unmute, framed as coming from the actor.
pub fn mute_notice(ts: &str, actor: &str, target: &str, muted: bool) -> String {
    let verb = if muted { "muted" } else { "unmuted" };
    format!("{ts} <{actor}> {verb} <{target}>.")
}

/// Broadcast after a ban.
pub fn ban_notice(ts: &str, target: &str) -> String {
    format!("{ts} <{target}> was banned from the server.")
}

/// First line of the reply to an unknown command; followed by
/// [`HELP_LINES`].
pub fn invalid_command(name: &str) -> String {
    format!("\tInvalid command: \"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn test_timestamp_at_zero_pads() {
        let t = NaiveTime::from_hms_opt(7, 5, 59).unwrap();
        assert_eq!(timestamp_at(&t), "[07:05]");
    }

    #[test]
    fn test_timestamp_has_fixed_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), 7);
        assert!(ts.starts_with('[') && ts.ends_with(']'));
        assert_eq!(&ts[3..4], ":");
    }

    #[test]
    fn test_server_notice_uses_server_tag() {
        assert_eq!(
            server_notice("[10:00]", "Cache cleared."),
            "[10:00] <# server #> Cache cleared."
        );
    }

    #[test]
    fn test_private_message_frames_both_names() {
        assert_eq!(
            private_message("[10:00]", "alice", "bob", "psst"),
            "Private: [10:00] <alice@bob> psst"
        );
    }

    #[test]
    fn test_online_users_joins_with_commas() {
        assert_eq!(
            online_users(&["alice", "bob"]),
            "Online Users: [alice, bob]"
        );
        let none: [&str; 0] = [];
        assert_eq!(online_users(&none), "Online Users: []");
    }

    #[test]
    fn test_mute_notice_names_actor_and_target() {
        assert_eq!(
            mute_notice("[10:00]", "alice", "bob", true),
            "[10:00] <alice> muted <bob>."
        );
        assert_eq!(
            mute_notice("[10:00]", "alice", "bob", false),
            "[10:00] <alice> unmuted <bob>."
        );
    }

    #[test]
    fn test_help_lines_have_no_newlines() {
        assert!(HELP_LINES.iter().all(|l| !l.contains('\n')));
    }
}
