//! The command table.
//!
//! Commands are looked up by name in [`COMMAND_TABLE`]; each entry knows
//! its arity, whether it needs the admin password and whether a muted
//! user may still run it. The dispatcher routes on the returned
//! [`Command`] value instead of comparing strings.

use std::fmt;

/// A recognized `/`-prefixed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `/exit`: leave the server.
    Exit,
    /// `/clear_cache`: empty the message history (admin).
    ClearCache,
    /// `/pmsg <user> <text>`: private message.
    PrivateMessage,
    /// `/users`: list who is online.
    Users,
    /// `/help`: print the command reference.
    Help,
    /// `/mute <user>`: suppress a user's broadcasts.
    Mute,
    /// `/unmute <user>`: lift a mute.
    Unmute,
    /// `/ban <user>`: disconnect a user (admin).
    Ban,
}

/// Name → command lookup table.
const COMMAND_TABLE: &[(&str, Command)] = &[
    ("/exit", Command::Exit),
    ("/clear_cache", Command::ClearCache),
    ("/pmsg", Command::PrivateMessage),
    ("/users", Command::Users),
    ("/help", Command::Help),
    ("/mute", Command::Mute),
    ("/unmute", Command::Unmute),
    ("/ban", Command::Ban),
];

impl Command {
    /// Looks up a command by its wire name, slash included.
    ///
    /// Names are case-sensitive: `/EXIT` is not `/exit`.
    pub fn lookup(name: &str) -> Option<Self> {
        COMMAND_TABLE
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, cmd)| *cmd)
    }

    /// Returns the wire name of this command.
    pub fn name(self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, cmd)| *cmd == self)
            .map(|(n, _)| *n)
            .unwrap_or("/")
    }

    /// Number of positional arguments read after the command token.
    ///
    /// `/pmsg` reads one (the recipient); its text is the free-form message.
    pub fn arity(self) -> usize {
        match self {
            Self::PrivateMessage | Self::Mute | Self::Unmute | Self::Ban => 1,
            Self::Exit | Self::ClearCache | Self::Users | Self::Help => 0,
        }
    }

    /// Returns `true` if a muted user may still run this command.
    ///
    /// Self-service and informational commands stay available; anything
    /// that speaks to or acts on other users does not.
    pub fn allowed_while_muted(self) -> bool {
        matches!(
            self,
            Self::Exit
                | Self::ClearCache
                | Self::PrivateMessage
                | Self::Users
                | Self::Help
        )
    }

    /// Returns `true` if the command challenges for the admin password.
    pub fn requires_password(self) -> bool {
        matches!(self, Self::ClearCache | Self::Ban)
    }

    /// Usage line shown when the command's arguments are malformed.
    pub fn usage(self) -> &'static str {
        match self {
            Self::Exit => "Usage: /exit",
            Self::ClearCache => "Usage: /clear_cache",
            Self::PrivateMessage => "Usage: /pmsg <user> <message>",
            Self::Users => "Usage: /users",
            Self::Help => "Usage: /help",
            Self::Mute => "Usage: /mute <user>",
            Self::Unmute => "Usage: /unmute <user>",
            Self::Ban => "Usage: /ban <user>",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_every_table_entry_round_trips_name() {
        for (name, cmd) in COMMAND_TABLE {
            assert_eq!(Command::lookup(name), Some(*cmd));
            assert_eq!(cmd.name(), *name);
        }
    }

    #[test]
    fn test_lookup_unknown_or_wrong_case_returns_none() {
        assert_eq!(Command::lookup("/dance"), None);
        assert_eq!(Command::lookup("/EXIT"), None);
        assert_eq!(Command::lookup("exit"), None);
        assert_eq!(Command::lookup("/"), None);
    }

    #[test]
    fn test_arity_targeted_commands_take_one_arg() {
        assert_eq!(Command::PrivateMessage.arity(), 1);
        assert_eq!(Command::Mute.arity(), 1);
        assert_eq!(Command::Unmute.arity(), 1);
        assert_eq!(Command::Ban.arity(), 1);
        assert_eq!(Command::Users.arity(), 0);
        assert_eq!(Command::ClearCache.arity(), 0);
    }

    #[test]
    fn test_allowed_while_muted_blocks_moderation() {
        assert!(Command::Users.allowed_while_muted());
        assert!(Command::Help.allowed_while_muted());
        assert!(Command::PrivateMessage.allowed_while_muted());
        assert!(Command::ClearCache.allowed_while_muted());
        assert!(Command::Exit.allowed_while_muted());
        assert!(!Command::Mute.allowed_while_muted());
        assert!(!Command::Unmute.allowed_while_muted());
        assert!(!Command::Ban.allowed_while_muted());
    }

    #[test]
    fn test_requires_password_only_admin_commands() {
        assert!(Command::ClearCache.requires_password());
        assert!(Command::Ban.requires_password());
        assert!(!Command::Mute.requires_password());
    }

    #[test]
    fn test_display_uses_wire_name() {
        assert_eq!(Command::PrivateMessage.to_string(), "/pmsg");
    }
}
