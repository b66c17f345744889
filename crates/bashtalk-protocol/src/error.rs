//! Error types for the protocol layer.
//!
//! Parse failures never end a session; the dispatcher turns them into a
//! usage or "malformed" notice for the sender only.

/// Errors produced while splitting a line into its positional fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line was blank.
    #[error("empty line")]
    Empty,

    /// Token 1 was missing or not wrapped in `<` and `>`.
    #[error("missing <sender> token")]
    MissingSender,

    /// Arguments were requested but the line is too short to hold them.
    ///
    /// The line needs `3 + expected` tokens: timestamp, sender, command,
    /// then one token per argument.
    #[error("too few arguments: expected {expected}")]
    TooFewArguments {
        /// How many arguments the caller asked for.
        expected: usize,
    },

    /// Arguments were requested but token 2 does not start with `/`.
    #[error("no command found")]
    NoCommandFound,
}
