//! Tokenizer for the positional line grammar.
//!
//! Every line a client sends after its username has this shape:
//!
//! ```text
//! <timestamp> <"<sender>"> [<"/command"> [arg1 [arg2 ...]]] <free-text message>
//! ```
//!
//! For example `[09:15] <alice> /pmsg bob see you at noon` carries the
//! command `/pmsg`, the argument `bob` and the message `see you at noon`,
//! while `[09:15] <alice> hi all` carries no command and the message
//! `hi all`.

use crate::ParseError;

/// Tokens before the first argument: timestamp, sender, command.
const HEADER_TOKENS: usize = 3;

/// A line split into its structured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// Token 0, passed through untouched.
    pub timestamp: String,
    /// Token 1 with its angle brackets stripped.
    pub sender: String,
    /// Token 2 when it starts with `/`, including the slash.
    pub command: Option<String>,
    /// The `expected_args` tokens right after the command.
    pub args: Vec<String>,
    /// Every remaining token, re-joined with single spaces.
    pub message: String,
}

impl ParsedLine {
    /// Splits `line` into fields, reading `expected_args` positional
    /// arguments after the command token.
    ///
    /// Callers that don't know the command yet pass `0`; once they have
    /// looked the command up they parse again with its arity.
    ///
    /// # Errors
    /// - [`ParseError::Empty`] for a blank line.
    /// - [`ParseError::TooFewArguments`] when `expected_args > 0` and the
    ///   line has fewer than `3 + expected_args` tokens. This is checked
    ///   before the command itself.
    /// - [`ParseError::MissingSender`] when token 1 is absent or not of the
    ///   form `<name>`.
    /// - [`ParseError::NoCommandFound`] when `expected_args > 0` but token 2
    ///   does not start with `/`.
    pub fn parse(line: &str, expected_args: usize) -> Result<Self, ParseError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }

        if expected_args > 0 && tokens.len() < HEADER_TOKENS + expected_args {
            return Err(ParseError::TooFewArguments {
                expected: expected_args,
            });
        }

        let sender = tokens
            .get(1)
            .and_then(|t| t.strip_prefix('<'))
            .and_then(|t| t.strip_suffix('>'))
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingSender)?;

        let command = tokens.get(2).filter(|t| t.starts_with('/'));
        if expected_args > 0 && command.is_none() {
            return Err(ParseError::NoCommandFound);
        }

        // With no command the would-be command token belongs to the
        // message, so an unprefixed line loses nothing.
        let (args, message_start) = match command {
            Some(_) => (
                &tokens[HEADER_TOKENS..HEADER_TOKENS + expected_args],
                HEADER_TOKENS + expected_args,
            ),
            None => (&tokens[..0], HEADER_TOKENS - 1),
        };

        Ok(Self {
            timestamp: tokens[0].to_string(),
            sender: sender.to_string(),
            command: command.map(|c| c.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            message: tokens
                .get(message_start..)
                .unwrap_or_default()
                .join(" "),
        })
    }

    /// Returns the argument at `index`, if it was requested and present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}
