//! Wire protocol for BashTalk.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Grammar** ([`ParsedLine`]): the fixed positional layout every
//!   inbound chat or command line follows.
//! - **Commands** ([`Command`]): the table of `/`-prefixed commands, their
//!   arity and moderation rules.
//! - **Reserved lines** ([`reserved`]): sentinel strings with protocol
//!   meaning, such as the username prompt or the ban notice.
//! - **Formatting** ([`format`]): how the server frames outbound lines.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw lines) and session
//! (who said it). It doesn't know about sockets or the registry; it only
//! knows how lines look.
//!
//! ```text
//! Transport (lines) → Protocol (ParsedLine, Command) → Session (dispatch)
//! ```

mod command;
mod error;
pub mod format;
mod grammar;
pub mod reserved;

pub use command::Command;
pub use error::ParseError;
pub use grammar::ParsedLine;
