//! # BashTalk
//!
//! Multi-user chat server speaking newline-delimited text over TCP.
//!
//! Clients pick a unique username, receive the recent message history,
//! then exchange chat lines that are broadcast to everyone online. Lines
//! whose third token starts with `/` are commands: private messages,
//! user listing, muting, and password-gated moderation (`/ban`,
//! `/clear_cache`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bashtalk::prelude::*;
//!
//! # async fn start() -> Result<(), BashTalkError> {
//! let config = ServerConfig::load()?;
//! let server = ChatServerBuilder::from_config(&config)
//!     .build(AuthGate::from_secret("letmein"))
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod dispatch;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::BashTalkError;
pub use server::{ChatServer, ChatServerBuilder};

pub mod prelude {
    pub use crate::config::{ConfigError, ServerConfig};
    pub use crate::error::BashTalkError;
    pub use crate::server::{ChatServer, ChatServerBuilder};
    pub use bashtalk_protocol::reserved;
    pub use bashtalk_session::AuthGate;
}
