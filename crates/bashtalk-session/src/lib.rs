//! Session tracking and admin authentication for BashTalk.
//!
//! This crate holds the shared state every connection handler touches:
//!
//! 1. **Authentication**: checking the admin secret ([`AuthGate`])
//! 2. **Session records**: who is connected and how to reach them
//!    ([`SessionHandle`], [`SessionState`])
//! 3. **Registry**: the directory of active sessions, with unique
//!    usernames and a capacity bound ([`Registry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← runs one handler per connection, locks the registry
//!     ↕
//! Session Layer (this crate)  ← usernames, mute flags, outbound queues
//!     ↕
//! Protocol Layer (below)  ← line grammar and formatting
//! ```

mod auth;
mod error;
mod registry;
mod session;

pub use auth::AuthGate;
pub use error::{AuthError, SessionError};
pub use registry::{validate_username, Registry, DEFAULT_MAX_SESSIONS};
pub use session::{OutboundSender, SessionHandle, SessionId, SessionState};
