//! Unified error type for the BashTalk server.

use bashtalk_session::{AuthError, SessionError};
use bashtalk_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BashTalkError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A session-level error (registration, delivery).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The admin credential could not be constructed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The global tracing subscriber was already installed.
    #[error("logging init failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::LineTooLong(8192);
        let top: BashTalkError = err.into();
        assert!(matches!(top, BashTalkError::Transport(_)));
        assert!(top.to_string().contains("8192"));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::UsernameTaken("alice".into());
        let top: BashTalkError = err.into();
        assert!(matches!(top, BashTalkError::Session(_)));
        assert!(top.to_string().contains("alice"));
    }

    #[test]
    fn test_from_auth_error() {
        let top: BashTalkError = AuthError::InvalidDigest.into();
        assert!(matches!(top, BashTalkError::Auth(_)));
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::InvalidValue {
            key: "BASHTALK_PORT".into(),
            value: "x".into(),
        };
        let top: BashTalkError = err.into();
        assert!(matches!(top, BashTalkError::Config(_)));
    }
}
