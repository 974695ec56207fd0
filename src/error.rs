//! Error types shared across the bot.
//!
//! Connection-lifecycle errors live in [`SessionError`], failures from the
//! external collaborators (directory, media library, list files, captcha
//! solver) in [`ProviderError`]. Configuration errors stay in the config
//! module next to the loader.

use emcee_proto::CloseCode;
use thiserror::Error;

// ============================================================================
// Session Errors (connection lifecycle)
// ============================================================================

/// Errors that can end or prevent a room session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("directory lookup failed: {0}")]
    Directory(#[source] ProviderError),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("not connected to a room")]
    NotConnected,

    /// The writer task is gone; the connection is tearing down.
    #[error("outbound queue closed")]
    QueueClosed,

    #[error("server closed the session: {0}")]
    Closed(CloseCode),

    #[error("keepalive timed out")]
    KeepaliveTimeout,

    #[error("captcha challenge failed: {0}")]
    Captcha(String),

    #[error("room password rejected")]
    PasswordRejected,

    #[error("room requires a password and none is configured")]
    MissingPassword,
}

impl SessionError {
    /// Whether this error warrants an automatic reconnect attempt.
    ///
    /// Transport failures and keepalive timeouts are retried; close codes
    /// follow the server's table; everything else needs operator attention.
    pub fn should_reconnect(&self) -> bool {
        match self {
            Self::Ws(_) | Self::KeepaliveTimeout => true,
            Self::Closed(code) => code.should_reconnect(),
            _ => false,
        }
    }
}

// ============================================================================
// Provider Errors (external collaborators)
// ============================================================================

/// Errors from the injected providers.
///
/// These are always recovered locally: the triggering command or lookup
/// reports failure and room state is left untouched.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Captcha solver account has no funds left.
    #[error("no funds available for the captcha solver")]
    NoFunds,

    /// Captcha solver polled out without a ready solution.
    #[error("captcha solver gave up after {0} tries")]
    MaxTries(u32),

    #[error("provider api error {code}: {description}")]
    Api { code: String, description: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_policy() {
        assert!(SessionError::KeepaliveTimeout.should_reconnect());
        assert!(SessionError::Closed(CloseCode::Kicked).should_reconnect());
        assert!(!SessionError::Closed(CloseCode::Banned).should_reconnect());
        assert!(!SessionError::MissingPassword.should_reconnect());
    }

    #[test]
    fn test_provider_error_display() {
        let e = ProviderError::Api {
            code: "ERROR_KEY_DOES_NOT_EXIST".into(),
            description: "Account authorization key not found".into(),
        };
        assert!(e.to_string().contains("ERROR_KEY_DOES_NOT_EXIST"));
        assert_eq!(
            ProviderError::MaxTries(5).to_string(),
            "captcha solver gave up after 5 tries"
        );
    }
}
