//! Error types for SMTP delivery.

use std::io;

use crate::types::Stage;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// TCP connect did not complete in time.
    #[error("Connection to {host}:{port} timed out")]
    ConnectTimeout {
        /// Host that was dialled.
        host: String,
        /// Port that was dialled.
        port: u16,
    },

    /// The expected reply did not arrive before the deadline.
    #[error("No reply during {stage}")]
    NoReply {
        /// Step that was waiting.
        stage: Stage,
    },

    /// The server answered with a final 4xx/5xx reply.
    #[error("Rejected during {stage}: {code} {message}")]
    Rejected {
        /// Step that was waiting.
        stage: Stage,
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text.
        message: String,
    },

    /// Plaintext bytes were received after the STARTTLS go-ahead.
    #[error("Plaintext data received after STARTTLS")]
    PlaintextAfterStartTls,

    /// Hostname cannot be used for EHLO or TLS server name.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// The whole session exceeded its deadline.
    #[error("Session timed out")]
    SessionTimeout,

    /// Protocol error (malformed or oversized input).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Envelope address error.
    #[error(transparent)]
    Mime(#[from] mxmail_mime::Error),
}

impl Error {
    /// Creates a rejection error from a reply code and message.
    #[must_use]
    pub fn rejected(stage: Stage, code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            stage,
            code,
            message: message.into(),
        }
    }

    /// Returns true if retrying later cannot succeed (5xx, bad input).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Rejected { code, .. } => *code >= 500 && *code < 600,
            Self::InvalidHostname(_) | Self::Mime(_) => true,
            _ => false,
        }
    }

    /// Returns the step the session failed in, when known.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::NoReply { stage } | Self::Rejected { stage, .. } => Some(*stage),
            Self::ConnectTimeout { .. } => Some(Stage::Connect),
            Self::PlaintextAfterStartTls => Some(Stage::StartTls),
            Self::Tls(_) => Some(Stage::Handshake),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        let busy = Error::rejected(Stage::RcptTo, 450, "mailbox busy");
        assert!(!busy.is_permanent());

        let unknown = Error::rejected(Stage::RcptTo, 550, "no such user");
        assert!(unknown.is_permanent());
    }

    #[test]
    fn test_timeouts_are_not_permanent() {
        assert!(!Error::NoReply { stage: Stage::Greeting }.is_permanent());
        assert!(!Error::SessionTimeout.is_permanent());
        assert!(
            !Error::ConnectTimeout {
                host: "mx.example.com".into(),
                port: 25
            }
            .is_permanent()
        );
    }

    #[test]
    fn test_stage() {
        assert_eq!(
            Error::NoReply { stage: Stage::Body }.stage(),
            Some(Stage::Body)
        );
        assert_eq!(
            Error::Tls(rustls::Error::HandshakeNotComplete).stage(),
            Some(Stage::Handshake)
        );
        assert_eq!(Error::Protocol("x".into()).stage(), None);
    }

    #[test]
    fn test_display() {
        let err = Error::rejected(Stage::MailFrom, 553, "sender rejected");
        assert_eq!(err.to_string(), "Rejected during MAIL FROM: 553 sender rejected");
    }
}
