//! Error types for the delivery agent.

use thiserror::Error;

/// Errors that can occur in delivery operations.
#[derive(Debug, Error)]
pub enum Error {
    /// SMTP session failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mxmail_smtp::Error),

    /// Message or address could not be built.
    #[error("Message error: {0}")]
    Mime(#[from] mxmail_mime::Error),

    /// MX query failed.
    #[error("DNS error: {0}")]
    Dns(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if retrying cannot help.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Smtp(e) => e.is_permanent(),
            Self::Mime(_) | Self::Config(_) => true,
            Self::Dns(_) => false,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use mxmail_smtp::Stage;

    #[test]
    fn test_permanent_follows_reply_class() {
        let unknown = Error::from(mxmail_smtp::Error::rejected(Stage::RcptTo, 550, "no such user"));
        let busy = Error::from(mxmail_smtp::Error::rejected(Stage::RcptTo, 451, "try later"));

        assert!(unknown.is_permanent());
        assert!(!busy.is_permanent());
        assert!(!Error::Dns("SERVFAIL".into()).is_permanent());
    }
}
