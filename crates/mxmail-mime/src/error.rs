//! Error types for message construction.

/// Result type alias for message construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Message construction errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mailbox address does not have a `local@domain.tld` shape.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}
