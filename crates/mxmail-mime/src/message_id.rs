//! `Message-Id` generation.

use std::fmt;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::address::Address;

/// Length of each random component of a generated `Message-Id`.
const TOKEN_LEN: usize = 10;

/// Returns a random string of ASCII letters and digits.
#[must_use]
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// A `Message-Id` of the form `<left.right@domain>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId {
    left: String,
    right: String,
    domain: String,
}

impl MessageId {
    /// Generates a fresh identifier in the sender's domain.
    #[must_use]
    pub fn generate(sender: &Address) -> Self {
        Self {
            left: random_token(TOKEN_LEN),
            right: random_token(TOKEN_LEN),
            domain: sender.domain().to_string(),
        }
    }

    /// Returns the domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}.{}@{}>", self.left, self.right, self.domain)
    }
}
