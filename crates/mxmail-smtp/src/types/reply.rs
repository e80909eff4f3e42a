//! SMTP reply types.

use std::fmt;

/// One SMTP reply line.
///
/// Replies are not aggregated: every physical line from the server is its
/// own reply. A line that does not start with a numeric code still yields a
/// reply, with `code` absent and the trimmed line as its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code, if the line had one.
    pub code: Option<ReplyCode>,
    /// Reply text after the code and separator.
    pub message: String,
    /// False for a `code-text` continuation line.
    pub last: bool,
}

impl Reply {
    /// Creates a final reply line.
    #[must_use]
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            last: true,
        }
    }

    /// Creates a reply for a line without a code.
    #[must_use]
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            last: true,
        }
    }

    /// Returns true if the reply carries exactly this code.
    #[must_use]
    pub fn has_code(&self, code: ReplyCode) -> bool {
        self.code == Some(code)
    }

    /// Returns true if this is a transient (4xx) or permanent (5xx) error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.code
            .is_some_and(|code| code.is_transient() || code.is_permanent())
    }

    /// Returns true if the message contains `needle`, ignoring ASCII case.
    #[must_use]
    pub fn message_contains(&self, needle: &str) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => {
                let separator = if self.last { ' ' } else { '-' };
                write!(f, "{code}{separator}{}", self.message)
            }
            None => f.write_str(&self.message),
        }
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes the session waits for
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(!ReplyCode::START_DATA.is_permanent());
            assert!(ReplyCode::MAILBOX_BUSY.is_transient());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
            assert!(!ReplyCode::OK.is_transient());
        }

        #[test]
        fn display() {
            assert_eq!(ReplyCode::OK.to_string(), "250");
            assert_eq!(ReplyCode::new(7).to_string(), "7");
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn has_code() {
            let reply = Reply::new(ReplyCode::OK, "ok");
            assert!(reply.has_code(ReplyCode::OK));
            assert!(!reply.has_code(ReplyCode::SERVICE_READY));
            assert!(!Reply::uncoded("ok").has_code(ReplyCode::OK));
        }

        #[test]
        fn is_error() {
            assert!(Reply::new(ReplyCode::TRANSACTION_FAILED, "no").is_error());
            assert!(Reply::new(ReplyCode::MAILBOX_BUSY, "later").is_error());
            assert!(!Reply::new(ReplyCode::START_DATA, "go on").is_error());
            assert!(!Reply::uncoded("garbage").is_error());
        }

        #[test]
        fn message_contains_ignores_case() {
            let reply = Reply::new(ReplyCode::OK, "StartTLS");
            assert!(reply.message_contains("STARTTLS"));
            assert!(!reply.message_contains("AUTH"));
        }

        #[test]
        fn display() {
            let mut reply = Reply::new(ReplyCode::OK, "mx.example.org");
            assert_eq!(reply.to_string(), "250 mx.example.org");
            reply.last = false;
            assert_eq!(reply.to_string(), "250-mx.example.org");
            assert_eq!(Reply::uncoded("hello").to_string(), "hello");
        }
    }
}
