//! Session steps, used to report where an attempt failed.

use std::fmt;

/// A step of the SMTP session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// TCP connect.
    Connect,
    /// Waiting for the 220 greeting.
    Greeting,
    /// First EHLO and the STARTTLS probe.
    Ehlo,
    /// STARTTLS command and its 220.
    StartTls,
    /// TLS handshake over the existing connection.
    Handshake,
    /// EHLO repeated on the secured channel.
    SecureEhlo,
    /// MAIL FROM.
    MailFrom,
    /// RCPT TO.
    RcptTo,
    /// DATA and its 354.
    Data,
    /// Message payload and end-of-data acknowledgement.
    Body,
    /// QUIT and its 221.
    Quit,
}

impl Stage {
    /// Returns a short label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Greeting => "greeting",
            Self::Ehlo => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Handshake => "TLS handshake",
            Self::SecureEhlo => "EHLO (secured)",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Body => "end of data",
            Self::Quit => "QUIT",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
