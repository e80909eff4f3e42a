//! Plain-text message construction.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::error::Result;
use crate::header::Headers;
use crate::message_id::MessageId;

/// Subject used when none (or an empty one) is given.
pub const NO_SUBJECT: &str = "(no subject)";

/// Body used when none (or an empty one) is given.
pub const NO_BODY: &str = "(no message body)";

/// `Date` header layout, e.g. `Tue, 13 Oct 2026 08:15:02 GMT`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A rendered-ready plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    body: String,
}

impl Message {
    /// Returns the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the message body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the `Message-Id` header value.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("Message-Id")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n{}", self.headers, self.body)
    }
}

/// Builder for a single-part `text/plain` message.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    from: String,
    to: String,
    subject: Option<String>,
    text: Option<String>,
    date: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Creates a builder for a message from `from` to `to`.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: None,
            text: None,
            date: None,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Overrides the `Date` header (defaults to now).
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender address has no usable domain for the
    /// `Message-Id`.
    pub fn build(self) -> Result<Message> {
        let sender = Address::parse(self.from.as_str())?;
        let date = self.date.unwrap_or_else(Utc::now);

        let mut headers = Headers::new();
        headers.add("From", self.from);
        headers.add("To", header_value(&self.to));
        let subject = self.subject.map(|s| header_value(&s));
        headers.add("Subject", non_empty(subject, NO_SUBJECT));
        headers.add("Date", date.format(DATE_FORMAT).to_string());
        headers.add("Message-Id", MessageId::generate(&sender).to_string());
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Transfer-Encoding", "8bit");
        headers.add("Content-Type", "text/plain; charset=UTF-8");

        Ok(Message {
            headers,
            body: non_empty(self.text, NO_BODY),
        })
    }
}

/// Folds control characters to spaces so the value stays on its own line.
fn header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(value: Option<String>, placeholder: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| placeholder.to_string())
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
    use chrono::TimeZone;

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 13, 8, 15, 2).unwrap()
    }

    #[test]
    fn test_header_order() {
        let message = MessageBuilder::new("a@x.com", "b@y.com")
            .subject("Hi")
            .text("Hello")
            .date(fixed_date())
            .build()
            .unwrap();

        let names: Vec<_> = message.headers().iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "From",
                "To",
                "Subject",
                "Date",
                "Message-Id",
                "MIME-Version",
                "Content-Transfer-Encoding",
                "Content-Type",
            ]
        );
    }

    #[test]
    fn test_rendered_message() {
        let message = MessageBuilder::new("a@x.com", "b@y.com")
            .subject("Hi")
            .text("Hello")
            .date(fixed_date())
            .build()
            .unwrap();

        let rendered = message.to_string();
        let message_id = message.message_id().unwrap();
        let expected = format!(
            "From: a@x.com\r\n\
             To: b@y.com\r\n\
             Subject: Hi\r\n\
             Date: Tue, 13 Oct 2026 08:15:02 GMT\r\n\
             Message-Id: {message_id}\r\n\
             MIME-Version: 1.0\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             Content-Type: text/plain; charset=UTF-8\r\n\
             \r\n\
             Hello"
        );
        assert_eq!(rendered, expected);
        assert!(message_id.ends_with("@x.com>"));
    }

    #[test]
    fn test_placeholders() {
        let message = MessageBuilder::new("a@x.com", "b@y.com")
            .subject("")
            .build()
            .unwrap();

        assert_eq!(message.headers().get("Subject"), Some(NO_SUBJECT));
        assert_eq!(message.body(), NO_BODY);
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let result = MessageBuilder::new("not-an-address", "b@y.com").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_recipient_not_validated_here() {
        let message = MessageBuilder::new("a@x.com", "whoever").build().unwrap();
        assert_eq!(message.headers().get("To"), Some("whoever"));
    }

    #[test]
    fn test_subject_cannot_inject_headers() {
        let message = MessageBuilder::new("a@x.com", "b@y.com\r\nCc: c@z.com")
            .subject("Hi\r\nBcc: victim@z.com")
            .build()
            .unwrap();

        assert_eq!(message.headers().get("Subject"), Some("Hi  Bcc: victim@z.com"));
        assert_eq!(message.headers().get("To"), Some("b@y.com  Cc: c@z.com"));
        assert_eq!(message.headers().get("Bcc"), None);
        assert_eq!(message.to_string().matches("\r\n").count(), 9);
    }

    #[test]
    fn test_control_only_subject_uses_placeholder() {
        let message = MessageBuilder::new("a@x.com", "b@y.com")
            .subject("\r\n")
            .build()
            .unwrap();

        assert_eq!(message.headers().get("Subject"), Some(NO_SUBJECT));
    }
}
