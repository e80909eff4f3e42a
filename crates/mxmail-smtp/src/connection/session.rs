//! The SMTP session state machine.
//!
//! One session is one delivery attempt: connect, greeting, EHLO, optional
//! STARTTLS, MAIL, RCPT, DATA, payload and QUIT, in that order. The first
//! step that does not get the reply it needs ends the session.

use std::time::Duration;

use mxmail_mime::Address;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, trace, warn};

use super::reader::{Expect, ReplyReader};
use super::{Connector, SessionConfig, StartTlsPolicy, Transport};
use crate::command::Command;
use crate::types::{Reply, ReplyCode, Stage};
use crate::{Error, Result, data};

/// Sender and recipient of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    to: Address,
}

impl Envelope {
    /// Parses both envelope addresses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mime`] if either address is malformed.
    pub fn new(from: &str, to: &str) -> Result<Self> {
        Ok(Self {
            from: Address::parse(from)?,
            to: Address::parse(to)?,
        })
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from(&self) -> &Address {
        &self.from
    }

    /// Returns the recipient.
    #[must_use]
    pub const fn to(&self) -> &Address {
        &self.to
    }
}

/// Outcome of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Host the session ran against.
    pub host: String,
    /// True if the message went over a STARTTLS-secured channel.
    pub secured: bool,
    /// Number of EHLO commands sent (2 after a STARTTLS upgrade).
    pub ehlo_count: usize,
}

/// Connects to `host` and delivers `message` in a single session.
///
/// # Errors
///
/// Returns the error of the first step that failed. A session running past
/// the configured session timeout fails with [`Error::SessionTimeout`].
pub async fn deliver<C: Connector>(
    connector: &C,
    host: &str,
    config: &SessionConfig,
    envelope: &Envelope,
    message: &str,
) -> Result<SessionReport> {
    config.validate()?;

    let deadline = Instant::now() + config.session_timeout;
    debug!(host, port = config.port, "connecting");
    let stream = connector
        .connect(host, config.port, config.connect_timeout)
        .await?;

    let session = Session::new(stream, host, config, deadline);
    let result = timeout_at(deadline, session.run(envelope, message))
        .await
        .unwrap_or(Err(Error::SessionTimeout));
    if let Err(err) = &result {
        debug!(host, stage = ?err.stage(), error = %err, "session failed");
    }
    result
}

/// An SMTP session over one transport.
#[derive(Debug)]
pub struct Session<'a, S> {
    reader: ReplyReader<S>,
    host: String,
    config: &'a SessionConfig,
    deadline: Instant,
    ehlo_count: usize,
}

impl<'a, S: Transport> Session<'a, S> {
    /// Wraps a connected transport. No step may wait past `deadline`.
    pub fn new(stream: S, host: &str, config: &'a SessionConfig, deadline: Instant) -> Self {
        Self {
            reader: ReplyReader::new(stream),
            host: host.to_string(),
            config,
            deadline,
            ehlo_count: 0,
        }
    }

    /// Runs every step from the greeting to QUIT.
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed.
    pub async fn run(mut self, envelope: &Envelope, message: &str) -> Result<SessionReport> {
        let reply_timeout = self.config.reply_timeout;

        self.expect(Expect::code(Stage::Greeting, ReplyCode::SERVICE_READY), reply_timeout)
            .await?;

        self.send(&Command::Ehlo {
            hostname: self.config.hostname.clone(),
        })
        .await?;
        self.ehlo_count += 1;

        let offered = self.probe_starttls().await?;
        match (offered, self.config.starttls) {
            (true, StartTlsPolicy::Opportunistic) => self = self.starttls().await?,
            (true, StartTlsPolicy::Disabled) => debug!("STARTTLS offered, upgrade disabled"),
            (false, _) => {
                debug!(host = %self.host, "STARTTLS not offered, continuing in plaintext");
            }
        }

        self.command(
            &Command::MailFrom {
                from: envelope.from().clone(),
            },
            Expect::code(Stage::MailFrom, ReplyCode::OK),
        )
        .await?;
        self.command(
            &Command::RcptTo {
                to: envelope.to().clone(),
            },
            Expect::code(Stage::RcptTo, ReplyCode::OK),
        )
        .await?;
        self.command(
            &Command::Data,
            Expect::code(Stage::Data, ReplyCode::START_DATA),
        )
        .await?;

        let payload = data::encode(message);
        trace!(bytes = payload.len(), ">> message payload");
        self.reader.write_all(&payload).await?;
        self.expect(Expect::code(Stage::Body, ReplyCode::OK), self.config.data_timeout)
            .await?;

        self.command(&Command::Quit, Expect::code(Stage::Quit, ReplyCode::CLOSING))
            .await?;
        if let Err(e) = self.reader.shutdown().await {
            debug!(error = %e, "shutdown after QUIT failed");
        }

        let report = SessionReport {
            host: self.host,
            secured: self.reader.get_ref().is_secure(),
            ehlo_count: self.ehlo_count,
        };
        info!(host = %report.host, secured = report.secured, "message accepted");
        Ok(report)
    }

    /// Reads the EHLO reply and reports whether `STARTTLS` was advertised.
    ///
    /// Stops at the last line of the reply or when the reply timeout runs
    /// out. A silent peer or a refused EHLO counts as not offering it; MAIL
    /// FROM decides whether the peer talks to us at all.
    async fn probe_starttls(&mut self) -> Result<bool> {
        let deadline = self.deadline_after(self.config.reply_timeout);
        let mut offered = false;

        while let Some(reply) = self.reader.next_reply_until(deadline).await? {
            if reply.has_code(ReplyCode::OK) && reply.message_contains("STARTTLS") {
                offered = true;
            }
            if reply.last {
                if reply.is_error() {
                    debug!(reply = %reply, "EHLO refused");
                    offered = false;
                }
                break;
            }
        }

        Ok(offered)
    }

    /// Upgrades the connection in place and repeats EHLO over it.
    ///
    /// If the peer does not answer `STARTTLS` with 220 the session carries
    /// on in plaintext. Once the 220 arrived, any failure ends the session.
    async fn starttls(mut self) -> Result<Self> {
        let reply_timeout = self.config.reply_timeout;
        let ready = self
            .command(
                &Command::StartTls,
                Expect::code(Stage::StartTls, ReplyCode::SERVICE_READY),
            )
            .await;
        match ready {
            Ok(_) => {}
            Err(err @ (Error::Rejected { .. } | Error::NoReply { .. })) => {
                warn!(host = %self.host, error = %err, "STARTTLS refused, continuing in plaintext");
                return Ok(self);
            }
            Err(err) => return Err(err),
        }

        let stream = self.reader.into_inner()?;
        debug!(host = %self.host, policy = ?self.config.certificates, "starting TLS handshake");
        let secured = stream.upgrade(&self.host, self.config.certificates).await?;
        self.reader = ReplyReader::new(secured);

        self.send(&Command::Ehlo {
            hostname: self.config.hostname.clone(),
        })
        .await?;
        self.ehlo_count += 1;
        self.expect(Expect::code(Stage::SecureEhlo, ReplyCode::OK), reply_timeout)
            .await?;

        Ok(self)
    }

    async fn command(&mut self, command: &Command, expect: Expect<'_>) -> Result<Reply> {
        self.send(command).await?;
        self.expect(expect, self.config.reply_timeout).await
    }

    async fn send(&mut self, command: &Command) -> Result<()> {
        debug!(command = command.verb(), ">>");
        self.reader.write_all(&command.serialize()).await
    }

    async fn expect(&mut self, expect: Expect<'_>, timeout: Duration) -> Result<Reply> {
        let deadline = self.deadline_after(timeout);
        let reply = self.reader.wait_for(expect, deadline).await?;
        debug!(stage = %expect.stage, reply = %reply, "<<");
        Ok(reply)
    }

    fn deadline_after(&self, timeout: Duration) -> Instant {
        (Instant::now() + timeout).min(self.deadline)
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
    fn test_envelope_parses_addresses() {
        let envelope = Envelope::new("a@x.com", "b@Y.com").unwrap();
        assert_eq!(envelope.from().as_str(), "a@x.com");
        assert_eq!(envelope.to().domain(), "y.com");
    }

    #[test]
    fn test_envelope_rejects_injection() {
        let result = Envelope::new("a@x.com", "b@y.com>\r\nRCPT TO:<c@z.com");
        assert!(matches!(result, Err(Error::Mime(_))));
    }
}
