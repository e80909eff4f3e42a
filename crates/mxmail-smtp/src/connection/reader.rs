//! Deadline-bounded SMTP reply reading.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

use crate::parser::parse_reply_line;
use crate::types::{Reply, ReplyCode, Stage};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Maximum reply line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// What [`ReplyReader::wait_for`] is waiting for.
#[derive(Debug, Clone, Copy)]
pub struct Expect<'a> {
    /// Step that is waiting, for errors and logs.
    pub stage: Stage,
    /// Required reply code, if any.
    pub code: Option<ReplyCode>,
    /// Required message substring (ASCII case-insensitive), if any.
    pub contains: Option<&'a str>,
}

impl<'a> Expect<'a> {
    /// Expects a reply with the given code.
    #[must_use]
    pub const fn code(stage: Stage, code: ReplyCode) -> Self {
        Self {
            stage,
            code: Some(code),
            contains: None,
        }
    }

    /// Additionally requires the message to contain `needle`.
    #[must_use]
    pub const fn containing(mut self, needle: &'a str) -> Self {
        self.contains = Some(needle);
        self
    }

    /// Returns true if `reply` satisfies this expectation.
    #[must_use]
    pub fn matches(&self, reply: &Reply) -> bool {
        self.code.is_none_or(|code| reply.has_code(code))
            && self.contains.is_none_or(|needle| reply.message_contains(needle))
    }
}

/// Line-buffered reader over an SMTP connection.
///
/// Bytes of an unfinished line survive a timed-out read, so a later call
/// continues where the previous one stopped.
#[derive(Debug)]
pub struct ReplyReader<S> {
    reader: BufReader<S>,
    partial: Vec<u8>,
}

impl<S> ReplyReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            partial: Vec::new(),
        }
    }

    /// Reads the next reply line, waiting at most `timeout` in total.
    ///
    /// Returns `Ok(None)` if nothing arrived. If the time runs out (or the
    /// peer closes) after part of a line was read, that part is parsed as
    /// the reply.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if a line exceeds
    /// [`MAX_LINE_LENGTH`].
    pub async fn next_reply(&mut self, timeout: Duration) -> Result<Option<Reply>> {
        self.next_reply_until(Instant::now() + timeout).await
    }

    /// Reads the next reply line, giving up at `deadline`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if a line exceeds
    /// [`MAX_LINE_LENGTH`].
    pub async fn next_reply_until(&mut self, deadline: Instant) -> Result<Option<Reply>> {
        while !self.partial.ends_with(b"\r\n") {
            let Ok(filled) = timeout_at(deadline, self.reader.fill_buf()).await else {
                break;
            };
            let buf = filled?;
            if buf.is_empty() {
                break;
            }

            let take = buf
                .iter()
                .position(|&b| b == b'\n')
                .map_or(buf.len(), |pos| pos + 1);
            self.partial.extend_from_slice(&buf[..take]);
            self.reader.consume(take);

            if self.partial.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("reply line too long".to_string()));
            }
        }

        if self.partial.is_empty() {
            return Ok(None);
        }

        let raw = std::mem::take(&mut self.partial);
        let text = String::from_utf8_lossy(&raw);
        let line = text.strip_suffix("\r\n").unwrap_or(&text);
        trace!(line, "<<");
        Ok(Some(parse_reply_line(line)))
    }

    /// Reads replies until one satisfies `expect`, giving up at `deadline`.
    ///
    /// Non-matching replies are skipped. If the matching reply is a
    /// continuation line, the rest of its reply is drained before returning
    /// so the next command starts on a clean stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReply`] when the deadline passes or the peer goes
    /// quiet, and [`Error::Rejected`] on a final 4xx/5xx reply that does not
    /// satisfy `expect`.
    pub async fn wait_for(&mut self, expect: Expect<'_>, deadline: Instant) -> Result<Reply> {
        loop {
            let Some(reply) = self.next_reply_until(deadline).await? else {
                return Err(Error::NoReply {
                    stage: expect.stage,
                });
            };

            if expect.matches(&reply) {
                if !reply.last {
                    self.drain_reply(deadline).await?;
                }
                return Ok(reply);
            }

            if reply.last && reply.is_error() {
                let code = reply.code.map_or(0, ReplyCode::as_u16);
                return Err(Error::rejected(expect.stage, code, reply.message));
            }

            debug!(stage = %expect.stage, reply = %reply, "skipping unexpected reply");
        }
    }

    /// Reads until the last line of the current multi-line reply.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub async fn drain_reply(&mut self, deadline: Instant) -> Result<()> {
        while let Some(reply) = self.next_reply_until(deadline).await? {
            if reply.last {
                break;
            }
        }
        Ok(())
    }

    /// Writes a line or payload and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns true if received bytes are waiting to be read.
    #[must_use]
    pub fn has_buffered_data(&self) -> bool {
        !self.partial.is_empty() || !self.reader.buffer().is_empty()
    }

    /// Returns the underlying stream for an in-place upgrade.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlaintextAfterStartTls`] if unread bytes are
    /// buffered; they would otherwise be treated as if they had arrived
    /// over the secured channel.
    pub fn into_inner(self) -> Result<S> {
        if self.has_buffered_data() {
            return Err(Error::PlaintextAfterStartTls);
        }
        Ok(self.reader.into_inner())
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Shuts down the write half of the underlying stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
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
    use tokio::io::duplex;

    const TIMEOUT: Duration = Duration::from_millis(3000);

    #[tokio::test]
    async fn test_reads_one_line_per_reply() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        server
            .write_all(b"250-mx.example.org\r\n250 SIZE 1000\r\n")
            .await
            .unwrap();

        let first = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(first.code, Some(ReplyCode::OK));
        assert_eq!(first.message, "mx.example.org");
        assert!(!first.last);

        let second = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(second.message, "SIZE 1000");
        assert!(second.last);
    }

    #[tokio::test]
    async fn test_line_split_across_writes() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);

        let writer = tokio::spawn(async move {
            server.write_all(b"220 mx.exa").await.unwrap();
            server.write_all(b"mple.org\r").await.unwrap();
            server.write_all(b"\n").await.unwrap();
            server
        });

        let reply = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(reply.code, Some(ReplyCode::SERVICE_READY));
        assert_eq!(reply.message, "mx.example.org");
        drop(writer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_data_is_no_reply() {
        let (client, _server) = duplex(1024);
        let mut reader = ReplyReader::new(client);

        let started = Instant::now();
        let reply = reader.next_reply(TIMEOUT).await.unwrap();
        assert!(reply.is_none());
        assert!(started.elapsed() >= TIMEOUT);
        assert!(started.elapsed() < TIMEOUT + Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_with_partial_line_parses_partial() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        server.write_all(b"220 half a gree").await.unwrap();

        let reply = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(reply.code, Some(ReplyCode::SERVICE_READY));
        assert_eq!(reply.message, "half a gree");
    }

    #[tokio::test]
    async fn test_eof_returns_none() {
        let (client, server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        drop(server);

        assert!(reader.next_reply(TIMEOUT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let (client, mut server) = duplex(MAX_LINE_LENGTH * 2);
        let mut reader = ReplyReader::new(client);
        let long_line = vec![b'A'; MAX_LINE_LENGTH + 100];
        server.write_all(&long_line).await.unwrap();

        let result = reader.next_reply(TIMEOUT).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_wait_for_skips_and_matches_continuation() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        server
            .write_all(b"250-mx.example.org\r\n250-STARTTLS\r\n250 8BITMIME\r\nnext\r\n")
            .await
            .unwrap();

        let expect = Expect::code(Stage::Ehlo, ReplyCode::OK).containing("starttls");
        let reply = reader
            .wait_for(expect, Instant::now() + TIMEOUT)
            .await
            .unwrap();
        assert_eq!(reply.message, "STARTTLS");

        // the rest of the multi-line reply was drained
        let next = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(next.message, "next");
    }

    #[tokio::test]
    async fn test_wait_for_fails_fast_on_rejection() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        server
            .write_all(b"550 5.1.1 no such user\r\n")
            .await
            .unwrap();

        let result = reader
            .wait_for(
                Expect::code(Stage::RcptTo, ReplyCode::OK),
                Instant::now() + TIMEOUT,
            )
            .await;
        match result {
            Err(Error::Rejected {
                stage,
                code,
                message,
            }) => {
                assert_eq!(stage, Stage::RcptTo);
                assert_eq!(code, 550);
                assert_eq!(message, "5.1.1 no such user");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_overall_deadline_is_not_reset_by_chatter() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);

        tokio::spawn(async move {
            loop {
                if server.write_all(b"250-still talking\r\n").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        });

        let started = Instant::now();
        let result = reader
            .wait_for(
                Expect::code(Stage::Greeting, ReplyCode::SERVICE_READY),
                Instant::now() + TIMEOUT,
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::NoReply {
                stage: Stage::Greeting
            })
        ));
        assert!(started.elapsed() <= TIMEOUT);
    }

    #[tokio::test]
    async fn test_into_inner_rejects_buffered_bytes() {
        let (client, mut server) = duplex(1024);
        let mut reader = ReplyReader::new(client);
        server
            .write_all(b"220 go ahead\r\n250 injected\r\n")
            .await
            .unwrap();

        let reply = reader.next_reply(TIMEOUT).await.unwrap().unwrap();
        assert_eq!(reply.code, Some(ReplyCode::SERVICE_READY));
        assert!(reader.has_buffered_data());
        assert!(matches!(
            reader.into_inner(),
            Err(Error::PlaintextAfterStartTls)
        ));
    }

    #[tokio::test]
    async fn test_scripted_ehlo_exchange() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .write(b"EHLO relay.example.com\r\n")
            .read(b"250-mx.example.org\r\n250-PIPELINING\r\n250 STARTTLS\r\n")
            .build();
        let mut reader = ReplyReader::new(mock);

        reader.write_all(b"EHLO relay.example.com\r\n").await.unwrap();
        let expect = Expect::code(Stage::Ehlo, ReplyCode::OK).containing("starttls");
        let reply = reader
            .wait_for(expect, Instant::now() + TIMEOUT)
            .await
            .unwrap();

        assert_eq!(reply.message, "STARTTLS");
        assert!(reply.last);
        assert!(!reader.has_buffered_data());
    }

    #[tokio::test]
    async fn test_matched_continuation_drains_reply() {
        use tokio_test::io::Builder;

        let mock = Builder::new()
            .read(b"250-STARTTLS\r\n250-8BITMIME\r\n250 SIZE 1000\r\n")
            .build();
        let mut reader = ReplyReader::new(mock);

        let expect = Expect::code(Stage::Ehlo, ReplyCode::OK).containing("STARTTLS");
        let reply = reader
            .wait_for(expect, Instant::now() + TIMEOUT)
            .await
            .unwrap();

        assert!(!reply.last);
        assert!(!reader.has_buffered_data());
        assert!(reader.into_inner().is_ok());
    }
}
