//! In-memory SMTP peer for session tests.
//!
//! The client side of a `tokio::io::duplex` pipe is wrapped in a
//! [`MockTransport`]; the other side is driven by [`run_peer`] following a
//! [`Script`]. STARTTLS "upgrades" only flip a flag, so the scripted peer
//! keeps talking plaintext on the same pipe.
#![allow(dead_code)] // Not every test file uses every helper

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use mxmail_smtp::{CertificatePolicy, Connector, Result, Transport};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf,
    duplex,
};

/// SMTP command received by the mock peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    /// EHLO command with hostname
    Ehlo(String),
    /// STARTTLS command
    StartTls,
    /// MAIL FROM command
    MailFrom(String),
    /// RCPT TO command
    RcptTo(String),
    /// DATA command
    Data,
    /// Message content (after DATA, still dot-stuffed)
    MessageContent(String),
    /// QUIT command
    Quit,
    /// Unknown/other command
    Other(String),
}

impl SmtpCommand {
    fn parse(line: &str) -> Self {
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("EHLO ") {
            Self::Ehlo(line[5..].to_string())
        } else if upper == "STARTTLS" {
            Self::StartTls
        } else if upper.starts_with("MAIL FROM:") {
            Self::MailFrom(line[10..].to_string())
        } else if upper.starts_with("RCPT TO:") {
            Self::RcptTo(line[8..].to_string())
        } else if upper == "DATA" {
            Self::Data
        } else if upper == "QUIT" {
            Self::Quit
        } else {
            Self::Other(line.to_string())
        }
    }
}

/// How the scripted peer behaves.
#[derive(Debug, Clone)]
pub struct Script {
    /// Send a greeting at all.
    pub greet: bool,
    /// Single-line reply to the first EHLO instead of the usual listing.
    pub ehlo_reply: Option<&'static str>,
    /// Advertise STARTTLS in the EHLO reply.
    pub starttls: bool,
    /// Reply to STARTTLS; anything but 220 keeps the session in plaintext.
    pub starttls_reply: &'static str,
    /// Send pipelined plaintext right after the STARTTLS 220.
    pub inject_after_starttls: bool,
    /// Last line of the reply to the EHLO sent after STARTTLS.
    pub secure_ehlo_reply: &'static str,
    /// Reply to RCPT TO.
    pub rcpt_reply: &'static str,
    /// Stop reading once DATA has been accepted.
    pub stall_during_data: bool,
    /// Delay before acknowledging the end of data.
    pub data_ack_delay: Duration,
    /// Reply to QUIT.
    pub quit_reply: &'static str,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            greet: true,
            ehlo_reply: None,
            starttls: false,
            starttls_reply: "220 2.0.0 Ready to start TLS",
            inject_after_starttls: false,
            secure_ehlo_reply: "250 8BITMIME",
            rcpt_reply: "250 2.1.5 Ok",
            stall_during_data: false,
            data_ack_delay: Duration::ZERO,
            quit_reply: "221 2.0.0 Bye",
        }
    }
}

impl Script {
    /// A peer that accepts the message and offers STARTTLS.
    pub fn with_starttls() -> Self {
        Self {
            starttls: true,
            ..Self::default()
        }
    }

    /// A peer that never sends its greeting.
    pub fn silent() -> Self {
        Self {
            greet: false,
            ..Self::default()
        }
    }
}

/// Commands a peer received, shared with the test.
pub type Transcript = Arc<Mutex<Vec<SmtpCommand>>>;

/// Client end of the pipe.
#[derive(Debug)]
pub struct MockTransport {
    inner: DuplexStream,
    secured: bool,
}

impl MockTransport {
    pub const fn new(inner: DuplexStream) -> Self {
        Self {
            inner,
            secured: false,
        }
    }
}

impl Transport for MockTransport {
    async fn upgrade(mut self, _host: &str, _certificates: CertificatePolicy) -> Result<Self> {
        self.secured = true;
        Ok(self)
    }

    fn is_secure(&self) -> bool {
        self.secured
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Connector that spawns a scripted peer for every connection.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Script,
    hosts: Arc<Mutex<Vec<(String, u16)>>>,
    transcript: Transcript,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            hosts: Arc::default(),
            transcript: Arc::default(),
        }
    }

    /// Hosts (and ports) connected to, in order.
    pub fn hosts(&self) -> Vec<(String, u16)> {
        self.hosts.lock().unwrap().clone()
    }

    /// Every command received across all connections.
    pub fn commands(&self) -> Vec<SmtpCommand> {
        self.transcript.lock().unwrap().clone()
    }

    /// Number of EHLO commands received.
    pub fn ehlo_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, SmtpCommand::Ehlo(_)))
            .count()
    }
}

impl Connector for MockConnector {
    type Stream = MockTransport;

    async fn connect(&self, host: &str, port: u16, _timeout: Duration) -> Result<MockTransport> {
        self.hosts.lock().unwrap().push((host.to_string(), port));
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(run_peer(server, self.script.clone(), self.transcript.clone()));
        Ok(MockTransport::new(client))
    }
}

struct Peer {
    stream: BufReader<DuplexStream>,
    transcript: Transcript,
}

impl Peer {
    async fn send(&mut self, line: &str) {
        let _ = self
            .stream
            .get_mut()
            .write_all(format!("{line}\r\n").as_bytes())
            .await;
    }

    async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.stream.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    async fn recv(&mut self) -> Option<SmtpCommand> {
        let command = SmtpCommand::parse(&self.read_line().await?);
        self.transcript.lock().unwrap().push(command.clone());
        Some(command)
    }

    async fn recv_content(&mut self) -> Option<()> {
        let mut content = String::new();
        loop {
            let line = self.read_line().await?;
            if line == "." {
                break;
            }
            content.push_str(&line);
            content.push_str("\r\n");
        }
        self.transcript
            .lock()
            .unwrap()
            .push(SmtpCommand::MessageContent(content));
        Some(())
    }

    async fn drain(&mut self) {
        while self.read_line().await.is_some() {}
    }
}

/// Drives the server end of the pipe until the script ends or the client
/// hangs up.
pub async fn run_peer(stream: DuplexStream, script: Script, transcript: Transcript) {
    let mut peer = Peer {
        stream: BufReader::new(stream),
        transcript,
    };
    let _ = serve(&mut peer, &script).await;
    peer.drain().await;
}

async fn serve(peer: &mut Peer, script: &Script) -> Option<()> {
    if !script.greet {
        return None;
    }
    peer.send("220 mx.example.org ESMTP").await;

    peer.recv().await?;
    if let Some(reply) = script.ehlo_reply {
        peer.send(reply).await;
    } else {
        peer.send("250-mx.example.org").await;
        if script.starttls {
            peer.send("250-STARTTLS").await;
        }
        peer.send("250 8BITMIME").await;
    }

    let mut command = peer.recv().await?;
    if command == SmtpCommand::StartTls {
        if script.inject_after_starttls {
            peer.send("220 2.0.0 Ready to start TLS\r\n250 injected").await;
            return None;
        }
        peer.send(script.starttls_reply).await;
        if script.starttls_reply.starts_with("220") {
            peer.recv().await?;
            if !script.secure_ehlo_reply.starts_with('2') {
                peer.send(script.secure_ehlo_reply).await;
                return None;
            }
            peer.send("250-mx.example.org").await;
            peer.send(script.secure_ehlo_reply).await;
        }
        command = peer.recv().await?;
    }

    if !matches!(command, SmtpCommand::MailFrom(_)) {
        return None;
    }
    peer.send("250 2.1.0 Ok").await;
    peer.recv().await?;
    peer.send(script.rcpt_reply).await;
    if !script.rcpt_reply.starts_with('2') {
        return None;
    }
    peer.recv().await?;
    peer.send("354 End data with <CR><LF>.<CR><LF>").await;
    if script.stall_during_data {
        std::future::pending::<()>().await;
    }
    peer.recv_content().await?;
    tokio::time::sleep(script.data_ack_delay).await;
    peer.send("250 2.0.0 Ok: queued").await;
    peer.recv().await?;
    peer.send(script.quit_reply).await;
    Some(())
}
