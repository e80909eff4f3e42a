//! Test doubles for scheduler tests: a scripted in-memory SMTP peer behind a
//! [`MockConnector`] and a canned [`MockLookup`].
#![allow(dead_code)] // Not every test file uses every helper

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use mxmail::{Error, MxLookup, MxRecord};
use mxmail_smtp::{CertificatePolicy, Connector, Transport};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf,
    duplex,
};

/// MX answers handed out by [`MockLookup`].
#[derive(Debug, Clone)]
pub enum Answer {
    /// Records in this order.
    Records(Vec<MxRecord>),
    /// The query fails.
    Fail,
}

/// Canned MX lookup that records the domains it was asked about.
#[derive(Debug, Clone)]
pub struct MockLookup {
    answer: Answer,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockLookup {
    pub fn answering(exchange: &str) -> Self {
        Self::new(Answer::Records(vec![MxRecord::new(10, exchange)]))
    }

    pub fn failing() -> Self {
        Self::new(Answer::Fail)
    }

    pub fn new(answer: Answer) -> Self {
        Self {
            answer,
            queries: Arc::default(),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl MxLookup for MockLookup {
    async fn lookup_mx(&self, domain: &str) -> mxmail::Result<Vec<MxRecord>> {
        self.queries.lock().unwrap().push(domain.to_string());
        match &self.answer {
            Answer::Records(records) => Ok(records.clone()),
            Answer::Fail => Err(Error::Dns("SERVFAIL".to_string())),
        }
    }
}

/// How the scripted peer behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Accepts the message without offering STARTTLS.
    Accept,
    /// Offers STARTTLS, then accepts the message on the "secured" stream.
    AcceptWithStartTls,
    /// Never sends a greeting.
    Silent,
}

/// Client end of the pipe; "upgrading" only flips a flag.
#[derive(Debug)]
pub struct MockTransport {
    inner: DuplexStream,
    secured: bool,
}

impl Transport for MockTransport {
    async fn upgrade(
        mut self,
        _host: &str,
        _certificates: CertificatePolicy,
    ) -> mxmail_smtp::Result<Self> {
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

/// Connector that spawns a scripted peer per connection and records every
/// host it was asked to reach and every line the peers received.
#[derive(Debug, Clone)]
pub struct MockConnector {
    script: Script,
    hosts: Arc<Mutex<Vec<String>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            hosts: Arc::default(),
            lines: Arc::default(),
        }
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }

    pub fn ehlo_count(&self) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.starts_with("EHLO "))
            .count()
    }
}

impl Connector for MockConnector {
    type Stream = MockTransport;

    async fn connect(
        &self,
        host: &str,
        _port: u16,
        _timeout: Duration,
    ) -> mxmail_smtp::Result<MockTransport> {
        self.hosts.lock().unwrap().push(host.to_string());
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(run_peer(server, self.script, self.lines.clone()));
        Ok(MockTransport {
            inner: client,
            secured: false,
        })
    }
}

async fn run_peer(stream: DuplexStream, script: Script, lines: Arc<Mutex<Vec<String>>>) {
    let mut stream = BufReader::new(stream);
    if script != Script::Silent {
        let _ = converse(&mut stream, script == Script::AcceptWithStartTls, &lines).await;
    }
    // hold the connection open until the client hangs up
    while read_line(&mut stream, &lines).await.is_some() {}
}

async fn converse(
    stream: &mut BufReader<DuplexStream>,
    starttls: bool,
    lines: &Mutex<Vec<String>>,
) -> Option<()> {
    send(stream, "220 mx.y.com ESMTP").await?;
    read_line(stream, lines).await?;
    if starttls {
        send(stream, "250-mx.y.com\r\n250-STARTTLS\r\n250 8BITMIME").await?;
        read_line(stream, lines).await?;
        send(stream, "220 2.0.0 Ready to start TLS").await?;
        read_line(stream, lines).await?;
    }
    send(stream, "250-mx.y.com\r\n250 8BITMIME").await?;

    read_line(stream, lines).await?;
    send(stream, "250 2.1.0 Ok").await?;
    read_line(stream, lines).await?;
    send(stream, "250 2.1.5 Ok").await?;
    read_line(stream, lines).await?;
    send(stream, "354 End data with <CR><LF>.<CR><LF>").await?;
    while read_line(stream, lines).await? != "." {}
    send(stream, "250 2.0.0 Ok: queued").await?;
    read_line(stream, lines).await?;
    send(stream, "221 2.0.0 Bye").await
}

async fn send(stream: &mut BufReader<DuplexStream>, reply: &str) -> Option<()> {
    stream
        .get_mut()
        .write_all(format!("{reply}\r\n").as_bytes())
        .await
        .ok()
}

async fn read_line(
    stream: &mut BufReader<DuplexStream>,
    lines: &Mutex<Vec<String>>,
) -> Option<String> {
    let mut line = String::new();
    match stream.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = line.trim_end_matches(['\r', '\n']).to_string();
            lines.lock().unwrap().push(line.clone());
            Some(line)
        }
    }
}
