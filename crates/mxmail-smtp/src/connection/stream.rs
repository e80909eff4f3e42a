//! Stream types for SMTP sessions.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::CertificatePolicy;
use super::tls::{create_tls_connector, server_name};
use crate::{Error, Result};

/// A byte stream a session can run over and secure in place.
///
/// Implemented by [`SmtpStream`] for real connections. Tests implement it over
/// in-memory pipes.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + Sized {
    /// Consumes the plaintext stream and returns its secured replacement.
    fn upgrade(
        self,
        host: &str,
        certificates: CertificatePolicy,
    ) -> impl Future<Output = Result<Self>> + Send;

    /// Returns true once the stream is encrypted.
    fn is_secure(&self) -> bool;
}

/// A stream that can be either plaintext or TLS.
pub enum SmtpStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Creates a new plaintext stream.
    #[must_use]
    pub const fn plain(stream: TcpStream) -> Self {
        Self::Plain(stream)
    }
}

impl std::fmt::Debug for SmtpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(stream) => f.debug_tuple("Plain").field(stream).finish(),
            Self::Tls(_) => f.write_str("Tls"),
        }
    }
}

impl Transport for SmtpStream {
    async fn upgrade(self, host: &str, certificates: CertificatePolicy) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let connector = create_tls_connector(certificates)?;
                let tls = connector.connect(server_name(host)?, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::Protocol("Stream is already TLS".to_string())),
        }
    }

    fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
