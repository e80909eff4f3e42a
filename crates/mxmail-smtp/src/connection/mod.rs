//! Connections, transports and the SMTP session.

mod config;
mod reader;
mod session;
mod stream;
mod tls;

pub use config::{
    CertificatePolicy, DEFAULT_PORT, SessionConfig, SessionConfigBuilder, StartTlsPolicy,
};
pub use reader::{Expect, MAX_LINE_LENGTH, ReplyReader};
pub use session::{Envelope, Session, SessionReport, deliver};
pub use stream::{SmtpStream, Transport};
pub use tls::{AcceptAnyCertificate, create_tls_connector, server_name};

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;

use crate::{Error, Result};

/// Opens the plaintext connection a session starts on.
pub trait Connector: Send + Sync {
    /// Stream type produced by this connector.
    type Stream: Transport;

    /// Connects to `host:port`, failing if it takes longer than `timeout`.
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Connects over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = SmtpStream;

    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> Result<SmtpStream> {
        let connect = TcpStream::connect((host, port));
        let tcp = with_connect_timeout(host, port, timeout, connect).await?;
        tcp.set_nodelay(true)?;
        Ok(SmtpStream::plain(tcp))
    }
}

/// Bounds a connect attempt to `host:port` by `timeout`.
async fn with_connect_timeout<T>(
    host: &str,
    port: u16,
    timeout: Duration,
    connect: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    let stream = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| Error::ConnectTimeout {
            host: host.to_string(),
            port,
        })??;
    Ok(stream)
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
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_connector_connects_plain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let stream = TcpConnector
            .connect("127.0.0.1", port, Duration::from_secs(3))
            .await
            .unwrap();
        assert!(!stream.is_secure());
        drop(accept.await.unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpConnector
            .connect("127.0.0.1", port, Duration::from_secs(3))
            .await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let started = tokio::time::Instant::now();

        let result = with_connect_timeout(
            "mx.example.org",
            25,
            Duration::from_millis(3000),
            std::future::pending::<std::io::Result<()>>(),
        )
        .await;

        assert!(matches!(
            result,
            Err(Error::ConnectTimeout { ref host, port: 25 }) if host == "mx.example.org"
        ));
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }
}
