//! Session configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default SMTP port for server-to-server delivery.
pub const DEFAULT_PORT: u16 = 25;

/// Whether to upgrade with STARTTLS when the peer offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartTlsPolicy {
    /// Upgrade when `STARTTLS` is advertised, otherwise continue in plaintext.
    #[default]
    Opportunistic,
    /// Never upgrade.
    Disabled,
}

/// How the peer certificate is checked after STARTTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificatePolicy {
    /// Encrypt without checking the certificate chain or name.
    ///
    /// Handshake signatures are still verified. This matches how most MX
    /// hosts are reached in practice, where self-signed or mismatched
    /// certificates are common.
    #[default]
    AcceptAny,
    /// Require a chain to the Mozilla root set that names the MX host.
    Verify,
}

/// Per-session SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local hostname announced in EHLO.
    pub hostname: String,
    /// Server port.
    pub port: u16,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Timeout for each expected reply.
    pub reply_timeout: Duration,
    /// Timeout for the acknowledgement after end-of-data.
    pub data_timeout: Duration,
    /// Upper bound on a whole session, connect to QUIT.
    pub session_timeout: Duration,
    /// STARTTLS policy.
    pub starttls: StartTlsPolicy,
    /// Certificate policy after STARTTLS.
    pub certificates: CertificatePolicy,
}

impl SessionConfig {
    /// Creates a configuration with default port and timeouts.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        SessionConfigBuilder::new(hostname).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hostname: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(hostname)
    }

    /// Checks that the EHLO hostname can be sent on a command line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostname`] if it is empty or contains
    /// whitespace or control characters.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty()
            || self
                .hostname
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(Error::InvalidHostname(self.hostname.clone()));
        }
        Ok(())
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    hostname: String,
    port: u16,
    connect_timeout: Duration,
    reply_timeout: Duration,
    data_timeout: Duration,
    session_timeout: Duration,
    starttls: StartTlsPolicy,
    certificates: CertificatePolicy,
}

impl SessionConfigBuilder {
    /// Creates a new builder with the given EHLO hostname.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_millis(3000),
            reply_timeout: Duration::from_millis(3000),
            data_timeout: Duration::from_millis(5000),
            session_timeout: Duration::from_secs(60),
            starttls: StartTlsPolicy::Opportunistic,
            certificates: CertificatePolicy::AcceptAny,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-reply timeout.
    #[must_use]
    pub const fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets the end-of-data acknowledgement timeout.
    #[must_use]
    pub const fn data_timeout(mut self, timeout: Duration) -> Self {
        self.data_timeout = timeout;
        self
    }

    /// Sets the whole-session timeout.
    #[must_use]
    pub const fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the STARTTLS policy.
    #[must_use]
    pub const fn starttls(mut self, policy: StartTlsPolicy) -> Self {
        self.starttls = policy;
        self
    }

    /// Sets the certificate policy.
    #[must_use]
    pub const fn certificates(mut self, policy: CertificatePolicy) -> Self {
        self.certificates = policy;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            hostname: self.hostname,
            port: self.port,
            connect_timeout: self.connect_timeout,
            reply_timeout: self.reply_timeout,
            data_timeout: self.data_timeout,
            session_timeout: self.session_timeout,
            starttls: self.starttls,
            certificates: self.certificates,
        }
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
    fn test_config_new() {
        let config = SessionConfig::new("relay.example.com");
        assert_eq!(config.hostname, "relay.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.connect_timeout, Duration::from_millis(3000));
        assert_eq!(config.reply_timeout, Duration::from_millis(3000));
        assert_eq!(config.data_timeout, Duration::from_millis(5000));
        assert_eq!(config.starttls, StartTlsPolicy::Opportunistic);
        assert_eq!(config.certificates, CertificatePolicy::AcceptAny);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder("relay.example.com")
            .port(2525)
            .starttls(StartTlsPolicy::Disabled)
            .certificates(CertificatePolicy::Verify)
            .data_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.port, 2525);
        assert_eq!(config.starttls, StartTlsPolicy::Disabled);
        assert_eq!(config.certificates, CertificatePolicy::Verify);
        assert_eq!(config.data_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validate_hostname() {
        assert!(SessionConfig::new("relay.example.com").validate().is_ok());
        assert!(SessionConfig::new("").validate().is_err());
        assert!(SessionConfig::new("relay\r\nQUIT").validate().is_err());
        assert!(SessionConfig::new("two words").validate().is_err());
    }
}
