//! Mailer configuration.
//!
//! Every field except `hostname` has a default, so a JSON file only needs
//! to name the values it changes:
//!
//! ```json
//! { "hostname": "relay.example.com", "retry_limit": 6 }
//! ```

use std::time::Duration;

use mxmail_smtp::{CertificatePolicy, SessionConfig, StartTlsPolicy};
use serde::{Deserialize, Serialize};

use crate::queue::RetryPolicy;
use crate::{Error, Result};

/// Configuration for a [`Mailer`](crate::Mailer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailerConfig {
    /// Local hostname announced in EHLO. Required.
    #[serde(default)]
    pub hostname: String,

    /// SMTP port on the mail exchanger.
    ///
    /// Default: 25
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Minimum spacing between attempts for one entry, in milliseconds.
    ///
    /// Default: 240000 (4 minutes)
    #[serde(default = "defaults::retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Attempts per entry before it is left alone.
    ///
    /// Default: 4
    #[serde(default = "defaults::retry_limit")]
    pub retry_limit: u32,

    /// Scheduler tick period, in milliseconds.
    ///
    /// Default: 5000
    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// TCP connect timeout, in milliseconds.
    ///
    /// Default: 3000
    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Timeout for each expected reply, in milliseconds.
    ///
    /// Default: 3000
    #[serde(default = "defaults::reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    /// Timeout for the reply to end-of-data, in milliseconds.
    ///
    /// Default: 5000
    #[serde(default = "defaults::data_timeout_ms")]
    pub data_timeout_ms: u64,

    /// Upper bound on a whole session, in milliseconds.
    ///
    /// Default: 60000
    #[serde(default = "defaults::session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// STARTTLS policy.
    #[serde(default)]
    pub starttls: StartTlsPolicy,

    /// Certificate policy after STARTTLS.
    #[serde(default)]
    pub certificates: CertificatePolicy,
}

impl Default for MailerConfig {
    fn default() -> Self {
        MailerConfigBuilder::new(String::new()).build()
    }
}

impl MailerConfig {
    /// Creates a configuration with defaults for everything but the hostname.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        MailerConfigBuilder::new(hostname).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(hostname: impl Into<String>) -> MailerConfigBuilder {
        MailerConfigBuilder::new(hostname)
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the hostname is missing or unusable,
    /// the retry limit is zero, or any interval or timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(Error::Config("hostname is required".to_string()));
        }
        self.session_config()
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        if self.retry_limit == 0 {
            return Err(Error::Config("retry_limit must be at least 1".to_string()));
        }

        let intervals = [
            ("tick_interval_ms", self.tick_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("reply_timeout_ms", self.reply_timeout_ms),
            ("data_timeout_ms", self.data_timeout_ms),
            ("session_timeout_ms", self.session_timeout_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }

        Ok(())
    }

    /// Returns the scheduler tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Returns the retry policy described by this configuration.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_limit,
            Duration::from_millis(self.retry_interval_ms),
        )
    }

    /// Returns the per-session SMTP configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::builder(self.hostname.clone())
            .port(self.port)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .reply_timeout(Duration::from_millis(self.reply_timeout_ms))
            .data_timeout(Duration::from_millis(self.data_timeout_ms))
            .session_timeout(Duration::from_millis(self.session_timeout_ms))
            .starttls(self.starttls)
            .certificates(self.certificates)
            .build()
    }
}

/// Builder for mailer configuration.
#[derive(Debug, Clone)]
pub struct MailerConfigBuilder {
    config: MailerConfig,
}

impl MailerConfigBuilder {
    /// Creates a new builder with the given EHLO hostname.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            config: MailerConfig {
                hostname: hostname.into(),
                port: defaults::port(),
                retry_interval_ms: defaults::retry_interval_ms(),
                retry_limit: defaults::retry_limit(),
                tick_interval_ms: defaults::tick_interval_ms(),
                connect_timeout_ms: defaults::connect_timeout_ms(),
                reply_timeout_ms: defaults::reply_timeout_ms(),
                data_timeout_ms: defaults::data_timeout_ms(),
                session_timeout_ms: defaults::session_timeout_ms(),
                starttls: StartTlsPolicy::default(),
                certificates: CertificatePolicy::default(),
            },
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the retry interval in milliseconds.
    #[must_use]
    pub const fn retry_interval_ms(mut self, ms: u64) -> Self {
        self.config.retry_interval_ms = ms;
        self
    }

    /// Sets the retry limit.
    #[must_use]
    pub const fn retry_limit(mut self, limit: u32) -> Self {
        self.config.retry_limit = limit;
        self
    }

    /// Sets the scheduler tick period in milliseconds.
    #[must_use]
    pub const fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms;
        self
    }

    /// Sets the connect timeout in milliseconds.
    #[must_use]
    pub const fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Sets the per-reply timeout in milliseconds.
    #[must_use]
    pub const fn reply_timeout_ms(mut self, ms: u64) -> Self {
        self.config.reply_timeout_ms = ms;
        self
    }

    /// Sets the end-of-data timeout in milliseconds.
    #[must_use]
    pub const fn data_timeout_ms(mut self, ms: u64) -> Self {
        self.config.data_timeout_ms = ms;
        self
    }

    /// Sets the session timeout in milliseconds.
    #[must_use]
    pub const fn session_timeout_ms(mut self, ms: u64) -> Self {
        self.config.session_timeout_ms = ms;
        self
    }

    /// Sets the STARTTLS policy.
    #[must_use]
    pub const fn starttls(mut self, policy: StartTlsPolicy) -> Self {
        self.config.starttls = policy;
        self
    }

    /// Sets the certificate policy.
    #[must_use]
    pub const fn certificates(mut self, policy: CertificatePolicy) -> Self {
        self.config.certificates = policy;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> MailerConfig {
        self.config
    }
}

mod defaults {
    pub const fn port() -> u16 {
        25
    }

    pub const fn retry_interval_ms() -> u64 {
        240_000 // 4 minutes
    }

    pub const fn retry_limit() -> u32 {
        4
    }

    pub const fn tick_interval_ms() -> u64 {
        5_000
    }

    pub const fn connect_timeout_ms() -> u64 {
        3_000
    }

    pub const fn reply_timeout_ms() -> u64 {
        3_000
    }

    pub const fn data_timeout_ms() -> u64 {
        5_000
    }

    pub const fn session_timeout_ms() -> u64 {
        60_000
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
    fn test_defaults() {
        let config = MailerConfig::new("relay.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.retry_interval_ms, 240000);
        assert_eq!(config.retry_limit, 4);
        assert_eq!(config.tick_interval_ms, 5000);
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.reply_timeout_ms, 3000);
        assert_eq!(config.data_timeout_ms, 5000);
        assert_eq!(config.certificates, CertificatePolicy::AcceptAny);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = MailerConfig::from_json(
            r#"{ "hostname": "relay.example.com", "retry_limit": 6, "starttls": "disabled" }"#,
        )
        .unwrap();
        assert_eq!(config.hostname, "relay.example.com");
        assert_eq!(config.retry_limit, 6);
        assert_eq!(config.starttls, StartTlsPolicy::Disabled);
        assert_eq!(config.tick_interval_ms, 5000);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            MailerConfig::from_json("{ not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_hostname() {
        assert!(MailerConfig::default().validate().is_err());
        assert!(MailerConfig::new("has space").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = MailerConfig::builder("relay.example.com")
            .retry_limit(0)
            .build();
        assert!(config.validate().is_err());

        let config = MailerConfig::builder("relay.example.com")
            .tick_interval_ms(0)
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tick_interval_ms"));
    }

    #[test]
    fn test_session_config() {
        let session = MailerConfig::builder("relay.example.com")
            .port(2525)
            .data_timeout_ms(9000)
            .build()
            .session_config();
        assert_eq!(session.hostname, "relay.example.com");
        assert_eq!(session.port, 2525);
        assert_eq!(session.data_timeout, Duration::from_millis(9000));
    }
}
