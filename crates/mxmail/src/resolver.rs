//! Mail exchanger resolution.
//!
//! One MX query per attempt, no cache. The exchange of the first record, in
//! the order the answer lists them, is used as is; preferences are not
//! sorted. Any failure falls back to the domain itself, so resolution never
//! fails.

use std::future::Future;

use hickory_resolver::{TokioResolver, name_server::TokioConnectionProvider};
use tracing::{debug, warn};

use crate::{Error, Result};

/// One MX answer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    /// MX preference (lower is preferred).
    pub preference: u16,
    /// Exchange host name.
    pub exchange: String,
}

impl MxRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Source of MX answers.
pub trait MxLookup: Send + Sync {
    /// Queries the MX records of `domain`.
    ///
    /// An empty vector means the domain has no MX records.
    fn lookup_mx(&self, domain: &str) -> impl Future<Output = Result<Vec<MxRecord>>> + Send;
}

/// MX lookups through `hickory-resolver`.
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    /// Creates a lookup using the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dns`] if the system configuration cannot be read.
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| Error::Dns(e.to_string()))?
            .build();
        Ok(Self { resolver })
    }
}

impl MxLookup for HickoryLookup {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.preference(), mx.exchange().to_utf8()))
                .collect()),
            Err(err) if err.is_no_records_found() => Ok(Vec::new()),
            Err(err) => Err(Error::Dns(err.to_string())),
        }
    }
}

/// Resolves a recipient domain to the host to connect to.
#[derive(Debug, Clone)]
pub struct MxResolver<L> {
    lookup: L,
}

impl<L: MxLookup> MxResolver<L> {
    /// Wraps an MX source.
    pub const fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Returns the first MX exchange of `domain`, or `domain` itself if the
    /// query fails, has no records, or names an empty exchange.
    pub async fn resolve(&self, domain: &str) -> String {
        match self.lookup.lookup_mx(domain).await {
            Ok(records) => match records.first() {
                Some(record) => {
                    let host = record.exchange.trim_end_matches('.');
                    if host.is_empty() {
                        debug!(domain, "null MX exchange, using domain");
                        domain.to_string()
                    } else {
                        debug!(domain, host, preference = record.preference, "resolved MX");
                        host.to_string()
                    }
                }
                None => {
                    debug!(domain, "no MX records, using domain");
                    domain.to_string()
                }
            },
            Err(err) => {
                warn!(domain, error = %err, "MX lookup failed, using domain");
                domain.to_string()
            }
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

    struct Fixed(Result<Vec<MxRecord>>);

    impl MxLookup for Fixed {
        async fn lookup_mx(&self, _domain: &str) -> Result<Vec<MxRecord>> {
            match &self.0 {
                Ok(records) => Ok(records.clone()),
                Err(e) => Err(Error::Dns(e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_first_record_wins_unsorted() {
        let resolver = MxResolver::new(Fixed(Ok(vec![
            MxRecord::new(20, "mx2.y.com."),
            MxRecord::new(10, "mx1.y.com."),
        ])));
        assert_eq!(resolver.resolve("y.com").await, "mx2.y.com");
    }

    #[tokio::test]
    async fn test_no_records_falls_back() {
        let resolver = MxResolver::new(Fixed(Ok(Vec::new())));
        assert_eq!(resolver.resolve("y.com").await, "y.com");
    }

    #[tokio::test]
    async fn test_failure_falls_back() {
        let resolver = MxResolver::new(Fixed(Err(Error::Dns("SERVFAIL".into()))));
        assert_eq!(resolver.resolve("y.com").await, "y.com");
    }

    #[tokio::test]
    async fn test_null_mx_falls_back() {
        let resolver = MxResolver::new(Fixed(Ok(vec![MxRecord::new(0, ".")])));
        assert_eq!(resolver.resolve("y.com").await, "y.com");
    }
}
