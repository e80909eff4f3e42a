//! Mailbox addresses.

use crate::error::{Error, Result};

/// Mailbox address as used in the SMTP envelope and the `From`/`To` headers.
///
/// Validation accepts `local@domain.tld`: a non-empty local part without `@`,
/// a domain without `@` that ends in a dot followed by an alphabetic top-level
/// label. The domain is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    raw: String,
    domain: String,
}

impl Address {
    /// Parses a mailbox address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address does not have a
    /// `local@domain.tld` shape or contains control characters.
    pub fn parse(addr: impl Into<String>) -> Result<Self> {
        let raw = addr.into();
        let domain = Self::extract_domain(&raw)
            .ok_or_else(|| Error::InvalidAddress(raw.clone()))?
            .to_ascii_lowercase();
        Ok(Self { raw, domain })
    }

    /// Returns the address exactly as it was given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the lowercased domain part.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    fn extract_domain(addr: &str) -> Option<&str> {
        // CR/LF in an envelope address would split the SMTP command line.
        if addr.chars().any(char::is_control) {
            return None;
        }

        let (local, domain) = addr.split_once('@')?;
        if local.is_empty() || domain.contains('@') {
            return None;
        }

        let (host, tld) = domain.rsplit_once('.')?;
        if host.is_empty() || tld.is_empty() || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        Some(domain)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
