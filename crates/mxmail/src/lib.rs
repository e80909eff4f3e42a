//! # mxmail
//!
//! Direct-to-MX outbound mail delivery: messages are queued in memory and a
//! scheduler delivers them straight to the recipient domain's mail
//! exchanger, retrying failed attempts at a fixed interval up to a limit.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mxmail::{Mailer, MailerConfig};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> mxmail::Result<()> {
//!     let mailer = Mailer::new(MailerConfig::new("relay.example.com"))?;
//!     mailer.send_mail("alice@example.com", "bob@example.org", Some("Hi"), Some("Hello"));
//!
//!     let (_stop, shutdown) = watch::channel(false);
//!     mailer.run(shutdown).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Mailer configuration
//! - [`event`]: Delivery outcome notifications
//! - [`mailer`]: The scheduler
//! - [`queue`]: In-memory queue and retry policy
//! - [`resolver`]: Mail exchanger resolution

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod event;
pub mod mailer;
pub mod queue;
pub mod resolver;

pub use config::{MailerConfig, MailerConfigBuilder};
pub use error::{Error, Result};
pub use event::DeliveryEvent;
pub use mailer::Mailer;
pub use queue::{DeliveryQueue, EntryId, QueueEntry, RetryPolicy};
pub use resolver::{HickoryLookup, MxLookup, MxRecord, MxResolver};

pub use mxmail_smtp::{CertificatePolicy, StartTlsPolicy};
