//! # mxmail-smtp
//!
//! The SMTP client half of a direct-to-MX delivery agent.
//!
//! ## Features
//!
//! - **Line-oriented reply reader**: one physical line is one reply, every
//!   read is bounded by a single deadline
//! - **Session state machine**: greeting, EHLO, MAIL, RCPT, DATA and QUIT in
//!   strict order, any failed check aborts the attempt
//! - **Opportunistic STARTTLS**: the existing connection is upgraded in place
//!   when the peer advertises it
//! - **Pluggable transports**: sessions run over anything implementing
//!   [`Transport`], which keeps the protocol testable without sockets
//!
//! ## Quick Start
//!
//! ```ignore
//! use mxmail_smtp::{Envelope, SessionConfig, TcpConnector, deliver};
//!
//! #[tokio::main]
//! async fn main() -> mxmail_smtp::Result<()> {
//!     let config = SessionConfig::new("relay.example.com");
//!     let envelope = Envelope::new("alice@example.com", "bob@example.org")?;
//!     let message = "Subject: Hi\r\n\r\nHello\r\n";
//!
//!     let report = deliver(&TcpConnector, "mx.example.org", &config, &envelope, message).await?;
//!     println!("delivered, secured: {}", report.secured);
//!     Ok(())
//! }
//! ```
//!
//! ## Session Steps
//!
//! ```text
//! connect ─→ 220 ─→ EHLO ─┬─────────────────────────────────────┬─→ MAIL ─→ RCPT ─→ DATA ─→ body ─→ QUIT
//!                         └─→ STARTTLS ─→ 220 ─→ TLS ─→ EHLO ─→─┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command serialization
//! - [`connection`]: Transports, TLS, the reply reader and the session
//! - [`data`]: DATA payload transparency (dot-stuffing)
//! - [`parser`]: Reply line parser
//! - [`types`]: Replies and session stages

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
pub mod data;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    CertificatePolicy, Connector, Envelope, ReplyReader, Session, SessionConfig,
    SessionConfigBuilder, SessionReport, SmtpStream, StartTlsPolicy, TcpConnector, Transport,
    deliver,
};
pub use error::{Error, Result};
pub use types::{Reply, ReplyCode, Stage};
