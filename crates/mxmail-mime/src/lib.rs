//! # mxmail-mime
//!
//! Message construction for the `mxmail` delivery agent.
//!
//! ## Features
//!
//! - **Mailbox addresses**: lazy validation with lowercase domain extraction
//! - **Ordered headers**: headers render in insertion order
//! - **Plain-text messages**: `From`, `To`, `Subject`, `Date`, `Message-Id` and
//!   the MIME headers for an 8bit UTF-8 body
//!
//! ## Quick Start
//!
//! ```
//! use mxmail_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new("alice@example.com", "bob@example.org")
//!     .subject("Disk usage")
//!     .text("The backup volume is 91% full.")
//!     .build()?;
//!
//! let rendered = message.to_string();
//! assert!(rendered.starts_with("From: alice@example.com\r\n"));
//! # Ok::<(), mxmail_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod error;
mod header;
mod message;
mod message_id;

pub use address::Address;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, MessageBuilder, NO_BODY, NO_SUBJECT};
pub use message_id::{MessageId, random_token};
