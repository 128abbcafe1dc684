//! # mailsend-smtp
//!
//! Delivers one RFC-822 message to one recipient through an SMTP relay,
//! speaking only the commands a plain relay needs.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsend_smtp::{DeliveryOptions, Message, SmtpClient};
//!
//! #[tokio::main]
//! async fn main() -> mailsend_smtp::Result<()> {
//!     let message = Message::parse("From: a@x.com\nTo: b@y.com\n\nHello\n")?;
//!     let envelope = message.envelope();
//!
//!     let client = SmtpClient::new(DeliveryOptions::default());
//!     let report = client
//!         .deliver(
//!             "relay.example.com",
//!             25,
//!             envelope.sender(),
//!             envelope.recipient(),
//!             message.stuffed_body(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", report.final_reply());
//!     Ok(())
//! }
//! ```
//!
//! ## Dialogue
//!
//! ```text
//! banner 220 → EHLO 250 → MAIL FROM 250 → RCPT TO 250 → DATA 354 → body 250 → QUIT
//! ```
//!
//! The first unexpected reply aborts the delivery and the connection is
//! closed. Every network operation has a deadline and can be cancelled.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Transport, state machine and client
//! - [`message`]: Envelope extraction and dot-stuffing
//! - [`parser`]: Reply parser
//! - [`types`]: Addresses and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod message;
pub mod parser;
pub mod types;

pub use connection::{
    DeliveryOptions, DeliveryReport, Handshake, SessionState, SmtpClient, SmtpSession, Step,
    Timeouts, Transport, Warning,
};
pub use error::{Error, MissingCause, Result};
pub use message::{Envelope, Message, extract_address, stuff_dots};
pub use types::{Address, Reply, ReplyCode};

/// Re-exported so callers can build cancellation tokens without another import.
pub use tokio_util::sync::CancellationToken;
