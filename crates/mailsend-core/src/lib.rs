//! # mailsend-core
//!
//! Everything around the SMTP dialogue that the `mailsend` tool needs:
//! - Relay configuration (`email.conf`) with a built-in fallback relay
//! - Message file loading
//! - Delivery orchestration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod service;

pub use config::{CONFIG_FILE, Config, ConfigBuilder, DEFAULT_MAILHOST, DEFAULT_PORT};
pub use error::{Error, Result};
pub use service::{MailService, read_message};
