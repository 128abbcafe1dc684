//! Delivery services.
//!
//! Turns a message file on disk into one SMTP delivery using the relay
//! configuration.

mod delivery;

pub use delivery::{MailService, read_message};
