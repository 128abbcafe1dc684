//! Error types for SMTP delivery.

use std::fmt;
use std::io;
use std::time::Duration;

use crate::connection::Step;
use crate::types::ReplyCode;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an envelope address could not be taken from a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCause {
    /// The header prefix does not occur anywhere in the message.
    HeaderNotFound,
    /// The header line was found but carries no `@`.
    AddressNotFound,
}

impl fmt::Display for MissingCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderNotFound => f.write_str("header not found"),
            Self::AddressNotFound => f.write_str("no address on header line"),
        }
    }
}

/// Delivery error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Envelope address could not be extracted from the message.
    #[error("{header} address missing: {cause}")]
    AddressMissing {
        /// Header prefix that was searched for (e.g. `From:`).
        header: String,
        /// What went wrong.
        cause: MissingCause,
    },

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Resolution or connection establishment failed.
    #[error("Cannot connect to {host}:{port}: {message}")]
    Connect {
        /// Relay host name.
        host: String,
        /// Relay port.
        port: u16,
        /// Message from the underlying resolver or socket.
        message: String,
    },

    /// Server reply did not carry the expected code.
    #[error("{step} rejected (expected {expected}): {reply}")]
    Protocol {
        /// Dialogue step that was rejected.
        step: Step,
        /// Code the step expected.
        expected: ReplyCode,
        /// Code the server actually sent.
        code: ReplyCode,
        /// Raw server reply text.
        reply: String,
    },

    /// Reply could not be framed or its code could not be read.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Server closed the connection before a full reply arrived.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// A network operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that stalled.
        operation: &'static str,
        /// Deadline that was exceeded.
        after: Duration,
    },

    /// Delivery was cancelled through its cancellation token.
    #[error("Delivery cancelled")]
    Cancelled,
}

impl Error {
    /// Creates an address-missing error for the given header.
    #[must_use]
    pub fn address_missing(header: impl Into<String>, cause: MissingCause) -> Self {
        Self::AddressMissing {
            header: header.into(),
            cause,
        }
    }

    /// Returns true if the envelope could not be extracted.
    #[must_use]
    pub const fn is_address_missing(&self) -> bool {
        matches!(self, Self::AddressMissing { .. })
    }

    /// Returns true if the server rejected a step with a 5xx reply.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if code.is_permanent())
    }

    /// Returns true if the server rejected a step with a 4xx reply.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Protocol { code, .. } if code.is_transient())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rejection(code: u16) -> Error {
        Error::Protocol {
            step: Step::RcptTo,
            expected: ReplyCode::OK,
            code: ReplyCode::new(code),
            reply: format!("{code} nope"),
        }
    }

    #[test]
    fn permanent_and_transient() {
        assert!(rejection(550).is_permanent());
        assert!(!rejection(550).is_transient());
        assert!(rejection(451).is_transient());
        assert!(!Error::Cancelled.is_permanent());
    }

    #[test]
    fn protocol_display_carries_server_text() {
        let text = rejection(550).to_string();
        assert!(text.contains("RCPT TO"));
        assert!(text.contains("550 nope"));
    }

    #[test]
    fn address_missing_display() {
        let err = Error::address_missing("From:", MissingCause::AddressNotFound);
        assert!(err.is_address_missing());
        assert_eq!(
            err.to_string(),
            "From: address missing: no address on header line"
        );
    }
}
