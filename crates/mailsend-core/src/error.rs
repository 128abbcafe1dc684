//! Error types for the core library.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur before or during a delivery.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file exists but lacks a required key.
    #[error("Config file {} was corrupted: can not find {key}", .path.display())]
    ConfigCorrupted {
        /// Configuration file.
        path: PathBuf,
        /// Missing key.
        key: &'static str,
    },

    /// Configuration value cannot be used.
    #[error("Config file {} has an invalid {key}: {value:?}", .path.display())]
    ConfigInvalid {
        /// Configuration file.
        path: PathBuf,
        /// Offending key.
        key: &'static str,
        /// Offending value.
        value: String,
    },

    /// Message file cannot be read.
    #[error("Email file {} is not found", .path.display())]
    FileNotFound {
        /// Message file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Sender or recipient header is absent or has no address.
    #[error("{header} field is not specified")]
    AddressMissing {
        /// Header prefix (`From:` or `To:`).
        header: String,
    },

    /// Delivery failed.
    #[error(transparent)]
    Delivery(mailsend_smtp::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<mailsend_smtp::Error> for Error {
    fn from(err: mailsend_smtp::Error) -> Self {
        match err {
            mailsend_smtp::Error::AddressMissing { header, .. } => Self::AddressMissing { header },
            other => Self::Delivery(other),
        }
    }
}

impl Error {
    /// Returns true if the failure happened on the network, after the
    /// message and configuration were accepted.
    #[must_use]
    pub const fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
