//! Message loading and delivery orchestration.

use std::path::Path;

use mailsend_smtp::{CancellationToken, DeliveryReport, Message, SmtpClient};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Reads the message file at `path`.
///
/// The file is taken as bytes; anything that is not UTF-8 is replaced
/// with U+FFFD rather than rejected.
///
/// # Errors
///
/// Returns [`Error::FileNotFound`] if the file cannot be read.
pub fn read_message(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(path = %path.display(), "message is not valid UTF-8, invalid bytes replaced");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Delivers message files through the configured relay.
#[derive(Debug, Clone)]
pub struct MailService {
    config: Config,
    client: SmtpClient,
}

impl MailService {
    /// Creates a service for the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let client = SmtpClient::new(config.delivery_options());
        Self { config, client }
    }

    /// Uses `token` to cancel deliveries in flight.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(token);
        self
    }

    /// Relay configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Reads a message file and extracts its envelope.
    ///
    /// Nothing touches the network here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileNotFound`] or [`Error::AddressMissing`].
    pub fn prepare(&self, path: impl AsRef<Path>) -> Result<Message> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening message file");

        let raw = read_message(path)?;
        let message = Message::parse(raw)?;
        Ok(message)
    }

    /// Delivers a prepared message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Delivery`] wrapping the connection, protocol,
    /// timeout or cancellation failure.
    pub async fn send(&self, message: &Message) -> Result<DeliveryReport> {
        let envelope = message.envelope();
        let report = self
            .client
            .deliver(
                &self.config.mailhost,
                self.config.port,
                envelope.sender(),
                envelope.recipient(),
                message.stuffed_body(),
            )
            .await?;

        info!(
            mailhost = %self.config.mailhost,
            warnings = report.warnings.len(),
            "delivery complete"
        );
        Ok(report)
    }
}
