//! Single-shot delivery client.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{DeliveryReport, Handshake, SmtpSession, Timeouts, Transport};
use crate::error::Result;
use crate::message::Envelope;
use crate::types::Address;

/// Knobs for a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Name announced with EHLO. Defaults to the relay host name.
    pub hello: Option<String>,
    /// How the greeting is paired with EHLO.
    pub handshake: Handshake,
    /// Network deadlines.
    pub timeouts: Timeouts,
}

/// Delivers one message to one recipient per call.
///
/// Each call opens its own connection and closes it before returning;
/// nothing is pooled or retried.
#[derive(Debug, Clone, Default)]
pub struct SmtpClient {
    options: DeliveryOptions,
    cancel: CancellationToken,
}

impl SmtpClient {
    /// Creates a client with the given options.
    #[must_use]
    pub fn new(options: DeliveryOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to cancel in-flight deliveries.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the token that cancels this client's deliveries.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns the delivery options.
    #[must_use]
    pub const fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    /// Connects to `host:port` and delivers `body` from `from` to `to`.
    ///
    /// `body` must already be dot-stuffed.
    ///
    /// # Errors
    ///
    /// Returns a connect, protocol, timeout or cancellation error. The
    /// connection is closed on every path.
    pub async fn deliver(
        &self,
        host: &str,
        port: u16,
        from: &Address,
        to: &Address,
        body: &str,
    ) -> Result<DeliveryReport> {
        info!(host, port, "connecting to relay");
        let transport =
            Transport::connect(host, port, self.options.timeouts, self.cancel.clone()).await?;
        self.run(transport, host, from, to, body).await
    }

    /// Delivers over an already established stream.
    ///
    /// `host` is only used as the default EHLO name.
    ///
    /// # Errors
    ///
    /// Same as [`SmtpClient::deliver`], minus connection errors.
    pub async fn deliver_with_stream<S>(
        &self,
        stream: S,
        host: &str,
        from: &Address,
        to: &Address,
        body: &str,
    ) -> Result<DeliveryReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let transport = Transport::new(stream, self.options.timeouts, self.cancel.clone());
        self.run(transport, host, from, to, body).await
    }

    async fn run<S>(
        &self,
        transport: Transport<S>,
        host: &str,
        from: &Address,
        to: &Address,
        body: &str,
    ) -> Result<DeliveryReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let hello = self.options.hello.as_deref().unwrap_or(host);
        let envelope = Envelope::new(from.clone(), to.clone());

        SmtpSession::new(transport)
            .run(self.options.handshake, hello, &envelope, body)
            .await
    }
}
