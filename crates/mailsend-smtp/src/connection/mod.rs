//! Connection management and the delivery state machine.

mod client;
mod session;
mod transport;

pub use client::{DeliveryOptions, SmtpClient};
pub use session::{
    DeliveryReport, Exchange, Handshake, SessionState, SmtpSession, Step, Transition, Warning,
};
pub use transport::{Transport, resolve};

use std::time::Duration;

/// Deadlines applied to every network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for name resolution and for each connection attempt.
    pub connect: Duration,
    /// Limit for each send and for each reply.
    pub io: Duration,
}

impl Timeouts {
    /// Default connect timeout.
    pub const DEFAULT_CONNECT: Duration = Duration::from_secs(30);
    /// Default per-operation I/O timeout.
    pub const DEFAULT_IO: Duration = Duration::from_secs(60);

    /// Creates timeouts from explicit durations.
    #[must_use]
    pub const fn new(connect: Duration, io: Duration) -> Self {
        Self { connect, io }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONNECT, Self::DEFAULT_IO)
    }
}
