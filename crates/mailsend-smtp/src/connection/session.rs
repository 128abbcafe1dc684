//! Delivery state machine.
//!
//! The dialogue is a fixed table of transitions. Each transition sends at
//! most one command, waits for exactly one reply and checks its code; the
//! first mismatch aborts the session. QUIT is sent after a successful
//! delivery and its reply is never checked.
//!
//! ```text
//! Banner:  Start ─220─▶ Connected ─EHLO/250─▶ Greeted ─MAIL/250─▶ MailSet
//!          ─RCPT/250─▶ RcptSet ─DATA/354─▶ DataReady ─body/250─▶ Delivered
//!
//! Ehlo:    Start ─EHLO/220─▶ Greeted ─MAIL/250─▶ ... ─body/250─▶ Delivered
//! ```
//!
//! Both paths end in `Closed`, whatever the outcome.

use std::fmt;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::Transport;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::message::{Envelope, frame_payload};
use crate::types::{Reply, ReplyCode};

/// Where a session stands in the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, nothing exchanged yet.
    Start,
    /// Server banner accepted.
    Connected,
    /// EHLO accepted.
    Greeted,
    /// Sender accepted.
    MailSet,
    /// Recipient accepted.
    RcptSet,
    /// Server is ready for message data.
    DataReady,
    /// Message accepted for delivery.
    Delivered,
    /// Transport released.
    Closed,
}

/// One exchange of the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Server banner, read without sending anything.
    Banner,
    /// `EHLO <host>`
    Ehlo,
    /// `MAIL FROM: <from>`
    MailFrom,
    /// `RCPT TO: <to>`
    RcptTo,
    /// `DATA`
    Data,
    /// Dot-stuffed body followed by the end-of-data marker.
    Payload,
    /// `QUIT`
    Quit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Banner => "greeting",
            Self::Ehlo => "EHLO",
            Self::MailFrom => "MAIL FROM",
            Self::RcptTo => "RCPT TO",
            Self::Data => "DATA",
            Self::Payload => "message body",
            Self::Quit => "QUIT",
        })
    }
}

/// A row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State the row applies to.
    pub from: SessionState,
    /// Exchange performed.
    pub step: Step,
    /// Reply code required to advance.
    pub expect: ReplyCode,
    /// State reached when the reply matches.
    pub to: SessionState,
}

impl Transition {
    const fn new(from: SessionState, step: Step, expect: ReplyCode, to: SessionState) -> Self {
        Self {
            from,
            step,
            expect,
            to,
        }
    }
}

#[rustfmt::skip]
const BANNER_FIRST: [Transition; 6] = [
    Transition::new(SessionState::Start, Step::Banner, ReplyCode::SERVICE_READY, SessionState::Connected),
    Transition::new(SessionState::Connected, Step::Ehlo, ReplyCode::OK, SessionState::Greeted),
    Transition::new(SessionState::Greeted, Step::MailFrom, ReplyCode::OK, SessionState::MailSet),
    Transition::new(SessionState::MailSet, Step::RcptTo, ReplyCode::OK, SessionState::RcptSet),
    Transition::new(SessionState::RcptSet, Step::Data, ReplyCode::START_DATA, SessionState::DataReady),
    Transition::new(SessionState::DataReady, Step::Payload, ReplyCode::OK, SessionState::Delivered),
];

#[rustfmt::skip]
const EHLO_FIRST: [Transition; 5] = [
    Transition::new(SessionState::Start, Step::Ehlo, ReplyCode::SERVICE_READY, SessionState::Greeted),
    Transition::new(SessionState::Greeted, Step::MailFrom, ReplyCode::OK, SessionState::MailSet),
    Transition::new(SessionState::MailSet, Step::RcptTo, ReplyCode::OK, SessionState::RcptSet),
    Transition::new(SessionState::RcptSet, Step::Data, ReplyCode::START_DATA, SessionState::DataReady),
    Transition::new(SessionState::DataReady, Step::Payload, ReplyCode::OK, SessionState::Delivered),
];

/// How the opening of the dialogue is paired with replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handshake {
    /// Read the 220 banner first, then expect 250 for EHLO.
    #[default]
    Banner,
    /// Send EHLO straight away and take the 220 banner as its reply.
    Ehlo,
}

impl Handshake {
    /// Returns the transition table for this handshake.
    #[must_use]
    pub const fn transitions(self) -> &'static [Transition] {
        match self {
            Self::Banner => &BANNER_FIRST,
            Self::Ehlo => &EHLO_FIRST,
        }
    }

    /// Parses a handshake name (`banner` or `ehlo`, any case).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("banner") {
            Some(Self::Banner)
        } else if name.eq_ignore_ascii_case("ehlo") {
            Some(Self::Ehlo)
        } else {
            None
        }
    }
}

/// A request and the reply it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Step performed.
    pub step: Step,
    /// Reply received.
    pub reply: Reply,
}

/// Non-fatal conditions met during a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The peer stopped accepting bytes before a request was fully written.
    PartialSend {
        /// Step whose request was cut short.
        step: Step,
        /// Bytes accepted.
        written: usize,
        /// Bytes in the request.
        expected: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartialSend {
                step,
                written,
                expected,
            } => write!(
                f,
                "{step} was not fully transmitted ({written} of {expected} bytes)"
            ),
        }
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Every validated exchange, in order. QUIT is not included.
    pub transcript: Vec<Exchange>,
    /// Warnings raised along the way.
    pub warnings: Vec<Warning>,
}

impl DeliveryReport {
    /// Reply that accepted the message.
    #[must_use]
    pub fn final_reply(&self) -> Option<&Reply> {
        self.transcript.last().map(|exchange| &exchange.reply)
    }
}

/// One delivery over one transport. Not reusable.
#[derive(Debug)]
pub struct SmtpSession<S> {
    transport: Transport<S>,
    state: SessionState,
    report: DeliveryReport,
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a session over a freshly connected transport.
    pub fn new(transport: Transport<S>) -> Self {
        Self {
            transport,
            state: SessionState::Start,
            report: DeliveryReport::default(),
        }
    }

    /// Runs the whole dialogue and releases the transport.
    ///
    /// `hello` is the name announced with EHLO and `body` must already be
    /// dot-stuffed; the end-of-data marker is appended here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on the first unexpected reply, or the
    /// transport error that interrupted the dialogue. The transport is shut
    /// down before returning in every case.
    pub async fn run(
        mut self,
        handshake: Handshake,
        hello: &str,
        envelope: &Envelope,
        body: &str,
    ) -> Result<DeliveryReport> {
        let outcome = self.converse(handshake, hello, envelope, body).await;

        if outcome.is_ok() {
            self.quit().await;
        }
        self.close().await;

        outcome.map(|()| self.report)
    }

    async fn converse(
        &mut self,
        handshake: Handshake,
        hello: &str,
        envelope: &Envelope,
        body: &str,
    ) -> Result<()> {
        for transition in handshake.transitions() {
            debug_assert_eq!(self.state, transition.from);

            let request = request_for(transition.step, hello, envelope, body);
            let reply = self.exchange(transition.step, request).await?;

            if !reply.is(transition.expect) {
                warn!(step = %transition.step, reply = %reply, "server rejected step");
                return Err(Error::Protocol {
                    step: transition.step,
                    expected: transition.expect,
                    code: reply.code,
                    reply: reply.text(),
                });
            }

            self.state = transition.to;
            self.report.transcript.push(Exchange {
                step: transition.step,
                reply,
            });
        }

        info!(
            from = %envelope.sender(),
            to = %envelope.recipient(),
            "message accepted by relay"
        );
        Ok(())
    }

    async fn exchange(&mut self, step: Step, request: Option<Bytes>) -> Result<Reply> {
        if let Some(bytes) = request {
            debug!(%step, bytes = bytes.len(), "sending");
            let written = self.transport.send(&bytes).await?;
            if written < bytes.len() {
                let warning = Warning::PartialSend {
                    step,
                    written,
                    expected: bytes.len(),
                };
                warn!("{warning}");
                self.report.warnings.push(warning);
            }
        }

        let reply = self.transport.receive().await?;
        debug!(%step, code = %reply.code, "reply received");
        Ok(reply)
    }

    /// Best-effort QUIT; the outcome is only logged.
    async fn quit(&mut self) {
        let request = Some(Bytes::from(Command::Quit.serialize()));
        match self.exchange(Step::Quit, request).await {
            Ok(reply) => debug!(code = %reply.code, "QUIT answered"),
            Err(e) => warn!(error = %e, "QUIT failed"),
        }
    }

    async fn close(&mut self) {
        self.transport.close().await;
        debug!(reached = ?self.state, "session closed");
        self.state = SessionState::Closed;
    }
}

fn request_for(step: Step, hello: &str, envelope: &Envelope, body: &str) -> Option<Bytes> {
    let command = match step {
        Step::Banner => return None,
        Step::Payload => return Some(frame_payload(body)),
        Step::Ehlo => Command::Ehlo {
            hostname: hello.to_string(),
        },
        Step::MailFrom => Command::MailFrom {
            from: envelope.sender().clone(),
        },
        Step::RcptTo => Command::RcptTo {
            to: envelope.recipient().clone(),
        },
        Step::Data => Command::Data,
        Step::Quit => Command::Quit,
    };
    Some(Bytes::from(command.serialize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connection::Timeouts;
    use crate::types::Address;
    use tokio_test::io::Builder;
    use tokio_util::sync::CancellationToken;

    fn envelope() -> Envelope {
        Envelope::new(
            Address::new("a@x.com").unwrap(),
            Address::new("b@y.com").unwrap(),
        )
    }

    fn session(mock: tokio_test::io::Mock) -> SmtpSession<tokio_test::io::Mock> {
        SmtpSession::new(Transport::new(
            mock,
            Timeouts::default(),
            CancellationToken::new(),
        ))
    }

    #[test]
    fn tables_are_chained() {
        for handshake in [Handshake::Banner, Handshake::Ehlo] {
            let table = handshake.transitions();
            assert_eq!(table[0].from, SessionState::Start);
            assert_eq!(table[table.len() - 1].to, SessionState::Delivered);
            for pair in table.windows(2) {
                assert_eq!(pair[0].to, pair[1].from);
            }
        }
    }

    #[test]
    fn ehlo_table_pairs_ehlo_with_banner_code() {
        let first = Handshake::Ehlo.transitions()[0];
        assert_eq!(first.step, Step::Ehlo);
        assert_eq!(first.expect, ReplyCode::SERVICE_READY);
    }

    #[test]
    fn handshake_parse() {
        assert_eq!(Handshake::parse("BANNER"), Some(Handshake::Banner));
        assert_eq!(Handshake::parse("ehlo"), Some(Handshake::Ehlo));
        assert_eq!(Handshake::parse("helo"), None);
    }

    #[tokio::test]
    async fn banner_dialogue_in_order() {
        let mock = Builder::new()
            .read(b"220 relay ESMTP\r\n")
            .write(b"EHLO relay\r\n")
            .read(b"250-relay\r\n250 8BITMIME\r\n")
            .write(b"MAIL FROM: <a@x.com>\r\n")
            .read(b"250 sender ok\r\n")
            .write(b"RCPT TO: <b@y.com>\r\n")
            .read(b"250 recipient ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: hi\r\n\r\n..\r\n.\r\n")
            .read(b"250 queued as 42\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let report = session(mock)
            .run(Handshake::Banner, "relay", &envelope(), "Subject: hi\r\n\r\n..")
            .await
            .unwrap();

        assert_eq!(report.transcript.len(), 6);
        assert_eq!(report.final_reply().unwrap().text(), "250 queued as 42");
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn quit_failure_does_not_fail_delivery() {
        let mock = Builder::new()
            .write(b"EHLO relay\r\n")
            .read(b"220 relay ESMTP\r\n")
            .write(b"MAIL FROM: <a@x.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO: <b@y.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"body\r\n.\r\n")
            .read(b"250 ok\r\n")
            .write(b"QUIT\r\n")
            .build();

        let report = session(mock)
            .run(Handshake::Ehlo, "relay", &envelope(), "body")
            .await
            .unwrap();
        assert_eq!(report.transcript.len(), 5);
    }

    #[tokio::test]
    async fn rejection_stops_before_data() {
        let mock = Builder::new()
            .read(b"220 relay ESMTP\r\n")
            .write(b"EHLO relay\r\n")
            .read(b"250 hello\r\n")
            .write(b"MAIL FROM: <a@x.com>\r\n")
            .read(b"451 try later\r\n")
            .build();

        let err = session(mock)
            .run(Handshake::Banner, "relay", &envelope(), "body")
            .await
            .unwrap_err();

        assert!(err.is_transient());
        match err {
            Error::Protocol { step, reply, .. } => {
                assert_eq!(step, Step::MailFrom);
                assert_eq!(reply, "451 try later");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_banner_aborts() {
        let mock = Builder::new().read(b"554 go away\r\n").build();

        let err = session(mock)
            .run(Handshake::Banner, "relay", &envelope(), "body")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { step: Step::Banner, .. }));
    }

    #[tokio::test]
    async fn closed_connection_mid_dialogue() {
        let mock = Builder::new()
            .read(b"220 relay ESMTP\r\n")
            .write(b"EHLO relay\r\n")
            .build();

        let err = session(mock)
            .run(Handshake::Banner, "relay", &envelope(), "body")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn partial_send_display() {
        let warning = Warning::PartialSend {
            step: Step::Payload,
            written: 10,
            expected: 20,
        };
        assert_eq!(
            warning.to_string(),
            "message body was not fully transmitted (10 of 20 bytes)"
        );
    }
}
