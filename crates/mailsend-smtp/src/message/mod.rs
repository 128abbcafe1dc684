//! Message parsing: envelope extraction and dot-stuffing.
//!
//! The envelope is read straight out of the message text. The first
//! textual occurrence of a header prefix wins, wherever it sits, so a
//! `From:` quoted in the body ahead of the real header, or the `To:` inside
//! `Reply-To:`, is picked up instead of the intended line.

use bytes::{Bytes, BytesMut};

use crate::error::{Error, MissingCause, Result};
use crate::types::Address;

/// Header prefix carrying the envelope sender.
pub const FROM_HEADER: &str = "From:";

/// Header prefix carrying the envelope recipient.
pub const TO_HEADER: &str = "To:";

/// End-of-data marker appended after the message body.
pub const END_OF_DATA: &[u8] = b"\r\n.\r\n";

/// SMTP-level sender and recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    from: Address,
    to: Address,
}

impl Envelope {
    /// Creates an envelope from a sender and a recipient.
    #[must_use]
    pub const fn new(from: Address, to: Address) -> Self {
        Self { from, to }
    }

    /// Extracts the envelope from the `From:` and `To:` header lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressMissing`] if either address cannot be found.
    pub fn extract(message: &str) -> Result<Self> {
        let from = extract_address(message, FROM_HEADER)?;
        let to = extract_address(message, TO_HEADER)?;
        Ok(Self::new(from, to))
    }

    /// Envelope sender.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.from
    }

    /// Envelope recipient.
    #[must_use]
    pub const fn recipient(&self) -> &Address {
        &self.to
    }
}

/// Message file contents ready for the DATA step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    raw: String,
    envelope: Envelope,
    stuffed_body: String,
}

impl Message {
    /// Parses raw RFC-822 text into an envelope and a dot-stuffed body.
    ///
    /// The stuffed body uses CRLF line endings whatever the input used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AddressMissing`] if the sender or recipient cannot
    /// be extracted.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let envelope = Envelope::extract(&raw)?;
        let stuffed_body = stuff_dots(raw.lines()).join("\r\n");

        Ok(Self {
            raw,
            envelope,
            stuffed_body,
        })
    }

    /// Message text exactly as read.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Extracted envelope.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Dot-stuffed message text, without the end-of-data marker.
    #[must_use]
    pub fn stuffed_body(&self) -> &str {
        &self.stuffed_body
    }
}

/// Extracts a bare address from the first line containing `header`.
///
/// The address is the run of characters around the first `@` on that
/// line, bounded on the left by a space, `<`, CR, LF or tab (or the start
/// of the line) and on the right by a space, `>`, CR, LF or tab (or the
/// end of the line). Any whitespace left inside the slice is removed.
///
/// # Errors
///
/// Returns [`Error::AddressMissing`] with [`MissingCause::HeaderNotFound`]
/// if `header` does not occur, or [`MissingCause::AddressNotFound`] if the
/// line has no `@`.
pub fn extract_address(message: &str, header: &str) -> Result<Address> {
    let start = message
        .find(header)
        .ok_or_else(|| Error::address_missing(header, MissingCause::HeaderNotFound))?;

    let rest = &message[start..];
    let line = rest.find('\n').map_or(rest, |end| &rest[..=end]);

    let at = line
        .find('@')
        .ok_or_else(|| Error::address_missing(header, MissingCause::AddressNotFound))?;

    let begin = line[..at].rfind(is_left_boundary).map_or(0, |i| i + 1);
    let end = line[at..]
        .find(is_right_boundary)
        .map_or(line.len(), |i| at + i);

    let token: String = line[begin..end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    Address::new(token)
}

const fn is_left_boundary(c: char) -> bool {
    matches!(c, ' ' | '<' | '\r' | '\n' | '\t')
}

const fn is_right_boundary(c: char) -> bool {
    matches!(c, ' ' | '>' | '\r' | '\n' | '\t')
}

/// Applies the SMTP transparency rule line by line.
///
/// A line consisting of a single `.` becomes `..`; every other line is
/// passed through untouched and the order is kept.
pub fn stuff_dots<'a, I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(|line| {
            if line == "." {
                "..".to_owned()
            } else {
                line.to_owned()
            }
        })
        .collect()
}

/// Frames a stuffed body for the wire by appending the end-of-data marker.
#[must_use]
pub fn frame_payload(stuffed_body: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(stuffed_body.len() + END_OF_DATA.len());
    buf.extend_from_slice(stuffed_body.as_bytes());
    buf.extend_from_slice(END_OF_DATA);
    buf.freeze()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn missing_cause(result: Result<Address>) -> MissingCause {
        match result {
            Err(Error::AddressMissing { cause, .. }) => cause,
            other => panic!("expected AddressMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_angle_bracketed() {
        let msg = "From: Jane Doe <jane@example.com>\nTo: bob@example.org\n";
        let addr = extract_address(msg, FROM_HEADER).unwrap();
        assert_eq!(addr.as_str(), "jane@example.com");
    }

    #[test]
    fn test_extract_bare() {
        let msg = "From: a@x.com\nTo: b@y.com\n";
        assert_eq!(extract_address(msg, TO_HEADER).unwrap().as_str(), "b@y.com");
    }

    #[test]
    fn test_extract_crlf_and_tab() {
        let msg = "From:\tops@example.net\r\nTo: x@y.z\r\n";
        assert_eq!(
            extract_address(msg, FROM_HEADER).unwrap().as_str(),
            "ops@example.net"
        );
    }

    #[test]
    fn test_extract_last_line_without_newline() {
        let msg = "Subject: hi\nTo: <last@example.com>";
        assert_eq!(
            extract_address(msg, TO_HEADER).unwrap().as_str(),
            "last@example.com"
        );
    }

    #[test]
    fn test_extract_no_at_on_header_line() {
        let msg = "From: Jane Doe\nTo: b@y.com\n";
        assert_eq!(
            missing_cause(extract_address(msg, FROM_HEADER)),
            MissingCause::AddressNotFound
        );
    }

    #[test]
    fn test_extract_missing_header() {
        let msg = "To: b@y.com\nSubject: nothing\n";
        assert_eq!(
            missing_cause(extract_address(msg, FROM_HEADER)),
            MissingCause::HeaderNotFound
        );
    }

    #[test]
    fn test_first_textual_occurrence_wins() {
        // `To:` inside `Reply-To:` is found before the real header.
        let msg = "Reply-To: list@example.com\nFrom: a@x.com\nTo: b@y.com\n";
        assert_eq!(
            extract_address(msg, TO_HEADER).unwrap().as_str(),
            "list@example.com"
        );
    }

    #[test]
    fn test_envelope_extract() {
        let envelope = Envelope::extract("From: a@x.com\nTo: b@y.com\n").unwrap();
        assert_eq!(envelope.sender().as_str(), "a@x.com");
        assert_eq!(envelope.recipient().as_str(), "b@y.com");
    }

    #[test]
    fn test_stuff_lone_dot() {
        let stuffed = stuff_dots(["one", ".", "two"]);
        assert_eq!(stuffed, vec!["one", "..", "two"]);
    }

    #[test]
    fn test_stuff_leaves_other_dot_lines() {
        let stuffed = stuff_dots([".hidden", "..", ". ", "a."]);
        assert_eq!(stuffed, vec![".hidden", "..", ". ", "a."]);
    }

    #[test]
    fn test_second_pass_does_not_restuff() {
        // After one pass the lone dot reads `..`, which no longer matches,
        // so a second pass does not turn it into `...`.
        let once = stuff_dots(["."]);
        let twice = stuff_dots(once.iter().map(String::as_str));
        assert_eq!(once, vec![".."]);
        assert_eq!(twice, vec![".."]);
        assert_ne!(twice, vec!["..."]);
    }

    #[test]
    fn test_message_parse_scenario() {
        let message = Message::parse("From: a@x.com\nTo: b@y.com\nSubject: hi\n\n.\nbody\n").unwrap();
        assert_eq!(message.envelope().sender().as_str(), "a@x.com");
        assert_eq!(message.envelope().recipient().as_str(), "b@y.com");
        assert_eq!(
            message.stuffed_body(),
            "From: a@x.com\r\nTo: b@y.com\r\nSubject: hi\r\n\r\n..\r\nbody"
        );
    }

    #[test]
    fn test_message_parse_crlf_lone_dot() {
        let message = Message::parse("From: a@x.com\r\nTo: b@y.com\r\n\r\n.\r\n").unwrap();
        assert!(message.stuffed_body().ends_with("\r\n.."));
    }

    #[test]
    fn test_message_parse_missing_to() {
        let err = Message::parse("From: a@x.com\nSubject: hi\n").unwrap_err();
        assert!(matches!(err, Error::AddressMissing { ref header, .. } if header == TO_HEADER));
    }

    #[test]
    fn test_frame_payload() {
        assert_eq!(&frame_payload("hi")[..], b"hi\r\n.\r\n");
        assert_eq!(&frame_payload("")[..], b"\r\n.\r\n");
    }

    proptest! {
        #[test]
        fn stuffing_without_lone_dots_is_identity(
            lines in proptest::collection::vec(
                "[a-z. ]{0,8}".prop_filter("lone dot", |s| s != "."),
                0..16,
            )
        ) {
            let stuffed = stuff_dots(lines.iter().map(String::as_str));
            prop_assert_eq!(stuffed, lines);
        }

        #[test]
        fn stuffing_only_rewrites_lone_dots(
            lines in proptest::collection::vec("[a-z.]{0,3}", 0..16)
        ) {
            let stuffed = stuff_dots(lines.iter().map(String::as_str));
            prop_assert_eq!(stuffed.len(), lines.len());
            for (before, after) in lines.iter().zip(&stuffed) {
                if before == "." {
                    prop_assert_eq!(after.as_str(), "..");
                } else {
                    prop_assert_eq!(after, before);
                }
            }
        }
    }
}
