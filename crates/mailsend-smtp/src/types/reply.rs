//! SMTP reply types.

/// SMTP reply from server.
///
/// Keeps the raw lines exactly as received (minus line terminators) so the
/// server's own wording can be surfaced when a step is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code taken from the first three characters of the first line.
    pub code: ReplyCode,
    /// Raw reply lines, code prefix included.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if the reply carries exactly the expected code.
    #[must_use]
    pub fn is(&self, expected: ReplyCode) -> bool {
        self.code == expected
    }

    /// Returns the raw reply text, one server line per text line.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns the human-readable part of each line (code and separator removed).
    #[must_use]
    pub fn message_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.get(4..).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

// Codes the delivery dialogue expects or commonly meets
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::START_DATA.is_intermediate());
            assert!(ReplyCode::MAILBOX_BUSY.is_transient());
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
            assert!(ReplyCode::TRANSACTION_FAILED.is_permanent());
        }

        #[test]
        fn display_is_three_digits() {
            assert_eq!(ReplyCode::OK.to_string(), "250");
            assert_eq!(ReplyCode::new(7).to_string(), "007");
        }
    }

    mod reply_tests {
        use super::*;

        fn greeting() -> Reply {
            Reply::new(
                ReplyCode::SERVICE_READY,
                vec![
                    "220-relay.example.com ESMTP".to_string(),
                    "220 ready when you are".to_string(),
                ],
            )
        }

        #[test]
        fn text_keeps_raw_lines() {
            assert_eq!(
                greeting().text(),
                "220-relay.example.com ESMTP\n220 ready when you are"
            );
        }

        #[test]
        fn message_text_strips_code() {
            assert_eq!(
                greeting().message_text(),
                "relay.example.com ESMTP\nready when you are"
            );
        }

        #[test]
        fn message_text_bare_code() {
            let reply = Reply::new(ReplyCode::OK, vec!["250".to_string()]);
            assert_eq!(reply.message_text(), "");
        }

        #[test]
        fn is_matches_exact_code() {
            let reply = Reply::new(ReplyCode::new(251), vec!["251 forwarded".to_string()]);
            assert!(!reply.is(ReplyCode::OK));
            assert!(reply.is(ReplyCode::new(251)));
        }
    }
}
