//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from its raw lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// Only the first three characters of the first line are interpreted.
///
/// # Errors
///
/// Returns an error if there are no lines or the code is not three digits.
pub fn parse_reply(lines: Vec<String>) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::MalformedReply("empty reply".into()));
    };

    let code = parse_code(first)
        .ok_or_else(|| Error::MalformedReply(format!("invalid reply code: {first}")))?;

    Ok(Reply::new(code, lines))
}

fn parse_code(line: &str) -> Option<ReplyCode> {
    let digits = line.get(0..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u16>().ok().map(ReplyCode::new)
}

/// Checks if a line is the last line of a reply.
///
/// Continuation lines carry `-` right after the code; anything else
/// (a space, other text, or nothing at all) ends the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}
