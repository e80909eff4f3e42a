//! SMTP reply line parser.

use crate::types::{Reply, ReplyCode};

/// Parses one reply line (without its CRLF).
///
/// A line of the shape `<digits><space or dash><text>` yields a coded reply;
/// `-` marks a continuation line. Anything else, including a code without
/// text, yields an uncoded reply holding the trimmed line. Parsing never
/// fails.
#[must_use]
pub fn parse_reply_line(line: &str) -> Reply {
    split_code(line).map_or_else(
        || Reply::uncoded(line.trim()),
        |(code, separator, message)| Reply {
            code: Some(ReplyCode::new(code)),
            message: message.to_string(),
            last: separator == b' ',
        },
    )
}

fn split_code(line: &str) -> Option<(u16, u8, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }

    let separator = *line.as_bytes().get(digits)?;
    if separator != b' ' && separator != b'-' {
        return None;
    }

    let message = &line[digits + 1..];
    if message.is_empty() {
        return None;
    }

    let code = line[..digits].parse::<u16>().ok()?;
    Some((code, separator, message))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_greeting() {
        let reply = parse_reply_line("220 mx.example.org ESMTP ready");
        assert_eq!(reply.code, Some(ReplyCode::SERVICE_READY));
        assert_eq!(reply.message, "mx.example.org ESMTP ready");
        assert!(reply.last);
    }

    #[test]
    fn test_parse_continuation() {
        let reply = parse_reply_line("250-STARTTLS");
        assert_eq!(reply.code, Some(ReplyCode::OK));
        assert_eq!(reply.message, "STARTTLS");
        assert!(!reply.last);
    }

    #[test]
    fn test_parse_uncoded_line_is_trimmed() {
        let reply = parse_reply_line("  hello there  ");
        assert_eq!(reply.code, None);
        assert_eq!(reply.message, "hello there");
    }

    #[test]
    fn test_parse_code_without_text() {
        let reply = parse_reply_line("250 ");
        assert_eq!(reply.code, None);
        assert_eq!(reply.message, "250");

        let reply = parse_reply_line("250");
        assert_eq!(reply.code, None);
    }

    #[test]
    fn test_parse_bad_separator() {
        let reply = parse_reply_line("250:OK");
        assert_eq!(reply.code, None);
        assert_eq!(reply.message, "250:OK");
    }

    #[test]
    fn test_parse_oversized_code() {
        let reply = parse_reply_line("9999999 nope");
        assert_eq!(reply.code, None);
        assert_eq!(reply.message, "9999999 nope");
    }

    proptest! {
        #[test]
        fn prop_parse_is_idempotent(line in "[0-9]{3}[ -][ -~]{1,40}") {
            let first = parse_reply_line(&line);
            let second = parse_reply_line(&first.to_string());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_uncoded_message_is_trimmed(line in "[ a-zA-Z.]{0,40}") {
            let reply = parse_reply_line(&line);
            prop_assert!(reply.code.is_none());
            prop_assert_eq!(reply.message.as_str(), line.trim());
        }
    }
}
