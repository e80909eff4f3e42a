//! DATA payload transparency (RFC 5321 section 4.5.2).
//!
//! Every line of the message that begins with `.` gets one extra `.` so the
//! peer never mistakes message content for the end-of-data marker. Bare LF
//! line endings are normalized to CRLF first.

/// End-of-data marker, sent after the last CRLF of the payload.
pub const END_OF_DATA: &[u8] = b".\r\n";

/// Converts every bare LF to CRLF.
#[must_use]
pub fn normalize_line_endings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for c in text.chars() {
        if c == '\n' && previous != Some('\r') {
            out.push('\r');
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

/// Applies dot-stuffing to CRLF-normalized text.
#[must_use]
pub fn dot_stuff(text: &str) -> String {
    let text = normalize_line_endings(text);
    let mut out = String::with_capacity(text.len() + 8);
    for (i, line) in text.split("\r\n").enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

/// Reverses [`dot_stuff`].
#[must_use]
pub fn dot_unstuff(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split("\r\n").enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        out.push_str(line.strip_prefix('.').unwrap_or(line));
    }
    out
}

/// Encodes a message as the complete DATA payload, terminator included.
#[must_use]
pub fn encode(message: &str) -> Vec<u8> {
    let mut payload = dot_stuff(message).into_bytes();
    if !payload.ends_with(b"\r\n") {
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(END_OF_DATA);
    payload
}
