//! Minimal RFC 5322 message parsing.
//!
//! The adapter only needs three things out of a raw message: the sender, the
//! subject, and a body it can show to an approver. Header parsing handles
//! case-insensitive names and folded continuation lines; body extraction
//! takes the first part of a multipart message and the whole body otherwise.
//! Anything fancier (encoded words, nested multiparts, transfer encodings)
//! is out of scope for approval notifications.

use std::fmt;

/// The fields extracted from a raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMail {
    /// Value of the From header.
    pub from: String,
    /// Value of the Subject header, empty if absent.
    pub subject: String,
    /// Message body (first part for multipart messages).
    pub body: String,
}

/// Errors from parsing a raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailParseError {
    /// The message is not valid UTF-8.
    InvalidEncoding,
    /// A required header is absent.
    MissingHeader { name: &'static str },
}

impl fmt::Display for MailParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding => write!(f, "message is not valid UTF-8"),
            Self::MissingHeader { name } => write!(f, "message is missing the {name} header"),
        }
    }
}

impl std::error::Error for MailParseError {}

/// Parses a raw message into sender, subject, and body.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or the From header is absent.
pub fn parse_message(raw: &[u8]) -> Result<ParsedMail, MailParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| MailParseError::InvalidEncoding)?;
    let (header_text, body_text) = split_message(text);
    let headers = parse_headers(header_text);

    let from = header_value(&headers, "from")
        .ok_or(MailParseError::MissingHeader { name: "From" })?
        .to_string();
    let subject = header_value(&headers, "subject")
        .unwrap_or_default()
        .to_string();

    let body = match boundary(&headers) {
        Some(boundary) => first_part_body(body_text, &boundary),
        None => body_text.to_string(),
    };

    Ok(ParsedMail {
        from,
        subject,
        body,
    })
}

/// Splits a message into header block and body at the first blank line.
fn split_message(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

/// Parses a header block into (lowercase name, unfolded value) pairs.
fn parse_headers(header_text: &str) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();

    for line in header_text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header.
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    headers
}

/// Looks up a header by lowercase name.
fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Extracts the multipart boundary from the Content-Type header, if any.
fn boundary(headers: &[(String, String)]) -> Option<String> {
    let content_type = header_value(headers, "content-type")?;
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/")
    {
        return None;
    }

    let (_, rest) = content_type.split_once("boundary=")?;
    let rest = rest.trim_start();
    let boundary = if let Some(stripped) = rest.strip_prefix('"') {
        stripped.split('"').next().unwrap_or("")
    } else {
        rest.split(';').next().unwrap_or("").trim()
    };

    (!boundary.is_empty()).then(|| boundary.to_string())
}

/// Returns the body of the first part of a multipart message.
fn first_part_body(body_text: &str, boundary: &str) -> String {
    let delimiter = format!("--{boundary}");
    let mut parts = body_text.split(&delimiter);
    // Everything before the first delimiter is the preamble.
    parts.next();

    let Some(first_part) = parts.next() else {
        return body_text.to_string();
    };

    // Drop the terminator that closed the boundary line, then split the
    // part's own header block from its body.
    let part = first_part
        .strip_prefix("\r\n")
        .or_else(|| first_part.strip_prefix('\n'))
        .unwrap_or(first_part);
    let (_, part_body) = split_part(part);
    part_body.trim_end_matches(['\r', '\n']).to_string()
}

/// Splits a multipart part into its header block and body.
fn split_part(part: &str) -> (&str, &str) {
    // A part with no headers of its own starts with a blank line.
    if let Some(rest) = part.strip_prefix("\r\n") {
        return ("", rest);
    }
    if let Some(rest) = part.strip_prefix('\n') {
        return ("", rest);
    }
    split_message(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_message() {
        let raw = b"From: a@x.com\r\nSubject: S\r\n\r\nM\r\n";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.from, "a@x.com");
        assert_eq!(mail.subject, "S");
        assert_eq!(mail.body, "M\r\n");
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let raw = b"FROM: a@x.com\nsubject: hello\n\nbody";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.from, "a@x.com");
        assert_eq!(mail.subject, "hello");
    }

    #[test]
    fn folded_subject_is_unfolded() {
        let raw = b"From: a@x.com\r\nSubject: a rather\r\n long subject\r\n\r\nbody";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.subject, "a rather long subject");
    }

    #[test]
    fn missing_subject_defaults_to_empty() {
        let raw = b"From: a@x.com\n\nbody";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.subject, "");
        assert_eq!(mail.body, "body");
    }

    #[test]
    fn missing_from_is_an_error() {
        let raw = b"Subject: S\n\nbody";
        let err = parse_message(raw).expect_err("From is required");
        assert_eq!(err, MailParseError::MissingHeader { name: "From" });
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let raw = [0xff, 0xfe, 0x00];
        let err = parse_message(&raw).expect_err("not UTF-8");
        assert_eq!(err, MailParseError::InvalidEncoding);
    }

    #[test]
    fn multipart_takes_first_part_body() {
        let raw = b"From: a@x.com\r\n\
Subject: S\r\n\
Content-Type: multipart/alternative; boundary=\"sep\"\r\n\
\r\n\
preamble\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
plain text part\r\n\
--sep\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html part</p>\r\n\
--sep--\r\n";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.body, "plain text part");
    }

    #[test]
    fn multipart_with_unquoted_boundary() {
        let raw = b"From: a@x.com\n\
Content-Type: multipart/mixed; boundary=sep\n\
\n\
--sep\n\
\n\
first\n\
--sep--\n";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.body, "first");
    }

    #[test]
    fn non_multipart_content_type_keeps_whole_body() {
        let raw = b"From: a@x.com\nContent-Type: text/plain\n\nwhole body here";
        let mail = parse_message(raw).expect("parse");

        assert_eq!(mail.body, "whole body here");
    }
}
