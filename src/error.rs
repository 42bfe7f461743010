//! Typed parse-error taxonomy.
//!
//! Built on `quick_error!` rather than a hand-rolled `impl Error`: one
//! variant per failure condition, each carrying enough detail to print
//! a meaningful message and an HTTP status to hand back to the peer.

use quick_error::quick_error;

quick_error! {
    /// Terminal parse failure, carrying a human-readable reason and the
    /// HTTP status it maps to.
    ///
    /// Do not match exhaustively — more variants may be added.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ParseError {
        /// Invalid character encountered outside any accumulator, e.g.
        /// a non-token byte in a header name.
        InvalidChar(found: char, expected: &'static str) {
            display("Invalid character '{}', expected {}", found, expected)
        }
        /// Malformed start line (method, request-target, version, status).
        MalformedStartLine(detail: String) {
            display("{}", detail)
        }
        /// HTTP version other than 1.0/1.1.
        UnsupportedVersion {
            display("HTTP Version not supported")
        }
        /// Response status line didn't carry a well-formed 3-digit code.
        IllegalStatusCode {
            display("Illegal response status code")
        }
        /// A length-bounded accumulator (uri/reason/chunk-ext/header
        /// count) grew past its configured limit.
        LimitExceeded(what: &'static str, limit: usize) {
            display("{} exceeds the configured limit of {}", what, limit)
        }
        /// A header name grew past `max_header_name_len`. Carries the
        /// first 50 bytes of the offending name for the error message.
        HeaderNameTooLong(name: String, limit: usize) {
            display("Header name exceeds the configured limit of {} characters ('{}')", limit, truncate_50(name))
        }
        /// A header value grew past `max_header_value_len`.
        HeaderValueTooLong(name: String, limit: usize) {
            display("HTTP header value exceeds the configured limit of {} characters (header '{}')", limit, name)
        }
        /// `Content-Length` appeared twice in one message.
        DuplicateContentLength {
            display("Duplicate Content-Length header")
        }
        /// `Host` appeared twice in one message.
        DuplicateHost {
            display("Duplicate Host header")
        }
        /// `Content-Length` value wasn't a non-negative decimal integer.
        InvalidContentLength(value: String) {
            display("Invalid Content-Length header value: {}", value)
        }
        /// Chunk size line wasn't valid hex, or overflowed.
        InvalidChunkSize(value: String) {
            display("Invalid chunk size: {}", value)
        }
        /// HTTP/1.1 request lacked exactly one `Host` header.
        MissingHost {
            display("Host header required for HTTP/1.1 requests")
        }
        /// Neither `Content-Length` nor chunked framing, and the
        /// response can't be close-delimited (HTTP/1.1, no `Connection:
        /// close`).
        LengthRequired {
            display("Content-Length header or chunked transfer encoding required")
        }
        /// Inline entity body would exceed `max_content_length`.
        PayloadTooLarge {
            display("Request payload exceeds the configured limit")
        }
    }
}

impl ParseError {
    /// The HTTP status to return to the peer for this failure.
    pub fn status(&self) -> u16 {
        use ParseError::*;
        match *self {
            UnsupportedVersion => 505,
            LengthRequired => 411,
            PayloadTooLarge => 413,
            InvalidChar(..)
            | MalformedStartLine(..)
            | IllegalStatusCode
            | LimitExceeded(..)
            | HeaderNameTooLong(..)
            | HeaderValueTooLong(..)
            | DuplicateContentLength
            | DuplicateHost
            | InvalidContentLength(..)
            | InvalidChunkSize(..)
            | MissingHost => 400,
        }
    }
}

/// Truncates a header name to its first 50 characters, appending an
/// ellipsis if anything was cut — used in [`ParseError::HeaderNameTooLong`]'s
/// message per the configured name-length limit.
fn truncate_50(name: &str) -> String {
    if name.chars().count() <= 50 {
        name.to_string()
    } else {
        let mut s: String = name.chars().take(50).collect();
        s.push_str("...");
        s
    }
}

#[cfg(test)]
mod test {
    use super::ParseError;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ParseError::UnsupportedVersion.status(), 505);
        assert_eq!(ParseError::LengthRequired.status(), 411);
        assert_eq!(ParseError::PayloadTooLarge.status(), 413);
        assert_eq!(ParseError::MissingHost.status(), 400);
        assert_eq!(ParseError::DuplicateContentLength.status(), 400);
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ParseError::InvalidChar('@', "TOKEN CHAR, LWS or COLON").to_string(),
            "Invalid character '@', expected TOKEN CHAR, LWS or COLON"
        );
        assert_eq!(
            ParseError::InvalidContentLength("1.5".into()).to_string(),
            "Invalid Content-Length header value: 1.5"
        );
    }

    #[test]
    fn header_name_too_long_truncates_at_50_chars() {
        let long_name = "x".repeat(80);
        let err = ParseError::HeaderNameTooLong(long_name, 64);
        assert_eq!(err.status(), 400);
        let msg = err.to_string();
        assert!(msg.contains(&"x".repeat(50)));
        assert!(msg.ends_with("...')"));
        assert!(!msg.contains(&"x".repeat(51)));
    }

    #[test]
    fn header_value_too_long_names_the_header() {
        let err = ParseError::HeaderValueTooLong("x-custom".into(), 8192);
        assert_eq!(err.status(), 400);
        assert_eq!(
            err.to_string(),
            "HTTP header value exceeds the configured limit of 8192 characters (header 'x-custom')"
        );
    }
}
