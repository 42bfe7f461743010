//! Header-complete decision: selects the body-framing mode once the
//! header list is finished.

use crate::error::ParseError;
use crate::message::{count_header, header_value, Framing, Header};
use crate::settings::Settings;
use crate::version::Version;

/// Applies a strict-priority decision table (RFC 9112 §6.3) to decide
/// how a message's entity body is delimited.
///
/// `status` is ignored for requests (pass any value, e.g. 0).
pub fn compute_framing(
    is_request: bool,
    version: Version,
    status: u16,
    headers: &[Header],
    settings: &Settings,
) -> Result<Framing, ParseError> {
    if count_header(headers, "content-length") > 1 {
        return Err(ParseError::DuplicateContentLength);
    }
    if count_header(headers, "host") > 1 {
        return Err(ParseError::DuplicateHost);
    }
    if is_request && version == Version::Http11 && count_header(headers, "host") == 0 {
        return Err(ParseError::MissingHost);
    }

    if !is_request && (status / 100 == 1 || status == 204 || status == 304) {
        return Ok(Framing::Complete);
    }

    if transfer_encoding_is_chunked(headers) {
        return Ok(Framing::Chunked);
    }

    if let Some(raw) = header_value(headers, "content-length") {
        let text = std::str::from_utf8(raw)
            .map_err(|_| ParseError::InvalidContentLength(String::from_utf8_lossy(raw).into_owned()))?;
        let trimmed = text.trim();
        let n: u64 = trimmed
            .parse()
            .map_err(|_| ParseError::InvalidContentLength(trimmed.to_string()))?;
        if n == 0 {
            return Ok(Framing::Complete);
        }
        if n > settings.max_content_length {
            return Err(ParseError::PayloadTooLarge);
        }
        return Ok(Framing::Fixed(n));
    }

    if is_request {
        return Ok(Framing::Complete);
    }

    let close = match header_value(headers, "connection") {
        Some(raw) => String::from_utf8_lossy(raw).trim().eq_ignore_ascii_case("close"),
        None => version == Version::Http10,
    };
    if close {
        Ok(Framing::ToClose)
    } else {
        Err(ParseError::LengthRequired)
    }
}

/// True if `Transfer-Encoding` is present and its last coding isn't
/// `identity`. Only the last coding in a comma-separated list is
/// inspected, per RFC 7230 §3.3.1 — a message is chunked only if
/// `chunked` is the final encoding applied.
fn transfer_encoding_is_chunked(headers: &[Header]) -> bool {
    match header_value(headers, "transfer-encoding") {
        Some(raw) => {
            let text = String::from_utf8_lossy(raw);
            let last = text.rsplit(',').next().unwrap_or("").trim();
            !last.eq_ignore_ascii_case("identity") && !last.is_empty()
        }
        None => false,
    }
}
