//! Message model: immutable value types for everything the parser hands
//! upward.

use crate::method::Method;
use crate::version::Version;

/// A single header field, preserved in wire order. The name is lowercased on accumulation; the value is
/// whitespace-folded but otherwise verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(name: String, value: Vec<u8>) -> Header {
        Header { name, value }
    }

    /// Lossy UTF-8 view of the value, convenient for callers who know
    /// the header in question is textual.
    pub fn value_str(&self) -> std::borrow::Cow<str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// How the entity body of a message is framed, decided once the header
/// list is complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Framing {
    /// No body: 1xx/204/304 responses, `content-length: 0`, or a
    /// request with no framing headers at all.
    Complete,
    /// Exactly `n` octets of body, `n > 0`.
    Fixed(u64),
    /// `Transfer-Encoding: chunked` (or a list whose last coding isn't
    /// `identity`).
    Chunked,
    /// Delimited by connection close (responses only).
    ToClose,
}

/// A fully-parsed request start line plus headers and framing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestStart {
    pub method: Method,
    pub target: Vec<u8>,
    pub version: Version,
    pub headers: Vec<Header>,
    pub framing: Framing,
}

/// A fully-parsed response start line plus headers and framing decision.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResponseStart {
    pub version: Version,
    pub status: u16,
    pub reason: Vec<u8>,
    pub headers: Vec<Header>,
    pub framing: Framing,
}

/// A single chunk-extension (`;name` or `;name=value`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkExtension {
    pub name: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// One non-empty chunk of a chunked body.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chunk {
    pub data: Vec<u8>,
    pub extensions: Vec<ChunkExtension>,
}

/// Terminal event of a chunked body: the zero-size chunk, its
/// extensions (usually none) and any trailer headers.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkedEnd {
    pub extensions: Vec<ChunkExtension>,
    pub trailers: Vec<Header>,
}

/// Looks up the single value of a case-insensitively-named header, or
/// `None` if absent. Does not check for duplicates — callers that care
/// about invariant 2 ("at most one content-length") use
/// [`count_header`] first.
pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a [u8]> {
    headers.iter().find(|h| h.name == name).map(|h| h.value.as_slice())
}

/// Counts how many headers share the given (already-lowercased) name.
pub fn count_header(headers: &[Header], name: &str) -> usize {
    headers.iter().filter(|h| h.name == name).count()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_value_lookup() {
        let headers = vec![
            Header::new("host".into(), b"example.com".to_vec()),
            Header::new("accept".into(), b"*/*".to_vec()),
        ];
        assert_eq!(header_value(&headers, "host"), Some(&b"example.com"[..]));
        assert_eq!(header_value(&headers, "missing"), None);
    }

    #[test]
    fn duplicate_count() {
        let headers = vec![
            Header::new("host".into(), b"a".to_vec()),
            Header::new("host".into(), b"b".to_vec()),
        ];
        assert_eq!(count_header(&headers, "host"), 2);
    }
}
