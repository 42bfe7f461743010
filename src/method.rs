use std::fmt::{self, Display};

/// An HTTP request method.
///
/// The standard RFC 2616 §5.1.1 tokens get their own variant; anything
/// else is carried as `Extension` rather than rejected outright, since
/// the parser's job is framing, not routing (routing lives outside the
/// core).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
    Extension(String),
}

impl Method {
    /// Parses a method token already known to contain only TOKEN chars.
    pub fn parse(token: &str) -> Method {
        match token {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            other => Method::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match *self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Extension(ref s) => s,
        }
    }

    /// True for `HEAD`, where responses never carry a body regardless of
    /// framing headers. The parser only deals with request framing, so
    /// this is exposed for the benefit of callers building responses.
    pub fn is_head(&self) -> bool {
        matches!(*self, Method::Head)
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::Method;

    #[test]
    fn standard_tokens() {
        assert_eq!(Method::parse("GET"), Method::Get);
        assert_eq!(Method::parse("DELETE"), Method::Delete);
    }

    #[test]
    fn extension_token() {
        assert_eq!(Method::parse("PROPFIND"),
                    Method::Extension("PROPFIND".into()));
    }

    #[test]
    fn head_detection() {
        assert!(Method::Head.is_head());
        assert!(!Method::Get.is_head());
    }
}
