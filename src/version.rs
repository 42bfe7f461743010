use std::fmt::{self, Display};

/// A version of the HTTP spec this crate understands.
///
/// HTTP/0.9 is of only historic importance and is not supported; requests
/// that appear to use it are treated as malformed HTTP/1.0. HTTP/2 is a
/// binary protocol and is out of scope for this parser entirely.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    Http11,
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Version::*;
        f.write_str(match *self {
            Http10 => "HTTP/1.0",
            Http11 => "HTTP/1.1",
        })
    }
}

impl Version {
    /// Parses the 8-byte `HTTP/x.y` token. Only `1.0` and `1.1` are
    /// accepted; anything else is a version the parser refuses to speak.
    pub fn parse(major: u8, minor: u8) -> Option<Version> {
        match (major, minor) {
            (1, 0) => Some(Version::Http10),
            (1, 1) => Some(Version::Http11),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Version;

    #[test]
    fn parse_known() {
        assert_eq!(Version::parse(1, 0), Some(Version::Http10));
        assert_eq!(Version::parse(1, 1), Some(Version::Http11));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(Version::parse(2, 0), None);
        assert_eq!(Version::parse(0, 9), None);
    }

    #[test]
    fn display() {
        assert_eq!(Version::Http10.to_string(), "HTTP/1.0");
        assert_eq!(Version::Http11.to_string(), "HTTP/1.1");
    }
}
