//! RFC 2616 §2.2 character classes used throughout the parser states.

/// Separator characters excluded from the TOKEN class.
const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";

/// True for octets allowed in a `token` production: visible ASCII minus
/// separators, space and horizontal tab. The token grammar is ASCII-only
/// (RFC 2616 §2.2's CHAR is `<any US-ASCII character>`, octets 0-127);
/// bytes with the high bit set are never token chars.
#[inline]
pub fn is_token_char(b: u8) -> bool {
    b.is_ascii() && b > 0x1f && b != 0x7f && !SEPARATORS.contains(&b)
}

/// True for control octets (0..=31, 127), which are forbidden in header
/// values except for the horizontal tab used by line folding.
#[inline]
pub fn is_ctl(b: u8) -> bool {
    b <= 0x1f || b == 0x7f
}

#[inline]
pub fn is_sp_or_htab(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Case-folds a single octet. `A..Z` becomes `a..z`; every other octet
/// passes through unchanged, including non-ASCII bytes (headers are
/// ISO-8859-1 octets the parser never decodes).
#[inline]
pub fn to_lower(b: u8) -> u8 {
    if b.is_ascii_uppercase() {
        b + (b'a' - b'A')
    } else {
        b
    }
}

/// Lowercases an ASCII/ISO-8859-1 octet buffer in place.
pub fn lowercase_ascii(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = to_lower(*b);
    }
}
