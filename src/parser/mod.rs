//! Incremental HTTP/1.x message parser.
//!
//! The parser is fed octets (or slices of them) one at a time; it never
//! buffers more than the message it is currently assembling, and it
//! never assumes a chunk boundary lines up with any particular framing
//! in the underlying transport. The state machine is a tagged union
//! driven byte-by-byte, generalized to both request and response
//! messages and to full chunked-body handling.

mod framing;

use crate::error::ParseError;
use crate::message::{Chunk, ChunkExtension, ChunkedEnd, Framing, Header, RequestStart, ResponseStart};
use crate::method::Method;
use crate::settings::Settings;
use crate::token::{is_ctl, is_sp_or_htab, is_token_char, to_lower};
use crate::version::Version;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const VERSION_LITERAL: &[u8] = b"HTTP/";

/// One parsed item handed to the caller. A single `feed()` call may
/// produce zero, one, or several of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    RequestStart(RequestStart),
    ResponseStart(ResponseStart),
    /// The entire body, delivered inline.
    Complete(Vec<u8>),
    Chunk(Chunk),
    ChunkedEnd(ChunkedEnd),
}

/// Which side of the connection this parser instance is reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Request,
    Response,
}

/// Whether a completed header line belongs to the main header block or
/// to chunked-body trailers; both use the same accumulation states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HeaderTarget {
    Main,
    Trailer,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    // --- request start-line ---
    ReqMethod(Vec<u8>),
    ReqTarget(Vec<u8>),
    ReqVersionLit(usize),
    ReqVersionMajor(Vec<u8>),
    ReqVersionMinor(u8, Vec<u8>),
    ReqLineEnd,

    // --- response start-line ---
    RespVersionLit(usize),
    RespVersionMajor(Vec<u8>),
    RespVersionMinor(u8, Vec<u8>),
    RespStatus(Vec<u8>),
    Reason(Vec<u8>),

    // --- headers / trailers (shared) ---
    HeaderName(Vec<u8>),
    HeaderNameAfterLf(Vec<u8>),
    HeaderNameFoldSkip(Vec<u8>),
    HeaderValue(String, Vec<u8>, bool),
    HeaderValueAfterLf(String, Vec<u8>),

    // --- body ---
    FixedBody(Vec<u8>, u64),
    ToCloseBody(Vec<u8>),
    ChunkSize(Vec<u8>),
    ChunkExtName(Vec<u8>, Vec<u8>, usize),
    ChunkExtValue(Vec<u8>, Vec<u8>, Vec<u8>, usize, bool),
    ChunkData(Vec<u8>, u64),
    ChunkDataCrlf(Vec<u8>),

    Done,
}

/// An incremental parser for one HTTP/1.x request or response message.
///
/// A single instance is good for exactly one message; the connection
/// driver builds a fresh one for the next message on the
/// same connection. Byte-fragmentation is transparent: the same input
/// split across any number of `feed()` calls yields the same events
///.
#[derive(Debug)]
pub struct Parser {
    kind: Kind,
    settings: Settings,
    state: State,
    reconsume: Option<u8>,
    dead: Option<ParseError>,

    version: Version,
    status: u16,
    reason: Vec<u8>,
    method: Method,
    target: Vec<u8>,
    headers: Vec<Header>,
    trailers: Vec<Header>,
    header_target: HeaderTarget,
    end_extensions: Vec<ChunkExtension>,
}

/// Constructs a parser for an incoming request.
pub fn new_request_parser(settings: Settings) -> Parser {
    Parser::new(Kind::Request, settings)
}

/// Constructs a parser for an incoming response.
pub fn new_response_parser(settings: Settings) -> Parser {
    Parser::new(Kind::Response, settings)
}

impl Parser {
    fn new(kind: Kind, settings: Settings) -> Parser {
        let state = match kind {
            Kind::Request => State::ReqMethod(Vec::new()),
            Kind::Response => State::RespVersionLit(0),
        };
        Parser {
            kind,
            settings,
            state,
            reconsume: None,
            dead: None,
            version: Version::Http11,
            status: 0,
            reason: Vec::new(),
            method: Method::Get,
            target: Vec::new(),
            headers: Vec::new(),
            trailers: Vec::new(),
            header_target: HeaderTarget::Main,
            end_extensions: Vec::new(),
        }
    }

    /// True once this instance has delivered its terminal event (or
    /// failed) and will not accept further input.
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Feeds as much of `input` as belongs to this message. Returns the
    /// number of bytes consumed and the events produced. Once the
    /// message reaches a terminal state, parsing stops and any
    /// remaining bytes in `input` are left for the next message (the
    /// driver installs a fresh `Parser` for those).
    pub fn feed(&mut self, input: &[u8]) -> Result<(usize, Vec<Event>), ParseError> {
        if let Some(e) = &self.dead {
            return Err(e.clone());
        }
        let mut events = Vec::new();
        let mut i = 0;
        loop {
            let byte = if let Some(b) = self.reconsume.take() {
                b
            } else if i < input.len() {
                let b = input[i];
                i += 1;
                b
            } else {
                break;
            };
            if let Err(e) = self.step(byte, &mut events) {
                self.dead = Some(e.clone());
                return Err(e);
            }
            if matches!(self.state, State::Done) {
                break;
            }
        }
        Ok((i, events))
    }

    /// Called by the connection driver when the underlying connection
    /// closes. Only meaningful while reading a close-delimited body
    ///; returns the terminal event if
    /// so, `None` otherwise (any other mid-message close is the
    /// driver's concern, not an error this parser raises).
    pub fn on_connection_close(&mut self) -> Option<Event> {
        if let State::ToCloseBody(buf) = std::mem::replace(&mut self.state, State::Done) {
            Some(Event::Complete(buf))
        } else {
            None
        }
    }

    fn reconsume(&mut self, byte: u8, next: State) {
        self.reconsume = Some(byte);
        self.state = next;
    }

    fn step(&mut self, byte: u8, events: &mut Vec<Event>) -> Result<(), ParseError> {
        let state = std::mem::replace(&mut self.state, State::Done);
        match state {
            State::ReqMethod(buf) => self.step_req_method(byte, buf),
            State::ReqTarget(buf) => self.step_req_target(byte, buf),
            State::ReqVersionLit(idx) => self.step_version_lit(byte, idx, true),
            State::ReqVersionMajor(digits) => self.step_version_major(byte, digits, true),
            State::ReqVersionMinor(major, digits) => self.step_req_version_minor(byte, major, digits),
            State::ReqLineEnd => self.step_req_line_end(byte),

            State::RespVersionLit(idx) => self.step_version_lit(byte, idx, false),
            State::RespVersionMajor(digits) => self.step_version_major(byte, digits, false),
            State::RespVersionMinor(major, digits) => self.step_resp_version_minor(byte, major, digits),
            State::RespStatus(digits) => self.step_resp_status(byte, digits),
            State::Reason(buf) => self.step_reason(byte, buf),

            State::HeaderName(name) => self.step_header_name(byte, name, events),
            State::HeaderNameAfterLf(name) => self.step_header_name_after_lf(byte, name),
            State::HeaderNameFoldSkip(name) => self.step_header_name_fold_skip(byte, name),
            State::HeaderValue(name, value, skipping) => {
                self.step_header_value(byte, name, value, skipping)
            }
            State::HeaderValueAfterLf(name, value) => {
                self.step_header_value_after_lf(byte, name, value)
            }

            State::FixedBody(buf, remaining) => self.step_fixed_body(byte, buf, remaining, events),
            State::ToCloseBody(buf) => self.step_to_close_body(byte, buf),
            State::ChunkSize(digits) => self.step_chunk_size(byte, digits),
            State::ChunkExtName(size, name, len) => self.step_chunk_ext_name(byte, size, name, len),
            State::ChunkExtValue(size, name, value, len, quoted) => {
                self.step_chunk_ext_value(byte, size, name, value, len, quoted)
            }
            State::ChunkData(buf, remaining) => self.step_chunk_data(byte, buf, remaining),
            State::ChunkDataCrlf(buf) => self.step_chunk_data_crlf(byte, buf, events),

            State::Done => Ok(()),
        }
    }

    // ---- request start-line ----

    fn step_req_method(&mut self, byte: u8, mut buf: Vec<u8>) -> Result<(), ParseError> {
        if byte == b' ' {
            if buf.is_empty() {
                return Err(ParseError::MalformedStartLine("empty request method".into()));
            }
            self.method = Method::parse(std::str::from_utf8(&buf).unwrap_or(""));
            self.state = State::ReqTarget(Vec::new());
        } else if is_token_char(byte) {
            buf.push(byte);
            self.state = State::ReqMethod(buf);
        } else {
            return Err(ParseError::InvalidChar(byte as char, "TOKEN CHAR or SP"));
        }
        Ok(())
    }

    fn step_req_target(&mut self, byte: u8, mut buf: Vec<u8>) -> Result<(), ParseError> {
        if byte == b' ' {
            if buf.is_empty() {
                return Err(ParseError::MalformedStartLine("empty request-target".into()));
            }
            self.target = buf;
            self.state = State::ReqVersionLit(0);
        } else if is_ctl(byte) || is_sp_or_htab(byte) {
            return Err(ParseError::InvalidChar(byte as char, "request-target octet"));
        } else {
            if buf.len() >= self.settings.max_uri_len {
                return Err(ParseError::LimitExceeded("request-target", self.settings.max_uri_len));
            }
            buf.push(byte);
            self.state = State::ReqTarget(buf);
        }
        Ok(())
    }

    fn step_req_version_minor(&mut self, byte: u8, major: u8, mut digits: Vec<u8>) -> Result<(), ParseError> {
        if byte.is_ascii_digit() {
            if digits.len() >= 2 {
                return Err(ParseError::MalformedStartLine("HTTP version minor too long".into()));
            }
            digits.push(byte);
            self.state = State::ReqVersionMinor(major, digits);
            return Ok(());
        }
        let minor = parse_digits(&digits).ok_or_else(|| {
            ParseError::MalformedStartLine("missing HTTP version minor".into())
        })?;
        self.version = Version::parse(major, minor).ok_or(ParseError::UnsupportedVersion)?;
        if byte == CR || byte == LF {
            self.reconsume(byte, State::ReqLineEnd);
            Ok(())
        } else {
            Err(ParseError::InvalidChar(byte as char, "CR or LF"))
        }
    }

    fn step_req_line_end(&mut self, byte: u8) -> Result<(), ParseError> {
        if byte == CR {
            self.state = State::ReqLineEnd;
        } else if byte == LF {
            self.header_target = HeaderTarget::Main;
            self.state = State::HeaderName(Vec::new());
        } else {
            return Err(ParseError::InvalidChar(byte as char, "CR or LF"));
        }
        Ok(())
    }

    // ---- response start-line ----

    fn step_resp_version_minor(&mut self, byte: u8, major: u8, mut digits: Vec<u8>) -> Result<(), ParseError> {
        if byte.is_ascii_digit() {
            if digits.len() >= 2 {
                return Err(ParseError::MalformedStartLine("HTTP version minor too long".into()));
            }
            digits.push(byte);
            self.state = State::RespVersionMinor(major, digits);
            return Ok(());
        }
        if byte != b' ' {
            return Err(ParseError::InvalidChar(byte as char, "SP"));
        }
        let minor = parse_digits(&digits).ok_or_else(|| {
            ParseError::MalformedStartLine("missing HTTP version minor".into())
        })?;
        self.version = Version::parse(major, minor).ok_or(ParseError::UnsupportedVersion)?;
        self.state = State::RespStatus(Vec::new());
        Ok(())
    }

    fn step_resp_status(&mut self, byte: u8, mut digits: Vec<u8>) -> Result<(), ParseError> {
        if byte.is_ascii_digit() {
            if digits.len() >= 3 {
                return Err(ParseError::IllegalStatusCode);
            }
            digits.push(byte);
            self.state = State::RespStatus(digits);
            return Ok(());
        }
        if digits.len() != 3 || !(b'1'..=b'5').contains(&digits[0]) {
            return Err(ParseError::IllegalStatusCode);
        }
        self.status = parse_digits(&digits).ok_or(ParseError::IllegalStatusCode)? as u16;
        if byte == b' ' {
            self.state = State::Reason(Vec::new());
        } else if byte == CR || byte == LF {
            self.reconsume(byte, State::Reason(Vec::new()));
        } else {
            return Err(ParseError::IllegalStatusCode);
        }
        Ok(())
    }

    fn step_reason(&mut self, byte: u8, mut buf: Vec<u8>) -> Result<(), ParseError> {
        if byte == CR {
            self.state = State::Reason(buf);
        } else if byte == LF {
            self.reason = buf;
            self.header_target = HeaderTarget::Main;
            self.state = State::HeaderName(Vec::new());
        } else {
            // No CTL carve-out here: spec §4.1 state 2 says "any other
            // octet is appended", unlike header values, where CTL is
            // explicitly forbidden.
            if buf.len() >= self.settings.max_reason_len {
                return Err(ParseError::LimitExceeded("reason-phrase", self.settings.max_reason_len));
            }
            buf.push(byte);
            self.state = State::Reason(buf);
        }
        Ok(())
    }

    // ---- version literal / digits, shared by request and response ----

    fn step_version_lit(&mut self, byte: u8, idx: usize, is_request: bool) -> Result<(), ParseError> {
        if byte != VERSION_LITERAL[idx] {
            return Err(ParseError::MalformedStartLine("expected \"HTTP/\"".into()));
        }
        let next_idx = idx + 1;
        if next_idx == VERSION_LITERAL.len() {
            self.state = if is_request {
                State::ReqVersionMajor(Vec::new())
            } else {
                State::RespVersionMajor(Vec::new())
            };
        } else {
            self.state = if is_request {
                State::ReqVersionLit(next_idx)
            } else {
                State::RespVersionLit(next_idx)
            };
        }
        Ok(())
    }

    fn step_version_major(&mut self, byte: u8, mut digits: Vec<u8>, is_request: bool) -> Result<(), ParseError> {
        if byte.is_ascii_digit() {
            if digits.len() >= 2 {
                return Err(ParseError::MalformedStartLine("HTTP version major too long".into()));
            }
            digits.push(byte);
            self.state = if is_request {
                State::ReqVersionMajor(digits)
            } else {
                State::RespVersionMajor(digits)
            };
            return Ok(());
        }
        if byte != b'.' {
            return Err(ParseError::InvalidChar(byte as char, "'.'"));
        }
        let major = parse_digits(&digits).ok_or_else(|| {
            ParseError::MalformedStartLine("missing HTTP version major".into())
        })?;
        self.state = if is_request {
            State::ReqVersionMinor(major, Vec::new())
        } else {
            State::RespVersionMinor(major, Vec::new())
        };
        Ok(())
    }

    // ---- header name ----

    fn step_header_name(&mut self, byte: u8, mut name: Vec<u8>, events: &mut Vec<Event>) -> Result<(), ParseError> {
        if byte == CR {
            self.state = State::HeaderName(name);
            return Ok(());
        }
        if byte == LF {
            if name.is_empty() {
                return self.finish_headers(events);
            }
            self.state = State::HeaderNameAfterLf(name);
            return Ok(());
        }
        if name.is_empty() && is_sp_or_htab(byte) {
            // No prior header to fold into; tolerate stray leading
            // whitespace rather than failing the message.
            self.state = State::HeaderName(name);
            return Ok(());
        }
        if byte == b':' {
            if name.is_empty() {
                return Err(ParseError::MalformedStartLine("header name must not be empty".into()));
            }
            // `name` is restricted to `is_token_char` bytes (ASCII-only),
            // so this is always valid UTF-8; `from_utf8_lossy` rather than
            // `unwrap()` anyway, so a future loosening of that guard can't
            // turn attacker-controlled bytes into a panic.
            let name = String::from_utf8_lossy(&name).into_owned();
            self.state = State::HeaderValue(name, Vec::new(), true);
            return Ok(());
        }
        if !is_token_char(byte) {
            return Err(ParseError::InvalidChar(byte as char, "TOKEN CHAR, LWS or COLON"));
        }
        if name.len() >= self.settings.max_header_name_len {
            let mut offending = name;
            offending.push(to_lower(byte));
            return Err(ParseError::HeaderNameTooLong(
                String::from_utf8_lossy(&offending).into_owned(),
                self.settings.max_header_name_len,
            ));
        }
        name.push(to_lower(byte));
        self.state = State::HeaderName(name);
        Ok(())
    }

    fn step_header_name_after_lf(&mut self, byte: u8, name: Vec<u8>) -> Result<(), ParseError> {
        if is_sp_or_htab(byte) {
            self.state = State::HeaderNameFoldSkip(name);
        } else {
            return Err(ParseError::MalformedStartLine(format!(
                "header '{}' has no value",
                String::from_utf8_lossy(&name)
            )));
        }
        Ok(())
    }

    fn step_header_name_fold_skip(&mut self, byte: u8, name: Vec<u8>) -> Result<(), ParseError> {
        if is_sp_or_htab(byte) {
            self.state = State::HeaderNameFoldSkip(name);
        } else if byte == CR {
            self.state = State::HeaderNameFoldSkip(name);
        } else if byte == LF {
            self.state = State::HeaderNameAfterLf(name);
        } else {
            self.reconsume(byte, State::HeaderName(name));
        }
        Ok(())
    }

    // ---- header value ----

    fn step_header_value(
        &mut self,
        byte: u8,
        name: String,
        mut value: Vec<u8>,
        skipping: bool,
    ) -> Result<(), ParseError> {
        if skipping {
            if is_sp_or_htab(byte) {
                self.state = State::HeaderValue(name, value, true);
                return Ok(());
            }
            if byte == CR {
                self.state = State::HeaderValue(name, value, true);
                return Ok(());
            }
            if byte == LF {
                self.state = State::HeaderValueAfterLf(name, value);
                return Ok(());
            }
        } else {
            if byte == CR {
                self.state = State::HeaderValue(name, value, false);
                return Ok(());
            }
            if byte == LF {
                self.state = State::HeaderValueAfterLf(name, value);
                return Ok(());
            }
        }
        if is_ctl(byte) && byte != b'\t' {
            return Err(ParseError::InvalidChar(byte as char, "header value octet"));
        }
        if value.len() >= self.settings.max_header_value_len {
            return Err(ParseError::HeaderValueTooLong(name, self.settings.max_header_value_len));
        }
        value.push(byte);
        self.state = State::HeaderValue(name, value, false);
        Ok(())
    }

    fn step_header_value_after_lf(
        &mut self,
        byte: u8,
        name: String,
        mut value: Vec<u8>,
    ) -> Result<(), ParseError> {
        if is_sp_or_htab(byte) {
            if value.len() >= self.settings.max_header_value_len {
                return Err(ParseError::HeaderValueTooLong(name, self.settings.max_header_value_len));
            }
            value.push(b' ');
            self.state = State::HeaderValue(name, value, true);
            return Ok(());
        }
        while value.last() == Some(&b' ') || value.last() == Some(&b'\t') {
            value.pop();
        }
        self.push_header(name, value)?;
        self.reconsume(byte, State::HeaderName(Vec::new()));
        Ok(())
    }

    fn push_header(&mut self, name: String, value: Vec<u8>) -> Result<(), ParseError> {
        let target = match self.header_target {
            HeaderTarget::Main => &mut self.headers,
            HeaderTarget::Trailer => &mut self.trailers,
        };
        if target.len() >= self.settings.max_header_count {
            return Err(ParseError::LimitExceeded("header count", self.settings.max_header_count));
        }
        target.push(Header::new(name, value));
        Ok(())
    }

    fn finish_headers(&mut self, events: &mut Vec<Event>) -> Result<(), ParseError> {
        match self.header_target {
            HeaderTarget::Main => self.finish_main_headers(events),
            HeaderTarget::Trailer => self.finish_trailers(events),
        }
    }

    fn finish_main_headers(&mut self, events: &mut Vec<Event>) -> Result<(), ParseError> {
        let is_request = matches!(self.kind, Kind::Request);
        let framing = framing::compute_framing(
            is_request,
            self.version,
            self.status,
            &self.headers,
            &self.settings,
        )?;
        if is_request {
            events.push(Event::RequestStart(RequestStart {
                method: self.method.clone(),
                target: std::mem::take(&mut self.target),
                version: self.version,
                headers: std::mem::take(&mut self.headers),
                framing,
            }));
        } else {
            events.push(Event::ResponseStart(ResponseStart {
                version: self.version,
                status: self.status,
                reason: std::mem::take(&mut self.reason),
                headers: std::mem::take(&mut self.headers),
                framing,
            }));
        }
        self.enter_body(framing, events)
    }

    fn finish_trailers(&mut self, events: &mut Vec<Event>) -> Result<(), ParseError> {
        events.push(Event::ChunkedEnd(ChunkedEnd {
            extensions: std::mem::take(&mut self.end_extensions),
            trailers: std::mem::take(&mut self.trailers),
        }));
        self.state = State::Done;
        Ok(())
    }

    fn enter_body(&mut self, framing: Framing, events: &mut Vec<Event>) -> Result<(), ParseError> {
        match framing {
            Framing::Complete => {
                events.push(Event::Complete(Vec::new()));
                self.state = State::Done;
            }
            Framing::Fixed(n) => {
                self.state = State::FixedBody(Vec::new(), n);
            }
            Framing::Chunked => {
                self.state = State::ChunkSize(Vec::new());
            }
            Framing::ToClose => {
                self.state = State::ToCloseBody(Vec::new());
            }
        }
        Ok(())
    }

    // ---- fixed-length / close-delimited body ----

    fn step_fixed_body(&mut self, byte: u8, mut buf: Vec<u8>, remaining: u64, events: &mut Vec<Event>) -> Result<(), ParseError> {
        buf.push(byte);
        let remaining = remaining - 1;
        if remaining == 0 {
            events.push(Event::Complete(buf));
            self.state = State::Done;
        } else {
            self.state = State::FixedBody(buf, remaining);
        }
        Ok(())
    }

    fn step_to_close_body(&mut self, byte: u8, mut buf: Vec<u8>) -> Result<(), ParseError> {
        buf.push(byte);
        self.state = State::ToCloseBody(buf);
        Ok(())
    }

    // ---- chunked body ----

    fn step_chunk_size(&mut self, byte: u8, mut digits: Vec<u8>) -> Result<(), ParseError> {
        if byte.is_ascii_hexdigit() {
            if digits.len() >= 8 {
                return Err(ParseError::InvalidChunkSize(String::from_utf8_lossy(&digits).into_owned()));
            }
            digits.push(byte);
            self.state = State::ChunkSize(digits);
            return Ok(());
        }
        if byte == b';' {
            self.state = State::ChunkExtName(digits, Vec::new(), 0);
            return Ok(());
        }
        if byte == CR {
            self.state = State::ChunkSize(digits);
            return Ok(());
        }
        if byte == LF {
            return self.finish_chunk_size(digits);
        }
        Err(ParseError::InvalidChunkSize(String::from_utf8_lossy(&digits).into_owned()))
    }

    fn step_chunk_ext_name(&mut self, byte: u8, size: Vec<u8>, mut name: Vec<u8>, mut len: usize) -> Result<(), ParseError> {
        if byte == b'=' {
            self.state = State::ChunkExtValue(size, name, Vec::new(), len, false);
            return Ok(());
        }
        if byte == b';' {
            self.commit_extension(name, None);
            self.state = State::ChunkExtName(size, Vec::new(), len);
            return Ok(());
        }
        if byte == CR {
            self.state = State::ChunkExtName(size, name, len);
            return Ok(());
        }
        if byte == LF {
            self.commit_extension(name, None);
            return self.finish_chunk_size(size);
        }
        len += 1;
        if len > self.settings.max_chunk_ext_len {
            return Err(ParseError::LimitExceeded("chunk extensions", self.settings.max_chunk_ext_len));
        }
        name.push(byte);
        self.state = State::ChunkExtName(size, name, len);
        Ok(())
    }

    fn step_chunk_ext_value(
        &mut self,
        byte: u8,
        size: Vec<u8>,
        name: Vec<u8>,
        mut value: Vec<u8>,
        mut len: usize,
        quoted: bool,
    ) -> Result<(), ParseError> {
        if quoted {
            if byte == b'"' {
                self.commit_extension(name, Some(value));
                self.state = State::ChunkExtName(size, Vec::new(), len);
                return Ok(());
            }
            len += 1;
            if len > self.settings.max_chunk_ext_len {
                return Err(ParseError::LimitExceeded("chunk extensions", self.settings.max_chunk_ext_len));
            }
            value.push(byte);
            self.state = State::ChunkExtValue(size, name, value, len, true);
            return Ok(());
        }
        if value.is_empty() && byte == b'"' {
            self.state = State::ChunkExtValue(size, name, value, len, true);
            return Ok(());
        }
        if byte == b';' {
            self.commit_extension(name, Some(value));
            self.state = State::ChunkExtName(size, Vec::new(), len);
            return Ok(());
        }
        if byte == CR {
            self.state = State::ChunkExtValue(size, name, value, len, false);
            return Ok(());
        }
        if byte == LF {
            self.commit_extension(name, Some(value));
            return self.finish_chunk_size(size);
        }
        len += 1;
        if len > self.settings.max_chunk_ext_len {
            return Err(ParseError::LimitExceeded("chunk extensions", self.settings.max_chunk_ext_len));
        }
        value.push(byte);
        self.state = State::ChunkExtValue(size, name, value, len, false);
        Ok(())
    }

    fn commit_extension(&mut self, name: Vec<u8>, value: Option<Vec<u8>>) {
        if name.is_empty() {
            return;
        }
        self.end_extensions.push(ChunkExtension { name, value });
    }

    fn finish_chunk_size(&mut self, digits: Vec<u8>) -> Result<(), ParseError> {
        if digits.is_empty() {
            return Err(ParseError::InvalidChunkSize(String::new()));
        }
        let size = u64::from_str_radix(
            std::str::from_utf8(&digits).map_err(|_| ParseError::InvalidChunkSize(String::from_utf8_lossy(&digits).into_owned()))?,
            16,
        )
        .map_err(|_| ParseError::InvalidChunkSize(String::from_utf8_lossy(&digits).into_owned()))?;
        if size > self.settings.max_chunk_size {
            return Err(ParseError::LimitExceeded("chunk size", self.settings.max_chunk_size as usize));
        }
        if size == 0 {
            self.header_target = HeaderTarget::Trailer;
            self.state = State::HeaderName(Vec::new());
        } else {
            self.state = State::ChunkData(Vec::new(), size);
        }
        Ok(())
    }

    fn step_chunk_data(&mut self, byte: u8, mut buf: Vec<u8>, remaining: u64) -> Result<(), ParseError> {
        buf.push(byte);
        let remaining = remaining - 1;
        if remaining == 0 {
            self.state = State::ChunkDataCrlf(buf);
        } else {
            self.state = State::ChunkData(buf, remaining);
        }
        Ok(())
    }

    fn step_chunk_data_crlf(&mut self, byte: u8, buf: Vec<u8>, events: &mut Vec<Event>) -> Result<(), ParseError> {
        if byte == CR {
            self.state = State::ChunkDataCrlf(buf);
            return Ok(());
        }
        if byte == LF {
            let extensions = std::mem::take(&mut self.end_extensions);
            events.push(Event::Chunk(Chunk { data: buf, extensions }));
            self.state = State::ChunkSize(Vec::new());
            return Ok(());
        }
        Err(ParseError::InvalidChar(byte as char, "CR or LF"))
    }
}

fn parse_digits(digits: &[u8]) -> Option<u8> {
    if digits.is_empty() {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    fn feed_all(parser: &mut Parser, data: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        let mut offset = 0;
        while offset < data.len() && !parser.is_done() {
            let (consumed, batch) = parser.feed(&data[offset..]).expect("parse ok");
            events.extend(batch);
            offset += consumed;
            if consumed == 0 {
                break;
            }
        }
        events
    }

    #[test]
    fn simple_get_request() {
        let mut parser = new_request_parser(Settings::default());
        let input = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let events = feed_all(&mut parser, input);
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::RequestStart(r) => {
                assert_eq!(r.method, Method::Get);
                assert_eq!(r.target, b"/index.html");
                assert_eq!(r.version, Version::Http11);
                assert_eq!(r.framing, Framing::Complete);
            }
            _ => panic!("expected RequestStart"),
        }
        assert_eq!(events[1], Event::Complete(Vec::new()));
    }

    #[test]
    fn byte_at_a_time_matches_whole_buffer() {
        let input = b"GET / HTTP/1.1\r\nHost: h\r\n\r\n";
        let mut whole = new_request_parser(Settings::default());
        let whole_events = feed_all(&mut whole, input);

        let mut fragmented = new_request_parser(Settings::default());
        let mut events = Vec::new();
        for &b in input {
            if fragmented.is_done() {
                break;
            }
            let (_, batch) = fragmented.feed(&[b]).expect("parse ok");
            events.extend(batch);
        }
        assert_eq!(whole_events, events);
    }

    #[test]
    fn response_without_framing_headers_on_http10_closes() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/1.0 200 OK\r\n\r\n";
        let events = feed_all(&mut parser, input);
        match &events[0] {
            Event::ResponseStart(r) => {
                assert_eq!(r.status, 200);
                assert_eq!(r.framing, Framing::ToClose);
            }
            _ => panic!("expected ResponseStart"),
        }
        assert!(!parser.is_done());
        let closed = parser.on_connection_close();
        assert_eq!(closed, Some(Event::Complete(Vec::new())));
    }

    #[test]
    fn response_without_framing_on_http11_is_length_required() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/1.1 200 OK\r\n\r\n";
        let err = feed_all_err(&mut parser, input);
        assert_eq!(err, ParseError::LengthRequired);
        assert_eq!(err.status(), 411);
    }

    fn feed_all_err(parser: &mut Parser, data: &[u8]) -> ParseError {
        let mut offset = 0;
        loop {
            match parser.feed(&data[offset..]) {
                Ok((consumed, _)) => {
                    offset += consumed;
                    if parser.is_done() || consumed == 0 {
                        panic!("expected parse error");
                    }
                }
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn chunked_request_streams_chunks_then_end() {
        let mut parser = new_request_parser(Settings::default());
        let input = b"POST /up HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n0\r\n\r\n";
        let events = feed_all(&mut parser, input);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::RequestStart(_)));
        match &events[1] {
            Event::Chunk(c) => assert_eq!(c.data, b"Wiki"),
            _ => panic!("expected Chunk"),
        }
        assert_eq!(events[2], Event::ChunkedEnd(ChunkedEnd::default()));
    }

    #[test]
    fn reason_phrase_tolerates_stray_ctl_byte() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/1.1 200 O\x01K\r\nContent-Length: 0\r\n\r\n";
        let events = feed_all(&mut parser, input);
        match &events[0] {
            Event::ResponseStart(r) => assert_eq!(r.reason, b"O\x01K"),
            _ => panic!("expected ResponseStart"),
        }
    }

    #[test]
    fn version_rejected_above_1_1() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/2.0 200 OK\r\n\r\n";
        let err = feed_all_err(&mut parser, input);
        assert_eq!(err, ParseError::UnsupportedVersion);
        assert_eq!(err.status(), 505);
    }

    #[test]
    fn invalid_content_length_value() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 1.5\r\n\r\n";
        let err = feed_all_err(&mut parser, input);
        assert_eq!(err, ParseError::InvalidContentLength("1.5".to_string()));
    }

    #[test]
    fn invalid_header_name_char_rejected() {
        let mut parser = new_request_parser(Settings::default());
        let input = b"GET / HTTP/1.1\r\nUser@Agent: x\r\n\r\n";
        let err = feed_all_err(&mut parser, input);
        assert_eq!(err, ParseError::InvalidChar('@', "TOKEN CHAR, LWS or COLON"));
    }

    #[test]
    fn high_bit_byte_in_header_name_is_a_terminal_error_not_a_panic() {
        let mut parser = new_request_parser(Settings::default());
        let input = b"GET / HTTP/1.1\r\n\x80: v\r\n\r\n";
        let err = feed_all_err(&mut parser, input);
        assert_eq!(err, ParseError::InvalidChar('\u{80}', "TOKEN CHAR, LWS or COLON"));
    }

    #[test]
    fn multiline_header_folding() {
        let mut parser = new_response_parser(Settings::default());
        let input = b"HTTP/1.0 200 OK\r\nUser-Agent: curl/7.19.7\r\n abc\r\n    xyz\r\nAccept\r\n : */*  \r\n\r\n";
        let events = feed_all(&mut parser, input);
        match &events[0] {
            Event::ResponseStart(r) => {
                let ua = r.headers.iter().find(|h| h.name == "user-agent").unwrap();
                assert_eq!(ua.value_str(), "curl/7.19.7 abc xyz");
                let accept = r.headers.iter().find(|h| h.name == "accept").unwrap();
                assert_eq!(accept.value_str(), "*/*");
            }
            _ => panic!("expected ResponseStart"),
        }
    }

    #[test]
    fn empty_header_value_is_not_an_error() {
        let mut parser = new_request_parser(Settings::default());
        let input = b"GET / HTTP/1.1\r\nHost: h\r\nAccept: \r\n\r\n";
        let events = feed_all(&mut parser, input);
        match &events[0] {
            Event::RequestStart(r) => {
                let accept = r.headers.iter().find(|h| h.name == "accept").unwrap();
                assert_eq!(accept.value, Vec::<u8>::new());
            }
            _ => panic!("expected RequestStart"),
        }
    }
}
