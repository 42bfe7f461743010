//! Incremental HTTP/1.x message parser and connection pipeline stages.
//!
//! Four cooperating pieces, leaves first: the message model ([`message`]),
//! the byte-at-a-time parser state machine ([`parser`]), the connection
//! pipeline stages built on top of it ([`pipeline`]), and the
//! per-connection driver that owns a stage chain plus in-flight/timer
//! bookkeeping ([`driver`]). The raw socket event loop, response
//! renderer, routing layer and config sourcing are external
//! collaborators this crate only defines the interfaces for.

pub mod driver;
pub mod error;
pub mod message;
pub mod method;
pub mod parser;
pub mod pipeline;
pub mod settings;
pub mod token;
pub mod version;

pub use driver::{CloseReason, Connection, PipelineConfig};
pub use error::ParseError;
pub use message::{Chunk, ChunkExtension, ChunkedEnd, Framing, Header, RequestStart, ResponseStart};
pub use method::Method;
pub use parser::{new_request_parser, new_response_parser, Event, Parser};
pub use pipeline::framing::Role;
pub use pipeline::statistics::{Stats, Statistics};
pub use settings::{Settings, SettingsBuilder};
pub use version::Version;
