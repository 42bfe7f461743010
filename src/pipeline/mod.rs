//! Connection pipeline stages.
//!
//! A stage observes and transforms a downward command stream and an
//! upward event stream. Stages are wired together explicitly through a
//! `Stage` trait with `on_command`/`on_event` methods taking sink
//! closures, rather than capturing adjacent stages in their own
//! closures — composing a chain this way avoids tying each stage's type
//! to its neighbors.

pub mod framing;
pub mod statistics;
pub mod timeout;

use crate::driver::CloseReason;
use crate::error::ParseError;
use crate::parser;
use crate::settings::Settings;
use std::sync::Arc;

pub use statistics::Statistics;

/// Shared, read-mostly state every stage gets a handle to. Constructed
/// once per connection; the `stats` handle is the one piece that
/// crosses connection boundaries.
pub struct PipelineContext {
    pub settings: Settings,
    pub stats: Arc<Statistics>,
}

/// A part of an outbound response, observed (not rendered) by the
/// pipeline. Rendering full responses into bytes is the external
/// renderer's job; the pipeline only needs to know when a
/// response **starts**, to pair it with the oldest in-flight request
/// and to drive the statistics `responseStarts` counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponsePart {
    Start,
    Chunk,
    End,
}

/// A sideways notification a stage can ask the driver to deliver,
/// distinct from ordinary response traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    RequestTimeout,
}

/// The downward (command) stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Response(ResponsePart),
    Tell(Notification),
    StopReading,
    ResumeReading,
    Close(CloseReason),
}

/// The upward (event) stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Raw bytes read off the socket; consumed by the framing stage.
    Inbound(Vec<u8>),
    /// A part produced by the parser state machine.
    Parsed(parser::Event),
    /// The parser reached a terminal error state.
    ParseFailed(ParseError),
    /// The request-timeout stage's wall-clock check fired.
    RequestTimeout,
    /// The connection closed, for the given reason.
    Closed(CloseReason),
    /// A previously-submitted outbound part finished writing.
    SendCompleted,
}

/// A bidirectional transformer over the command and event streams of
/// one connection's pipeline.
///
/// Concrete stages are built with their own constructor (`new`/`build`)
/// rather than a generic associated one, since each stage's
/// construction parameters differ (a framing stage needs a parser
/// `Kind` and `Settings`; a statistics stage needs only the shared
/// counters). `on_command`/`on_event` take a `down`/`up` sink closure so
/// a stage may emit zero, one, or several parts per input, matching the
/// source's closure-based adjacent pipelines without capturing them.
pub trait Stage {
    fn on_command(&mut self, ctx: &mut PipelineContext, cmd: Command, down: &mut dyn FnMut(Command));
    fn on_event(&mut self, ctx: &mut PipelineContext, ev: Event, up: &mut dyn FnMut(Event));
}
