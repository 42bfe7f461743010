//! Framing stage: owns the current parser instance, feeds it inbound
//! bytes, and emits parsed parts upward.

use super::{Command, Event, PipelineContext, Stage};
use crate::parser::{self, Parser};
use crate::settings::Settings;

/// Which kind of message this connection's framing stage parses.
/// Mirrors `parser::new_request_parser`/`new_response_parser` — a
/// server-side connection parses requests, a client-side connection
/// parses responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Feeds inbound byte buffers into a [`Parser`], installing a fresh
/// one after every terminal state so pipelined messages on the same
/// connection are handled transparently. Emits at most one
/// `RequestStart`/`ResponseStart` per message, followed by zero or more
/// `Chunk`s and exactly one terminal `Complete`/`ChunkedEnd`.
pub struct FramingStage {
    role: Role,
    settings: Settings,
    parser: Parser,
    failed: bool,
}

impl FramingStage {
    pub fn new(role: Role, settings: Settings) -> FramingStage {
        FramingStage {
            role,
            settings,
            parser: Self::fresh_parser(role, settings),
            failed: false,
        }
    }

    fn fresh_parser(role: Role, settings: Settings) -> Parser {
        match role {
            Role::Server => parser::new_request_parser(settings),
            Role::Client => parser::new_response_parser(settings),
        }
    }

    fn feed(&mut self, mut input: &[u8], up: &mut dyn FnMut(Event)) {
        if self.failed {
            return;
        }
        while !input.is_empty() {
            match self.parser.feed(input) {
                Ok((consumed, events)) => {
                    for ev in events {
                        log::trace!("framing stage emitting {:?}", ev);
                        up(Event::Parsed(ev));
                    }
                    input = &input[consumed..];
                    if self.parser.is_done() {
                        self.parser = Self::fresh_parser(self.role, self.settings);
                    } else if consumed == 0 {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("parse error: {}", err);
                    self.failed = true;
                    up(Event::ParseFailed(err));
                    return;
                }
            }
        }
    }
}

impl Stage for FramingStage {
    fn on_command(&mut self, _ctx: &mut PipelineContext, cmd: Command, down: &mut dyn FnMut(Command)) {
        down(cmd);
    }

    fn on_event(&mut self, _ctx: &mut PipelineContext, ev: Event, up: &mut dyn FnMut(Event)) {
        match ev {
            Event::Inbound(bytes) => self.feed(&bytes, up),
            Event::Closed(_) => {
                if let Some(part) = self.parser.on_connection_close() {
                    up(Event::Parsed(part));
                }
                up(ev);
            }
            other => up(other),
        }
    }
}
