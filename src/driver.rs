//! Connection driver.
//!
//! Owns everything specific to one connection: the pipeline stage
//! chain (framing → statistics → request-timeout, construction order
//! fixing traversal order), the FIFO of in-flight request identifiers
//! used to pair responses with requests in pipelined order, idle-timeout
//! bookkeeping, and — when `confirm_sends` is enabled — the
//! one-chunk-in-flight send gate described by spec §5/§9. The raw socket
//! event loop that calls into this type is an external collaborator;
//! this module only defines the state such a loop would drive.

use crate::parser;
use crate::pipeline::framing::{FramingStage, Role};
use crate::pipeline::statistics::StatisticsStage;
use crate::pipeline::timeout::RequestTimeoutStage;
use crate::pipeline::{Command, Event, PipelineContext, ResponsePart, Stage, Statistics};
use crate::settings::Settings;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a connection was closed. Drives the statistics stage's
/// `idleTimeouts` counter and is otherwise informational.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    IdleTimeout,
    RequestTimeout,
    PeerClosed,
    ConfirmedClose,
    IoError,
}

/// Tunables that live above `Settings` (which only covers parser
/// limits) — the pipeline-level options a connection driver needs.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub settings: Settings,
    /// `None` disables the request-timeout stage.
    pub request_timeout: Option<Duration>,
    /// `None` disables idle-connection closing.
    pub idle_timeout: Option<Duration>,
    pub confirm_sends: bool,
    pub read_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            settings: Settings::default(),
            request_timeout: None,
            idle_timeout: None,
            confirm_sends: false,
            read_buffer_size: 8192,
        }
    }
}

/// Per-connection state: the stage chain, the in-flight request-id
/// queue, and idle bookkeeping. One instance per accepted (or
/// outbound, for a client) connection.
pub struct Connection {
    config: PipelineConfig,
    ctx: PipelineContext,
    framing: FramingStage,
    statistics: StatisticsStage,
    timeout: RequestTimeoutStage,
    request_ids: VecDeque<u64>,
    next_request_id: u64,
    last_activity: Instant,
    close_reason: Option<CloseReason>,
    /// `true` once a `Chunk` has been dispatched and no matching
    /// `SendCompleted` has arrived yet. Only consulted when
    /// `config.confirm_sends` is set.
    chunk_send_in_flight: bool,
    /// `Chunk` parts submitted to `dispatch` while a send was already in
    /// flight; released one at a time as `send_completed` is called.
    pending_chunks: VecDeque<ResponsePart>,
    /// `true` once `StopReading` has been emitted for a growing
    /// `pending_chunks` backlog, until it drains back to empty.
    reading_stopped: bool,
}

impl Connection {
    pub fn new(role: Role, config: PipelineConfig, stats: Arc<Statistics>) -> Connection {
        let ctx = PipelineContext {
            settings: config.settings,
            stats: Arc::clone(&stats),
        };
        Connection {
            framing: FramingStage::new(role, config.settings),
            statistics: StatisticsStage::new(stats),
            timeout: RequestTimeoutStage::new(config.request_timeout),
            config,
            ctx,
            request_ids: VecDeque::new(),
            next_request_id: 0,
            last_activity: Instant::now(),
            close_reason: None,
            chunk_send_in_flight: false,
            pending_chunks: VecDeque::new(),
            reading_stopped: false,
        }
    }

    /// True once this connection has been closed; callers should stop
    /// calling `receive`/`dispatch` afterward.
    pub fn is_closed(&self) -> bool {
        self.close_reason.is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Number of requests that have started but not yet been given a
    /// matching `dispatch(ResponsePart::Start)`.
    pub fn in_flight_count(&self) -> usize {
        self.request_ids.len()
    }

    /// Feeds inbound socket bytes through framing → statistics →
    /// request-timeout, in that order, and returns whatever bubbles up
    /// to the application (message parts, parse failures, fired
    /// timeouts).
    pub fn receive(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.last_activity = Instant::now();
        let mut after_framing = Vec::new();
        self.framing
            .on_event(&mut self.ctx, Event::Inbound(bytes.to_vec()), &mut |e| after_framing.push(e));

        let mut after_statistics = Vec::new();
        for ev in after_framing {
            self.statistics.on_event(&mut self.ctx, ev, &mut |e| after_statistics.push(e));
        }

        let mut out = Vec::new();
        for ev in after_statistics {
            if let Event::Parsed(parser::Event::RequestStart(_)) = &ev {
                self.request_ids.push_back(self.next_request_id);
                self.next_request_id += 1;
            }
            self.timeout.on_event(&mut self.ctx, ev, &mut |e| out.push(e));
        }
        out
    }

    /// Submits an outbound response part through request-timeout →
    /// statistics → framing, in that order (the mirror of `receive`),
    /// returning the commands the socket loop should act on. A `Start`
    /// part pops the oldest in-flight request id immediately — pairing a
    /// response with its request happens the moment the application
    /// decides to answer, independent of whether the bytes are actually
    /// on the wire yet.
    ///
    /// When `config.confirm_sends` is set, `Chunk` parts are gated: only
    /// one is ever handed to the stage chain (and, from there, to the
    /// external renderer/socket) at a time. A `Chunk` submitted while a
    /// previous one is still unacknowledged is queued in
    /// `pending_chunks` and released by [`Connection::send_completed`];
    /// a growing queue emits `StopReading` once, and `ResumeReading` once
    /// it drains, per spec §5's backpressure handshake.
    pub fn dispatch(&mut self, part: ResponsePart) -> Vec<Command> {
        let is_start = matches!(part, ResponsePart::Start);
        if is_start {
            self.request_ids.pop_front();
        }

        let gated = self.config.confirm_sends && matches!(part, ResponsePart::Chunk);
        let mut out = if gated && self.chunk_send_in_flight {
            self.pending_chunks.push_back(part);
            Vec::new()
        } else {
            if gated {
                self.chunk_send_in_flight = true;
            }
            self.dispatch_through_chain(part)
        };

        if self.config.confirm_sends && !self.pending_chunks.is_empty() && !self.reading_stopped {
            self.reading_stopped = true;
            out.push(Command::StopReading);
        }
        out
    }

    /// Called by the socket loop when a previously-submitted outbound
    /// write finishes. A no-op unless `confirm_sends` is set. Releases
    /// the next queued `Chunk`, if any, through the same stage chain
    /// `dispatch` uses, and emits `ResumeReading` once the backlog
    /// drains back to empty.
    pub fn send_completed(&mut self) -> Vec<Command> {
        if !self.config.confirm_sends {
            return Vec::new();
        }
        self.chunk_send_in_flight = false;
        let mut out = match self.pending_chunks.pop_front() {
            Some(part) => {
                self.chunk_send_in_flight = true;
                self.dispatch_through_chain(part)
            }
            None => Vec::new(),
        };
        if self.pending_chunks.is_empty() && self.reading_stopped {
            self.reading_stopped = false;
            out.push(Command::ResumeReading);
        }
        out
    }

    fn dispatch_through_chain(&mut self, part: ResponsePart) -> Vec<Command> {
        let mut after_timeout = Vec::new();
        self.timeout
            .on_command(&mut self.ctx, Command::Response(part), &mut |c| after_timeout.push(c));

        let mut after_statistics = Vec::new();
        for cmd in after_timeout {
            self.statistics.on_command(&mut self.ctx, cmd, &mut |c| after_statistics.push(c));
        }

        let mut out = Vec::new();
        for cmd in after_statistics {
            self.framing.on_command(&mut self.ctx, cmd, &mut |c| out.push(c));
        }
        out
    }

    /// Called by the driver's timer on every tick. Checks the
    /// request-timeout stage and, separately, whether this connection
    /// has been idle past `idle_timeout`.
    pub fn tick(&mut self, now: Instant) -> (Vec<Event>, Vec<Command>) {
        let mut events = Vec::new();
        let mut commands = Vec::new();
        self.timeout
            .poll(now, &mut |e| events.push(e), &mut |c| commands.push(c));

        if !self.is_closed() {
            if let Some(idle) = self.config.idle_timeout {
                if now.saturating_duration_since(self.last_activity) >= idle {
                    events.extend(self.close(CloseReason::IdleTimeout));
                }
            }
        }
        (events, commands)
    }

    /// Marks the connection closed and propagates a `Closed` event
    /// through the stage chain (driving the statistics stage's
    /// `connectionsClosed`/`idleTimeouts` counters). Idempotent: a
    /// second call is a no-op, matching "a Close command
    /// is idempotent".
    pub fn close(&mut self, reason: CloseReason) -> Vec<Event> {
        if self.close_reason.is_some() {
            return Vec::new();
        }
        self.close_reason = Some(reason);

        let mut after_framing = Vec::new();
        self.framing
            .on_event(&mut self.ctx, Event::Closed(reason), &mut |e| after_framing.push(e));
        let mut after_statistics = Vec::new();
        for ev in after_framing {
            self.statistics.on_event(&mut self.ctx, ev, &mut |e| after_statistics.push(e));
        }
        let mut out = Vec::new();
        for ev in after_statistics {
            self.timeout.on_event(&mut self.ctx, ev, &mut |e| out.push(e));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::Framing;
    use crate::pipeline::Statistics;

    fn connection(role: Role) -> Connection {
        Connection::new(role, PipelineConfig::default(), Arc::new(Statistics::new()))
    }

    #[test]
    fn request_response_roundtrip_tracks_in_flight() {
        let mut conn = connection(Role::Server);
        let events = conn.receive(b"GET / HTTP/1.1\r\nHost: a\r\n\r\n");
        assert!(matches!(events[0], Event::Parsed(parser::Event::RequestStart(_))));
        assert_eq!(conn.in_flight_count(), 1);

        conn.dispatch(ResponsePart::Start);
        assert_eq!(conn.in_flight_count(), 0);
    }

    #[test]
    fn pipelined_requests_queue_fifo() {
        let mut conn = connection(Role::Server);
        conn.receive(b"GET /a HTTP/1.1\r\nHost: a\r\n\r\nGET /b HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(conn.in_flight_count(), 2);
        conn.dispatch(ResponsePart::Start);
        assert_eq!(conn.in_flight_count(), 1);
        conn.dispatch(ResponsePart::Start);
        assert_eq!(conn.in_flight_count(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let mut conn = connection(Role::Server);
        let first = conn.close(CloseReason::PeerClosed);
        assert!(!first.is_empty());
        let second = conn.close(CloseReason::IoError);
        assert!(second.is_empty());
        assert_eq!(conn.close_reason(), Some(CloseReason::PeerClosed));
    }

    #[test]
    fn idle_tick_closes_connection() {
        let mut config = PipelineConfig::default();
        config.idle_timeout = Some(Duration::from_millis(1));
        let mut conn = Connection::new(Role::Server, config, Arc::new(Statistics::new()));
        std::thread::sleep(Duration::from_millis(5));
        let (events, _) = conn.tick(Instant::now());
        assert!(events.iter().any(|e| matches!(e, Event::Closed(CloseReason::IdleTimeout))));
        assert!(conn.is_closed());
    }

    #[test]
    fn response_on_http10_without_framing_closes_on_connection_close() {
        let mut conn = connection(Role::Client);
        let events = conn.receive(b"HTTP/1.0 404 Not Found\r\nHost: api.example.com\r\n\r\nFoobs");
        match &events[0] {
            Event::Parsed(parser::Event::ResponseStart(r)) => {
                assert_eq!(r.status, 404);
                assert_eq!(r.framing, Framing::ToClose);
            }
            other => panic!("unexpected first event {:?}", other),
        }
        let closing = conn.close(CloseReason::PeerClosed);
        let body_event = closing
            .into_iter()
            .find(|e| matches!(e, Event::Parsed(parser::Event::Complete(_))))
            .expect("expected a Complete event on close");
        match body_event {
            Event::Parsed(parser::Event::Complete(body)) => assert_eq!(body, b"Foobs"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn confirm_sends_gates_chunks_behind_send_completed() {
        let mut config = PipelineConfig::default();
        config.confirm_sends = true;
        let mut conn = Connection::new(Role::Server, config, Arc::new(Statistics::new()));

        // First chunk goes straight through: no send in flight yet.
        let first = conn.dispatch(ResponsePart::Chunk);
        assert!(first.iter().all(|c| !matches!(c, Command::StopReading)));

        // A second chunk submitted before the first is acknowledged is
        // held back, not forwarded down the stage chain.
        let second = conn.dispatch(ResponsePart::Chunk);
        assert!(second.contains(&Command::StopReading));

        // Acknowledging the first send releases the queued second chunk
        // and, since the backlog is now empty, resumes reading.
        let released = conn.send_completed();
        assert!(released.contains(&Command::ResumeReading));
    }

    #[test]
    fn confirm_sends_disabled_never_gates_chunks() {
        let mut conn = connection(Role::Server);
        conn.dispatch(ResponsePart::Chunk);
        let second = conn.dispatch(ResponsePart::Chunk);
        assert!(!second.iter().any(|c| matches!(c, Command::StopReading)));
        assert!(conn.send_completed().is_empty());
    }

    #[test]
    fn confirm_sends_queue_drains_in_order() {
        let mut config = PipelineConfig::default();
        config.confirm_sends = true;
        let mut conn = Connection::new(Role::Server, config, Arc::new(Statistics::new()));

        conn.dispatch(ResponsePart::Chunk);
        conn.dispatch(ResponsePart::Chunk);
        conn.dispatch(ResponsePart::Chunk);
        assert_eq!(conn.pending_chunks.len(), 2);

        conn.send_completed();
        assert_eq!(conn.pending_chunks.len(), 1);
        conn.send_completed();
        assert_eq!(conn.pending_chunks.len(), 0);
    }
}
