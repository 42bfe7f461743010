//! Statistics stage: process-wide, lock-free counters, built on atomics
//! rather than a mutex since these counters are read far more often
//! than they're written and cross connection/task boundaries.

use super::{Command, Event, Notification, PipelineContext, ResponsePart, Stage};
use crate::driver::CloseReason;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A consistent-enough read of the counter set at an instant. Individual
/// fields are read with relaxed ordering — this is a snapshot, not a
/// transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    pub uptime_ms: u64,
    pub total_requests: u64,
    pub open_requests: u64,
    pub max_open_requests: u64,
    pub total_connections: u64,
    pub open_connections: u64,
    pub max_open_connections: u64,
    pub request_timeouts: u64,
    pub idle_timeouts: u64,
}

/// The shared counter set. One instance per process, handed to every
/// connection's pipeline via [`super::PipelineContext`].
pub struct Statistics {
    started_at: Instant,
    request_starts: AtomicU64,
    response_starts: AtomicU64,
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    request_timeouts: AtomicU64,
    idle_timeouts: AtomicU64,
    max_open_connections: AtomicU64,
    max_open_requests: AtomicU64,
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics {
            started_at: Instant::now(),
            request_starts: AtomicU64::new(0),
            response_starts: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            request_timeouts: AtomicU64::new(0),
            idle_timeouts: AtomicU64::new(0),
            max_open_connections: AtomicU64::new(0),
            max_open_requests: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> Stats {
        let total_requests = self.request_starts.load(Ordering::Relaxed);
        let response_starts = self.response_starts.load(Ordering::Relaxed);
        let total_connections = self.connections_opened.load(Ordering::Relaxed);
        let connections_closed = self.connections_closed.load(Ordering::Relaxed);
        Stats {
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
            total_requests,
            open_requests: total_requests.saturating_sub(response_starts),
            max_open_requests: self.max_open_requests.load(Ordering::Relaxed),
            total_connections,
            open_connections: total_connections.saturating_sub(connections_closed),
            max_open_connections: self.max_open_connections.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Resets every counter to zero. Uptime is not a counter and keeps
    /// running.
    pub fn clear(&self) {
        self.request_starts.store(0, Ordering::Relaxed);
        self.response_starts.store(0, Ordering::Relaxed);
        self.connections_opened.store(0, Ordering::Relaxed);
        self.connections_closed.store(0, Ordering::Relaxed);
        self.request_timeouts.store(0, Ordering::Relaxed);
        self.idle_timeouts.store(0, Ordering::Relaxed);
        self.max_open_connections.store(0, Ordering::Relaxed);
        self.max_open_requests.store(0, Ordering::Relaxed);
    }

    fn note_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        self.bump_open_connections();
    }

    fn note_connection_closed(&self, reason: CloseReason) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        if reason == CloseReason::IdleTimeout {
            self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn note_request_start(&self) {
        self.request_starts.fetch_add(1, Ordering::Relaxed);
        self.bump_open_requests();
    }

    fn note_response_start(&self) {
        self.response_starts.fetch_add(1, Ordering::Relaxed);
    }

    fn note_request_timeout(&self) {
        self.request_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // Deliberately racy: `open` is computed from two counters read
    // independently of the CAS that follows, the same relaxed
    // "eventually-max" semantics the source exhibits. Preserved intentionally rather
    // than fixed with, say, a single packed atomic.
    fn bump_open_connections(&self) {
        let open = self
            .connections_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_closed.load(Ordering::Relaxed));
        adjust_max(&self.max_open_connections, open);
    }

    fn bump_open_requests(&self) {
        let open = self
            .request_starts
            .load(Ordering::Relaxed)
            .saturating_sub(self.response_starts.load(Ordering::Relaxed));
        adjust_max(&self.max_open_requests, open);
    }
}

fn adjust_max(counter: &AtomicU64, candidate: u64) {
    let mut current = counter.load(Ordering::Relaxed);
    while candidate > current {
        match counter.compare_exchange_weak(current, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Observes command/event traffic and updates the shared [`Statistics`].
/// One instance is built per connection (construction increments
/// `connectionsOpened`, matching "pipeline construction, once
/// per connection" trigger); the `Arc<Statistics>` underneath is shared
/// process-wide.
pub struct StatisticsStage {
    stats: Arc<Statistics>,
}

impl StatisticsStage {
    pub fn new(stats: Arc<Statistics>) -> StatisticsStage {
        stats.note_connection_opened();
        StatisticsStage { stats }
    }
}

impl Stage for StatisticsStage {
    fn on_command(&mut self, _ctx: &mut PipelineContext, cmd: Command, down: &mut dyn FnMut(Command)) {
        match &cmd {
            Command::Response(ResponsePart::Start) => self.stats.note_response_start(),
            Command::Tell(Notification::RequestTimeout) => self.stats.note_request_timeout(),
            _ => {}
        }
        down(cmd);
    }

    fn on_event(&mut self, _ctx: &mut PipelineContext, ev: Event, up: &mut dyn FnMut(Event)) {
        match &ev {
            Event::Parsed(crate::parser::Event::RequestStart(_)) => self.stats.note_request_start(),
            Event::Closed(reason) => self.stats.note_connection_closed(*reason),
            _ => {}
        }
        up(ev);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_requests_and_responses() {
        let stats = Arc::new(Statistics::new());
        let mut stage = StatisticsStage::new(Arc::clone(&stats));
        let mut ctx = PipelineContext {
            settings: crate::settings::Settings::default(),
            stats: Arc::clone(&stats),
        };
        let req = crate::message::RequestStart {
            method: crate::method::Method::Get,
            target: b"/".to_vec(),
            version: crate::version::Version::Http11,
            headers: Vec::new(),
            framing: crate::message::Framing::Complete,
        };
        stage.on_event(&mut ctx, Event::Parsed(crate::parser::Event::RequestStart(req)), &mut |_| {});
        stage.on_command(&mut ctx, Command::Response(ResponsePart::Start), &mut |_| {});

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 1);
        assert_eq!(snap.open_requests, 0);
        assert_eq!(snap.total_connections, 1);
        assert_eq!(snap.max_open_requests, 1);
    }

    #[test]
    fn idle_timeout_increments_both_counters() {
        let stats = Arc::new(Statistics::new());
        let mut stage = StatisticsStage::new(Arc::clone(&stats));
        let mut ctx = PipelineContext {
            settings: crate::settings::Settings::default(),
            stats: Arc::clone(&stats),
        };
        stage.on_event(&mut ctx, Event::Closed(CloseReason::IdleTimeout), &mut |_| {});
        let snap = stats.snapshot();
        assert_eq!(snap.idle_timeouts, 1);
        assert_eq!(snap.open_connections, 0);
    }

    #[test]
    fn clear_resets_counters() {
        let stats = Arc::new(Statistics::new());
        let _stage = StatisticsStage::new(Arc::clone(&stats));
        stats.clear();
        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 0);
    }

    #[test]
    fn adjust_max_is_monotonic_even_under_loss() {
        let counter = AtomicU64::new(5);
        adjust_max(&counter, 3);
        assert_eq!(counter.load(Ordering::Relaxed), 5);
        adjust_max(&counter, 9);
        assert_eq!(counter.load(Ordering::Relaxed), 9);
    }
}
