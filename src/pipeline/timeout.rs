//! Request-timeout stage (server only).

use super::{Command, Event, Notification, PipelineContext, ResponsePart, Stage};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tracks the wall-clock start of every in-flight request (FIFO, since
/// responses on one connection are written in submission order and
/// therefore pair with requests oldest-first) and fires a timeout when
/// the oldest one has been waiting too long.
pub struct RequestTimeoutStage {
    request_timeout: Option<Duration>,
    in_flight: VecDeque<Instant>,
}

impl RequestTimeoutStage {
    /// `request_timeout: None` disables the stage entirely.
    pub fn new(request_timeout: Option<Duration>) -> RequestTimeoutStage {
        RequestTimeoutStage {
            request_timeout,
            in_flight: VecDeque::new(),
        }
    }

    /// Called by the driver on every timer tick. Fires at most one
    /// timeout per call — the oldest in-flight request, if it has
    /// overstayed `request_timeout`. A subsequent response (observed
    /// via `on_command`) cancels the pending timer for that request.
    pub fn poll(&mut self, now: Instant, up: &mut dyn FnMut(Event), down: &mut dyn FnMut(Command)) {
        let limit = match self.request_timeout {
            Some(d) => d,
            None => return,
        };
        if let Some(&start) = self.in_flight.front() {
            if now.saturating_duration_since(start) >= limit {
                self.in_flight.pop_front();
                down(Command::Tell(Notification::RequestTimeout));
                up(Event::RequestTimeout);
            }
        }
    }
}

impl Stage for RequestTimeoutStage {
    fn on_command(&mut self, _ctx: &mut PipelineContext, cmd: Command, down: &mut dyn FnMut(Command)) {
        if let Command::Response(ResponsePart::Start) = &cmd {
            self.in_flight.pop_front();
        }
        down(cmd);
    }

    fn on_event(&mut self, _ctx: &mut PipelineContext, ev: Event, up: &mut dyn FnMut(Event)) {
        if let Event::Parsed(crate::parser::Event::RequestStart(_)) = &ev {
            self.in_flight.push_back(Instant::now());
        }
        up(ev);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_once_oldest_request_overstays() {
        let mut stage = RequestTimeoutStage::new(Some(Duration::from_millis(10)));
        let started = Instant::now() - Duration::from_millis(50);
        stage.in_flight.push_back(started);

        let mut events = Vec::new();
        let mut commands = Vec::new();
        stage.poll(Instant::now(), &mut |e| events.push(e), &mut |c| commands.push(c));

        assert_eq!(events, vec![Event::RequestTimeout]);
        assert_eq!(commands, vec![Command::Tell(Notification::RequestTimeout)]);
        assert!(stage.in_flight.is_empty());
    }

    #[test]
    fn response_cancels_pending_timer() {
        let mut stage = RequestTimeoutStage::new(Some(Duration::from_secs(30)));
        stage.in_flight.push_back(Instant::now());
        let mut ctx = PipelineContext {
            settings: crate::settings::Settings::default(),
            stats: std::sync::Arc::new(crate::pipeline::Statistics::new()),
        };
        stage.on_command(&mut ctx, Command::Response(ResponsePart::Start), &mut |_| {});
        assert!(stage.in_flight.is_empty());
    }

    #[test]
    fn disabled_stage_never_fires() {
        let mut stage = RequestTimeoutStage::new(None);
        stage.in_flight.push_back(Instant::now() - Duration::from_secs(1000));
        let mut fired = false;
        stage.poll(Instant::now(), &mut |_| fired = true, &mut |_| {});
        assert!(!fired);
    }
}
