//! Scheduled-task state machine shared by both sync loops
//!
//! A [`Poller`] never performs I/O. The owner asks it whether a fetch is
//! due, runs the fetch however it likes, and reports completion with the
//! [`Ticket`] it was given. Starting or stopping the poller invalidates
//! every outstanding ticket, so late results from a cancelled run are
//! recognised and dropped.
//!
//! Within one poller at most one fetch is in flight. Timer ticks that come
//! due while a fetch is outstanding are skipped; a forced fetch requested
//! meanwhile runs as soon as the current one completes.

use log::debug;
use std::time::{Duration, Instant};

use super::timing::{deadline_reached, next_tick_after};

/// Proof that a fetch was started by a particular run of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    seq: u64,
}

impl Ticket {
    /// Run the ticket belongs to; bumped on every start and stop
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Observable poller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Stopped,
    Idle,
    Fetching,
}

#[derive(Debug)]
pub struct Poller {
    name: &'static str,
    period: Duration,
    generation: u64,
    seq: u64,
    running: bool,
    in_flight: Option<Ticket>,
    next_tick: Option<Instant>,
    forced: bool,
}

impl Poller {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            generation: 0,
            seq: 0,
            running: false,
            in_flight: None,
            next_tick: None,
            forced: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PollState {
        match (self.running, self.in_flight) {
            (false, _) => PollState::Stopped,
            (true, None) => PollState::Idle,
            (true, Some(_)) => PollState::Fetching,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Begin a fresh run with an immediate first tick.
    ///
    /// Any fetch still in flight from a previous run becomes stale.
    pub fn start(&mut self, now: Instant) {
        self.generation += 1;
        self.running = true;
        self.in_flight = None;
        self.next_tick = Some(now);
        self.forced = false;
        debug!("{} poller started (run {})", self.name, self.generation);
    }

    /// Cancel the timer and invalidate any in-flight fetch
    pub fn stop(&mut self) {
        if !self.running && self.in_flight.is_none() {
            return;
        }
        self.generation += 1;
        self.running = false;
        self.in_flight = None;
        self.next_tick = None;
        self.forced = false;
        debug!("{} poller stopped", self.name);
    }

    /// Request one fetch ahead of the timer.
    ///
    /// Returns `false` if the poller is stopped.
    pub fn force(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.forced = true;
        true
    }

    /// Start a fetch if one is due at `now`
    pub fn poll_due(&mut self, now: Instant) -> Option<Ticket> {
        if !self.running || self.in_flight.is_some() {
            return None;
        }

        let timer_due = deadline_reached(self.next_tick, now);
        if !timer_due && !self.forced {
            return None;
        }

        if timer_due {
            self.next_tick = self
                .next_tick
                .map(|tick| next_tick_after(tick, self.period, now));
        }
        self.forced = false;

        self.seq += 1;
        let ticket = Ticket {
            generation: self.generation,
            seq: self.seq,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Record that the fetch for `ticket` finished.
    ///
    /// Returns `false` when the ticket is stale and its result must be
    /// discarded.
    pub fn complete(&mut self, ticket: Ticket, now: Instant) -> bool {
        if self.in_flight != Some(ticket) {
            debug!(
                "{} poller discarding stale result (run {}, current {})",
                self.name, ticket.generation, self.generation
            );
            return false;
        }

        self.in_flight = None;
        if deadline_reached(self.next_tick, now) {
            self.next_tick = self
                .next_tick
                .map(|tick| next_tick_after(tick, self.period, now));
        }
        true
    }

    /// When the owner should next call [`Poller::poll_due`]; `None` while
    /// stopped or fetching
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if !self.running || self.in_flight.is_some() {
            return None;
        }
        if self.forced {
            return Some(now);
        }
        self.next_tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(5);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_stopped_poller_never_fires() {
        let mut poller = Poller::new("test", PERIOD);
        let now = Instant::now();
        assert_eq!(poller.state(), PollState::Stopped);
        assert!(poller.poll_due(now).is_none());
        assert!(!poller.force());
        assert_eq!(poller.next_deadline(now), None);
    }

    #[test]
    fn test_first_tick_is_immediate() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        assert_eq!(poller.next_deadline(t0), Some(t0));
        assert!(poller.poll_due(t0).is_some());
        assert_eq!(poller.state(), PollState::Fetching);
    }

    #[test]
    fn test_fixed_period_schedule() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);

        let ticket = poller.poll_due(t0).unwrap();
        assert!(poller.complete(ticket, t0 + secs(1)));
        assert!(poller.poll_due(t0 + secs(4)).is_none());
        assert_eq!(poller.next_deadline(t0 + secs(4)), Some(t0 + secs(5)));
        assert!(poller.poll_due(t0 + secs(5)).is_some());
    }

    #[test]
    fn test_no_overlapping_fetches() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);

        let ticket = poller.poll_due(t0).unwrap();
        // Timer fires twice while the first fetch hangs
        assert!(poller.poll_due(t0 + secs(5)).is_none());
        assert!(poller.poll_due(t0 + secs(10)).is_none());
        assert_eq!(poller.next_deadline(t0 + secs(10)), None);

        // Missed ticks are skipped, not replayed
        assert!(poller.complete(ticket, t0 + secs(12)));
        assert!(poller.poll_due(t0 + secs(12)).is_none());
        assert_eq!(poller.next_deadline(t0 + secs(12)), Some(t0 + secs(15)));
    }

    #[test]
    fn test_force_while_idle_runs_now() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        let ticket = poller.poll_due(t0).unwrap();
        poller.complete(ticket, t0);

        assert!(poller.force());
        assert_eq!(poller.next_deadline(t0 + secs(1)), Some(t0 + secs(1)));
        assert!(poller.poll_due(t0 + secs(1)).is_some());
    }

    #[test]
    fn test_force_while_fetching_is_queued() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        let first = poller.poll_due(t0).unwrap();

        assert!(poller.force());
        assert!(poller.poll_due(t0 + secs(1)).is_none());

        assert!(poller.complete(first, t0 + secs(2)));
        let second = poller.poll_due(t0 + secs(2)).unwrap();
        assert_ne!(first, second);

        // Force is consumed; timer schedule is untouched
        assert!(poller.complete(second, t0 + secs(3)));
        assert!(poller.poll_due(t0 + secs(3)).is_none());
        assert_eq!(poller.next_deadline(t0 + secs(3)), Some(t0 + secs(5)));
    }

    #[test]
    fn test_stop_discards_in_flight_result() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        let ticket = poller.poll_due(t0).unwrap();

        poller.stop();
        assert!(!poller.complete(ticket, t0 + secs(1)));
        assert_eq!(poller.state(), PollState::Stopped);
    }

    #[test]
    fn test_restart_discards_previous_run() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        let old = poller.poll_due(t0).unwrap();

        poller.start(t0 + secs(1));
        let fresh = poller.poll_due(t0 + secs(1)).unwrap();
        assert!(fresh.generation() > old.generation());

        assert!(!poller.complete(old, t0 + secs(2)));
        assert_eq!(poller.state(), PollState::Fetching);
        assert!(poller.complete(fresh, t0 + secs(2)));
    }

    #[test]
    fn test_duplicate_completion_is_ignored() {
        let mut poller = Poller::new("test", PERIOD);
        let t0 = Instant::now();
        poller.start(t0);
        let ticket = poller.poll_due(t0).unwrap();
        assert!(poller.complete(ticket, t0));
        assert!(!poller.complete(ticket, t0));
    }
}
