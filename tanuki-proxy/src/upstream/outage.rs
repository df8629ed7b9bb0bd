//! Connection-outage smoothing for upstream links.
//!
//! The raw `connected` flag flaps on every missed poll; alarming on it
//! directly produces noise. `OutageAlarm` applies hysteresis: the link is
//! only declared down after it has been continuously unreachable for a
//! debounce window (2x the poll interval), and is declared recovered the
//! instant it answers again. `check()` reports edge transitions exactly
//! once, so callers log on exactly the edges and nothing else.
//!
//! # State machine
//!
//! ```text
//!        check(down)             elapsed >= debounce
//!  Up ──────────────► Flaky ──────────────────────► Outage
//!   ▲                   │                              │
//!   │     check(up)     │                              │
//!   └───────────────────┘                              │
//!   ▲                              check(up)           │
//!   └──────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use tokio::time::Instant;

/// Result of [`OutageAlarm::check`], describing the smoothed link state
/// and any transition that just occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Link is up, nothing pending.
    Up,

    /// Link is down but still within the debounce window. Not yet an
    /// outage.
    Flaky,

    /// Debounce elapsed -- an outage just started. Returned exactly once
    /// per episode.
    OutageStarted,

    /// Outage previously reported and the link is still down.
    OutageOngoing,

    /// The link answered again after a reported outage. Returned exactly
    /// once.
    Restored,
}

#[derive(Debug)]
enum State {
    Up,
    Flaky(Instant),
    Outage,
}

/// Debounced outage detector for one upstream link.
#[derive(Debug)]
pub struct OutageAlarm {
    debounce: Duration,
    state: State,
}

impl OutageAlarm {
    /// Create an alarm that declares an outage after the link has been
    /// down for `debounce`.
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: State::Up,
        }
    }

    /// Conventional debounce for a given poll cadence: two full polls
    /// must go unanswered before an outage is declared.
    pub fn for_poll_interval(poll_interval: Duration) -> Self {
        Self::new(poll_interval * 2)
    }

    /// Feed the current raw link state (`true` = reachable).
    pub fn check(&mut self, connected: bool) -> LinkStatus {
        match (&self.state, connected) {
            (State::Up, true) => LinkStatus::Up,

            (State::Up, false) => {
                self.state = State::Flaky(Instant::now());
                LinkStatus::Flaky
            }

            // Recovery inside the window never surfaced, so nothing to
            // report on the way back up either.
            (State::Flaky(_), true) => {
                self.state = State::Up;
                LinkStatus::Up
            }

            (State::Flaky(since), false) => {
                if since.elapsed() >= self.debounce {
                    self.state = State::Outage;
                    LinkStatus::OutageStarted
                } else {
                    LinkStatus::Flaky
                }
            }

            (State::Outage, true) => {
                self.state = State::Up;
                LinkStatus::Restored
            }

            (State::Outage, false) => LinkStatus::OutageOngoing,
        }
    }
}
