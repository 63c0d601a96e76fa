//! Pausable exam countdown.

use serde::{Deserialize, Serialize};

/// Snapshot of the exam clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub remaining_seconds: u32,
    pub paused: bool,
}

/// One-shot time-up signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUp;

/// A countdown in whole seconds that fires [`TimeUp`] exactly once.
#[derive(Debug, Clone, Default)]
pub struct ExamTimer {
    state: TimerState,
    running: bool,
    fired: bool,
}

impl ExamTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the countdown. A zero duration fires immediately.
    #[must_use]
    pub fn start(&mut self, duration_secs: u32) -> Option<TimeUp> {
        if self.fired {
            return None;
        }
        self.state = TimerState {
            remaining_seconds: duration_secs,
            paused: false,
        };
        self.running = true;
        self.fire_if_expired()
    }

    /// Pausing only stops the decrement; it never touches the remaining time.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// One second elapsed.
    #[must_use]
    pub fn tick(&mut self) -> Option<TimeUp> {
        if !self.running || self.fired || self.state.paused {
            return None;
        }
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        self.fire_if_expired()
    }

    /// Stop without firing.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.state.remaining_seconds
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    fn fire_if_expired(&mut self) -> Option<TimeUp> {
        if self.state.remaining_seconds == 0 {
            self.fired = true;
            self.running = false;
            Some(TimeUp)
        } else {
            None
        }
    }
}
