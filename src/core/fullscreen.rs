//! Fullscreen and tab-visibility guard.
//!
//! Leaving fullscreen starts a bounded return countdown; running out of
//! time is terminal for the attempt. Hiding the tab is an independent,
//! immediate violation with no countdown.

use crate::core::signals::ViolationKind;
use tracing::{info, warn};

/// Default seconds allowed to return to fullscreen.
pub const DEFAULT_FULLSCREEN_TIMEOUT_SECS: u32 = 30;

/// Guard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Not guarding (before the exam or after it ended)
    Inactive,
    Fullscreen,
    ExitedWaitingReturn { remaining: u32 },
    /// The countdown ran out; nothing more is emitted
    Expired,
}

/// Events emitted by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEvent {
    Violation(ViolationKind),
    ViolationCleared(ViolationKind),
    CountdownTick { remaining: u32 },
    ForceTerminate,
}

#[derive(Debug, Clone)]
pub struct FullscreenGuard {
    timeout_secs: u32,
    state: GuardState,
    tab_hidden_reported: bool,
}

impl FullscreenGuard {
    pub fn new(timeout_secs: u32) -> Self {
        Self {
            timeout_secs,
            state: GuardState::Inactive,
            tab_hidden_reported: false,
        }
    }

    /// Begin guarding. The caller has just entered fullscreen.
    pub fn start(&mut self) {
        self.state = GuardState::Fullscreen;
        self.tab_hidden_reported = false;
    }

    /// Stop guarding and cancel any countdown.
    pub fn stop(&mut self) {
        self.state = GuardState::Inactive;
        self.tab_hidden_reported = false;
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state == GuardState::Fullscreen
    }

    pub fn countdown_active(&self) -> bool {
        matches!(self.state, GuardState::ExitedWaitingReturn { .. })
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        match self.state {
            GuardState::ExitedWaitingReturn { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// Fullscreen was exited.
    pub fn on_fullscreen_exit(&mut self) -> Vec<GuardEvent> {
        if self.state != GuardState::Fullscreen {
            return Vec::new();
        }
        warn!(
            "Fullscreen exited; {}s to return before the attempt ends",
            self.timeout_secs
        );
        self.state = GuardState::ExitedWaitingReturn {
            remaining: self.timeout_secs,
        };
        vec![
            GuardEvent::Violation(ViolationKind::FullscreenExit),
            GuardEvent::CountdownTick {
                remaining: self.timeout_secs,
            },
        ]
    }

    /// Fullscreen was re-entered.
    pub fn on_fullscreen_enter(&mut self) -> Vec<GuardEvent> {
        match self.state {
            GuardState::ExitedWaitingReturn { remaining } => {
                info!("Returned to fullscreen with {remaining}s left");
                self.state = GuardState::Fullscreen;
                vec![GuardEvent::ViolationCleared(ViolationKind::FullscreenExit)]
            }
            _ => Vec::new(),
        }
    }

    /// The tab became hidden. Only reported while the exam is running
    /// unpaused and the guard is fullscreen.
    pub fn on_tab_hidden(&mut self, exam_in_progress: bool) -> Vec<GuardEvent> {
        if !exam_in_progress || self.state != GuardState::Fullscreen || self.tab_hidden_reported {
            return Vec::new();
        }
        warn!("Exam tab hidden");
        self.tab_hidden_reported = true;
        vec![GuardEvent::Violation(ViolationKind::TabHidden)]
    }

    /// The student explicitly confirmed their return to the exam tab.
    pub fn acknowledge_tab_return(&mut self) -> Vec<GuardEvent> {
        if !self.tab_hidden_reported {
            return Vec::new();
        }
        self.tab_hidden_reported = false;
        vec![GuardEvent::ViolationCleared(ViolationKind::TabHidden)]
    }

    /// One second of the return countdown elapsed.
    ///
    /// Emits the remaining time, and `ForceTerminate` exactly once when it
    /// reaches zero.
    pub fn tick(&mut self) -> Vec<GuardEvent> {
        let GuardState::ExitedWaitingReturn { remaining } = self.state else {
            return Vec::new();
        };

        let remaining = remaining.saturating_sub(1);
        if remaining == 0 {
            warn!("Fullscreen return countdown expired");
            self.state = GuardState::Expired;
            return vec![
                GuardEvent::CountdownTick { remaining: 0 },
                GuardEvent::ForceTerminate,
            ];
        }

        self.state = GuardState::ExitedWaitingReturn { remaining };
        vec![GuardEvent::CountdownTick { remaining }]
    }
}

impl Default for FullscreenGuard {
    fn default() -> Self {
        Self::new(DEFAULT_FULLSCREEN_TIMEOUT_SECS)
    }
}
