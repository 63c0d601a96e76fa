//! Violation aggregation: the single writer of pause state.
//!
//! Presence signals (camera, microphone), fullscreen exits and hidden tabs
//! each hold at most one open record in their own slot. The exam is paused
//! while any slot is occupied. For display, fullscreen wins over the tab,
//! and both win over presence.

use crate::core::signals::{AdvisoryKind, Sample, ViolationKind, ViolationRecord};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default number of analysed samples before presence violations count.
pub const DEFAULT_GRACE_TICKS: u32 = 3;

/// Events emitted by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorEvent {
    Raised(ViolationKind),
    Cleared(ViolationKind),
    /// One-shot advisory notification
    Advisory(AdvisoryKind),
}

#[derive(Debug, Clone)]
pub struct ViolationAggregator {
    grace_threshold: u32,
    grace_elapsed: u32,
    presence: Option<ViolationRecord>,
    fullscreen: Option<ViolationRecord>,
    tab: Option<ViolationRecord>,
    history: Vec<ViolationRecord>,
    advisories: HashMap<AdvisoryKind, u32>,
}

impl ViolationAggregator {
    pub fn new(grace_threshold: u32) -> Self {
        Self {
            grace_threshold,
            grace_elapsed: 0,
            presence: None,
            fullscreen: None,
            tab: None,
            history: Vec::new(),
            advisories: HashMap::new(),
        }
    }

    /// Whether any violation currently holds the exam paused.
    pub fn is_paused(&self) -> bool {
        self.presence.is_some() || self.fullscreen.is_some() || self.tab.is_some()
    }

    /// The violation shown to the student.
    pub fn active(&self) -> Option<&ViolationRecord> {
        self.fullscreen
            .as_ref()
            .or(self.tab.as_ref())
            .or(self.presence.as_ref())
    }

    pub fn presence_violation(&self) -> Option<ViolationKind> {
        self.presence.as_ref().map(|r| r.kind)
    }

    /// The screen violation shown ahead of any presence violation.
    pub fn screen_violation(&self) -> Option<ViolationKind> {
        self.fullscreen.as_ref().or(self.tab.as_ref()).map(|r| r.kind)
    }

    /// Whether a hidden tab is still waiting for acknowledgement.
    pub fn tab_hidden_open(&self) -> bool {
        self.tab.is_some()
    }

    pub fn grace_elapsed(&self) -> u32 {
        self.grace_elapsed
    }

    pub fn in_grace_period(&self) -> bool {
        self.grace_elapsed < self.grace_threshold
    }

    /// Consume a completed sample.
    ///
    /// Skipped samples carry no verdict and change nothing. Analysed
    /// samples advance the grace counter; once it reaches the threshold a
    /// missing person or a silent microphone opens a presence violation,
    /// and a clean sample closes it.
    pub fn on_sample(&mut self, sample: &Sample) -> Vec<AggregatorEvent> {
        let Sample::Analysed { result, mic_active } = sample else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for advisory in result.advisories() {
            *self.advisories.entry(advisory).or_insert(0) += 1;
            info!("Advisory: {advisory}");
            events.push(AggregatorEvent::Advisory(advisory));
        }

        if self.in_grace_period() {
            self.grace_elapsed += 1;
        }
        if self.in_grace_period() {
            debug!(
                "Grace period: {}/{} samples",
                self.grace_elapsed, self.grace_threshold
            );
            return events;
        }

        let wanted = if !result.human_present {
            Some(ViolationKind::HumanAbsent)
        } else if !mic_active {
            Some(ViolationKind::MicInactive)
        } else {
            None
        };

        match (wanted, self.presence.as_ref().map(|r| r.kind)) {
            (Some(kind), Some(current)) if kind == current => {}
            (Some(kind), current) => {
                if let Some(current) = current {
                    self.close_presence();
                    events.push(AggregatorEvent::Cleared(current));
                }
                warn!("Presence violation: {kind}");
                self.presence = Some(ViolationRecord::open(kind, self.grace_elapsed));
                events.push(AggregatorEvent::Raised(kind));
            }
            (None, Some(current)) => {
                info!("Presence violation cleared: {current}");
                self.close_presence();
                events.push(AggregatorEvent::Cleared(current));
            }
            (None, None) => {}
        }

        events
    }

    /// A screen violation (fullscreen exit, tab hidden) was raised.
    ///
    /// The two kinds never displace each other: a fullscreen exit while the
    /// tab is hidden leaves the tab record open until it is acknowledged.
    pub fn on_screen_violation(&mut self, kind: ViolationKind) -> Vec<AggregatorEvent> {
        let grace_elapsed = self.grace_elapsed;
        let Some(slot) = self.screen_slot(kind) else {
            return Vec::new();
        };
        if slot.is_some() {
            return Vec::new();
        }
        *slot = Some(ViolationRecord::open(kind, grace_elapsed));
        vec![AggregatorEvent::Raised(kind)]
    }

    /// A screen violation was resolved.
    pub fn on_screen_cleared(&mut self, kind: ViolationKind) -> Vec<AggregatorEvent> {
        let Some(record) = self.screen_slot(kind).and_then(Option::take) else {
            return Vec::new();
        };
        self.close(record);
        vec![AggregatorEvent::Cleared(kind)]
    }

    /// Close any open records (the session is ending).
    pub fn close_all(&mut self) {
        for record in [self.fullscreen.take(), self.tab.take(), self.presence.take()]
            .into_iter()
            .flatten()
        {
            self.close(record);
        }
    }

    /// All records in the order they were closed, followed by open ones.
    pub fn records(&self) -> Vec<ViolationRecord> {
        self.history
            .iter()
            .chain(self.fullscreen.iter())
            .chain(self.tab.iter())
            .chain(self.presence.iter())
            .cloned()
            .collect()
    }

    pub fn advisory_counts(&self) -> &HashMap<AdvisoryKind, u32> {
        &self.advisories
    }

    fn screen_slot(&mut self, kind: ViolationKind) -> Option<&mut Option<ViolationRecord>> {
        match kind {
            ViolationKind::FullscreenExit => Some(&mut self.fullscreen),
            ViolationKind::TabHidden => Some(&mut self.tab),
            _ => None,
        }
    }

    fn close_presence(&mut self) {
        if let Some(record) = self.presence.take() {
            self.close(record);
        }
    }

    fn close(&mut self, mut record: ViolationRecord) {
        record.ended_at = Some(Utc::now());
        self.history.push(record);
    }
}

impl Default for ViolationAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_TICKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signals::SampleResult;

    fn analysed(human: bool, mic: bool) -> Sample {
        Sample::Analysed {
            result: if human {
                SampleResult::present()
            } else {
                SampleResult::absent()
            },
            mic_active: mic,
        }
    }

    #[test]
    fn test_grace_period_suppresses_presence() {
        let mut aggregator = ViolationAggregator::new(3);
        assert!(aggregator.on_sample(&analysed(false, false)).is_empty());
        assert!(aggregator.on_sample(&analysed(false, false)).is_empty());
        assert!(!aggregator.is_paused());

        let events = aggregator.on_sample(&analysed(false, true));
        assert_eq!(events, vec![AggregatorEvent::Raised(ViolationKind::HumanAbsent)]);
        assert!(aggregator.is_paused());
    }

    #[test]
    fn test_skipped_samples_do_not_count_toward_grace() {
        let mut aggregator = ViolationAggregator::new(1);
        aggregator.on_sample(&Sample::Skipped { mic_active: false });
        assert_eq!(aggregator.grace_elapsed(), 0);
        assert!(!aggregator.is_paused());
    }

    #[test]
    fn test_presence_clears_on_clean_sample() {
        let mut aggregator = ViolationAggregator::new(0);
        aggregator.on_sample(&analysed(false, true));
        let events = aggregator.on_sample(&analysed(true, true));
        assert_eq!(events, vec![AggregatorEvent::Cleared(ViolationKind::HumanAbsent)]);
        assert!(!aggregator.is_paused());
        assert_eq!(aggregator.records().len(), 1);
        assert!(!aggregator.records()[0].is_open());
    }

    #[test]
    fn test_mic_inactive_replaces_human_absent() {
        let mut aggregator = ViolationAggregator::new(0);
        aggregator.on_sample(&analysed(false, false));
        assert_eq!(aggregator.presence_violation(), Some(ViolationKind::HumanAbsent));

        let events = aggregator.on_sample(&analysed(true, false));
        assert_eq!(
            events,
            vec![
                AggregatorEvent::Cleared(ViolationKind::HumanAbsent),
                AggregatorEvent::Raised(ViolationKind::MicInactive),
            ]
        );
        assert!(aggregator.is_paused());
    }

    #[test]
    fn test_screen_violation_keeps_pause_after_presence_clears() {
        let mut aggregator = ViolationAggregator::new(0);
        aggregator.on_sample(&analysed(false, true));
        aggregator.on_screen_violation(ViolationKind::FullscreenExit);
        assert_eq!(aggregator.active().map(|r| r.kind), Some(ViolationKind::FullscreenExit));

        aggregator.on_sample(&analysed(true, true));
        assert!(aggregator.is_paused());
        assert_eq!(aggregator.active().map(|r| r.kind), Some(ViolationKind::FullscreenExit));

        aggregator.on_screen_cleared(ViolationKind::FullscreenExit);
        assert!(!aggregator.is_paused());
    }

    #[test]
    fn test_advisories_never_pause() {
        let mut aggregator = ViolationAggregator::new(0);
        let sample = Sample::Analysed {
            result: SampleResult {
                human_present: true,
                book_detected: true,
                phone_detected: true,
                ..SampleResult::default()
            },
            mic_active: true,
        };
        let events = aggregator.on_sample(&sample);
        assert!(events.contains(&AggregatorEvent::Advisory(AdvisoryKind::Book)));
        assert!(events.contains(&AggregatorEvent::Advisory(AdvisoryKind::Phone)));
        assert!(!aggregator.is_paused());
        assert_eq!(aggregator.advisory_counts()[&AdvisoryKind::Phone], 1);
    }

    #[test]
    fn test_fullscreen_exit_does_not_displace_hidden_tab() {
        let mut aggregator = ViolationAggregator::default();
        aggregator.on_screen_violation(ViolationKind::TabHidden);

        let events = aggregator.on_screen_violation(ViolationKind::FullscreenExit);
        assert_eq!(events, vec![AggregatorEvent::Raised(ViolationKind::FullscreenExit)]);
        assert_eq!(aggregator.screen_violation(), Some(ViolationKind::FullscreenExit));

        aggregator.on_screen_cleared(ViolationKind::FullscreenExit);
        assert!(aggregator.is_paused());
        assert!(aggregator.tab_hidden_open());
        assert_eq!(aggregator.active().map(|r| r.kind), Some(ViolationKind::TabHidden));

        aggregator.on_screen_cleared(ViolationKind::TabHidden);
        assert!(!aggregator.is_paused());
        assert_eq!(aggregator.records().len(), 2);
    }

    #[test]
    fn test_clearing_wrong_screen_kind_is_noop() {
        let mut aggregator = ViolationAggregator::default();
        aggregator.on_screen_violation(ViolationKind::TabHidden);
        assert!(aggregator.on_screen_cleared(ViolationKind::FullscreenExit).is_empty());
        assert!(aggregator.is_paused());
    }
}
