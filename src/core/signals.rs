//! Signals produced by the environment sampler and the fullscreen guard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict of the visual-anomaly classifier for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResult {
    pub human_present: bool,
    #[serde(default)]
    pub book_detected: bool,
    #[serde(default)]
    pub phone_detected: bool,
    #[serde(default)]
    pub looking_away: bool,
    #[serde(default)]
    pub reason: String,
}

impl SampleResult {
    /// A clean frame: a person present, nothing suspicious.
    pub fn present() -> Self {
        Self {
            human_present: true,
            ..Self::default()
        }
    }

    /// A frame with nobody in it.
    pub fn absent() -> Self {
        Self {
            human_present: false,
            reason: "no person detected".to_string(),
            ..Self::default()
        }
    }

    /// Advisory anomalies detected in this frame.
    pub fn advisories(&self) -> Vec<AdvisoryKind> {
        let mut found = Vec::new();
        if self.book_detected {
            found.push(AdvisoryKind::Book);
        }
        if self.phone_detected {
            found.push(AdvisoryKind::Phone);
        }
        if self.looking_away {
            found.push(AdvisoryKind::LookingAway);
        }
        found
    }
}

/// One completed sampling tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// The frame was analysed
    Analysed { result: SampleResult, mic_active: bool },
    /// No frame could be captured (video surface not ready)
    Skipped { mic_active: bool },
}

impl Sample {
    pub fn mic_active(&self) -> bool {
        match self {
            Sample::Analysed { mic_active, .. } | Sample::Skipped { mic_active } => *mic_active,
        }
    }
}

/// Conditions that pause the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    FullscreenExit,
    TabHidden,
    HumanAbsent,
    MicInactive,
}

impl ViolationKind {
    /// Presence violations come from the sampler; the rest from the fullscreen guard.
    pub fn is_presence(self) -> bool {
        matches!(self, ViolationKind::HumanAbsent | ViolationKind::MicInactive)
    }

    /// Message shown while this violation holds the exam paused.
    pub fn message(self) -> &'static str {
        match self {
            ViolationKind::FullscreenExit => "You left fullscreen. Return to fullscreen to continue.",
            ViolationKind::TabHidden => "You switched away from the exam. Return and confirm to continue.",
            ViolationKind::HumanAbsent => "You are not visible to the camera. Sit in front of it to continue.",
            ViolationKind::MicInactive => "Your microphone is not picking up any sound. Check it to continue.",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::TabHidden => "tab_hidden",
            ViolationKind::HumanAbsent => "human_absent",
            ViolationKind::MicInactive => "mic_inactive",
        };
        write!(f, "{name}")
    }
}

/// Advisory anomalies: notified, never pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    Book,
    Phone,
    LookingAway,
}

impl std::fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdvisoryKind::Book => write!(f, "book detected"),
            AdvisoryKind::Phone => write!(f, "phone detected"),
            AdvisoryKind::LookingAway => write!(f, "looking away"),
        }
    }
}

/// A pause-causing violation, open or closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    pub started_at: DateTime<Utc>,
    /// Grace ticks that had elapsed when the record was opened
    pub grace_checks_elapsed: u32,
    /// Set when the violation clears
    pub ended_at: Option<DateTime<Utc>>,
}

impl ViolationRecord {
    pub fn open(kind: ViolationKind, grace_checks_elapsed: u32) -> Self {
        Self {
            kind,
            started_at: Utc::now(),
            grace_checks_elapsed,
            ended_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Seconds the violation lasted (so far, if still open).
    pub fn duration_secs(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_result_wire_names() {
        let json = r#"{"humanPresent":true,"phoneDetected":true,"reason":"phone in hand"}"#;
        let result: SampleResult = serde_json::from_str(json).unwrap();
        assert!(result.human_present);
        assert!(!result.book_detected);
        assert_eq!(result.advisories(), vec![AdvisoryKind::Phone]);
    }

    #[test]
    fn test_presence_kinds() {
        assert!(ViolationKind::HumanAbsent.is_presence());
        assert!(ViolationKind::MicInactive.is_presence());
        assert!(!ViolationKind::FullscreenExit.is_presence());
        assert!(!ViolationKind::TabHidden.is_presence());
    }
}
