//! Proctoring audit log.
//!
//! Tracks what the proctor observed and decided, as counters only. No
//! frames, audio or answers are stored here.

use crate::core::signals::ViolationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Audit counters for the current process.
#[derive(Debug)]
pub struct AuditLog {
    /// Frames classified by the visual analyzer
    samples_analysed: AtomicU64,
    /// Ticks without a usable frame
    samples_skipped: AtomicU64,
    /// Failed classification calls
    analysis_errors: AtomicU64,
    fullscreen_exits: AtomicU64,
    tabs_hidden: AtomicU64,
    human_absent: AtomicU64,
    mic_inactive: AtomicU64,
    /// Advisory notifications (book, phone, looking away)
    advisories: AtomicU64,
    /// Attempts ended by the fullscreen countdown
    forced_terminations: AtomicU64,
    sessions_submitted: AtomicU64,
    /// Log start time
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            samples_analysed: AtomicU64::new(0),
            samples_skipped: AtomicU64::new(0),
            analysis_errors: AtomicU64::new(0),
            fullscreen_exits: AtomicU64::new(0),
            tabs_hidden: AtomicU64::new(0),
            human_absent: AtomicU64::new(0),
            mic_inactive: AtomicU64::new(0),
            advisories: AtomicU64::new(0),
            forced_terminations: AtomicU64::new(0),
            sessions_submitted: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that accumulates into `path` across runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous audit stats: {e}");
        }

        log
    }

    pub fn record_sample_analysed(&self) {
        self.samples_analysed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample_skipped(&self) {
        self.samples_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis_error(&self) {
        self.analysis_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_violation(&self, kind: ViolationKind) {
        let counter = match kind {
            ViolationKind::FullscreenExit => &self.fullscreen_exits,
            ViolationKind::TabHidden => &self.tabs_hidden,
            ViolationKind::HumanAbsent => &self.human_absent,
            ViolationKind::MicInactive => &self.mic_inactive,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_advisory(&self) {
        self.advisories.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forced_termination(&self) {
        self.forced_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_submitted(&self) {
        self.sessions_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            samples_analysed: self.samples_analysed.load(Ordering::Relaxed),
            samples_skipped: self.samples_skipped.load(Ordering::Relaxed),
            analysis_errors: self.analysis_errors.load(Ordering::Relaxed),
            fullscreen_exits: self.fullscreen_exits.load(Ordering::Relaxed),
            tabs_hidden: self.tabs_hidden.load(Ordering::Relaxed),
            human_absent: self.human_absent.load(Ordering::Relaxed),
            mic_inactive: self.mic_inactive.load(Ordering::Relaxed),
            advisories: self.advisories.load(Ordering::Relaxed),
            forced_terminations: self.forced_terminations.load(Ordering::Relaxed),
            sessions_submitted: self.sessions_submitted.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Proctoring Audit:\n\
             - Frames analysed: {}\n\
             - Frames skipped: {}\n\
             - Analysis errors: {}\n\
             - Fullscreen exits: {}\n\
             - Tab switches: {}\n\
             - Absence pauses: {}\n\
             - Silent-microphone pauses: {}\n\
             - Advisories: {}\n\
             - Forced terminations: {}\n\
             - Attempts submitted: {}\n\
             \n\
             Retention:\n\
             - Frames are sent for classification and not stored\n\
             - Microphone input is reduced to a loudness level",
            stats.samples_analysed,
            stats.samples_skipped,
            stats.analysis_errors,
            stats.fullscreen_exits,
            stats.tabs_hidden,
            stats.human_absent,
            stats.mic_inactive,
            stats.advisories,
            stats.forced_terminations,
            stats.sessions_submitted,
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_analysed: stats.samples_analysed,
                samples_skipped: stats.samples_skipped,
                analysis_errors: stats.analysis_errors,
                fullscreen_exits: stats.fullscreen_exits,
                tabs_hidden: stats.tabs_hidden,
                human_absent: stats.human_absent,
                mic_inactive: stats.mic_inactive,
                advisories: stats.advisories,
                forced_terminations: stats.forced_terminations,
                sessions_submitted: stats.sessions_submitted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_analysed
                    .store(persisted.samples_analysed, Ordering::Relaxed);
                self.samples_skipped
                    .store(persisted.samples_skipped, Ordering::Relaxed);
                self.analysis_errors
                    .store(persisted.analysis_errors, Ordering::Relaxed);
                self.fullscreen_exits
                    .store(persisted.fullscreen_exits, Ordering::Relaxed);
                self.tabs_hidden.store(persisted.tabs_hidden, Ordering::Relaxed);
                self.human_absent
                    .store(persisted.human_absent, Ordering::Relaxed);
                self.mic_inactive
                    .store(persisted.mic_inactive, Ordering::Relaxed);
                self.advisories.store(persisted.advisories, Ordering::Relaxed);
                self.forced_terminations
                    .store(persisted.forced_terminations, Ordering::Relaxed);
                self.sessions_submitted
                    .store(persisted.sessions_submitted, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.samples_analysed,
            &self.samples_skipped,
            &self.analysis_errors,
            &self.fullscreen_exits,
            &self.tabs_hidden,
            &self.human_absent,
            &self.mic_inactive,
            &self.advisories,
            &self.forced_terminations,
            &self.sessions_submitted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of audit statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub samples_analysed: u64,
    pub samples_skipped: u64,
    pub analysis_errors: u64,
    pub fullscreen_exits: u64,
    pub tabs_hidden: u64,
    pub human_absent: u64,
    pub mic_inactive: u64,
    pub advisories: u64,
    pub forced_terminations: u64,
    pub sessions_submitted: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_analysed: u64,
    samples_skipped: u64,
    analysis_errors: u64,
    fullscreen_exits: u64,
    tabs_hidden: u64,
    human_absent: u64,
    mic_inactive: u64,
    advisories: u64,
    forced_terminations: u64,
    sessions_submitted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_counting() {
        let log = AuditLog::new();

        log.record_sample_analysed();
        log.record_sample_analysed();
        log.record_violation(ViolationKind::FullscreenExit);
        log.record_violation(ViolationKind::HumanAbsent);
        log.record_violation(ViolationKind::HumanAbsent);

        let stats = log.stats();
        assert_eq!(stats.samples_analysed, 2);
        assert_eq!(stats.fullscreen_exits, 1);
        assert_eq!(stats.human_absent, 2);
        assert_eq!(stats.mic_inactive, 0);
    }

    #[test]
    fn test_audit_log_reset() {
        let log = AuditLog::new();
        log.record_analysis_error();
        log.record_forced_termination();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.analysis_errors, 0);
        assert_eq!(stats.forced_terminations, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let path = std::env::temp_dir()
            .join(format!("exam-proctor-audit-{}", uuid::Uuid::new_v4()))
            .join("audit.json");

        let log = AuditLog::with_persistence(path.clone());
        log.record_session_submitted();
        log.save().unwrap();

        let reloaded = AuditLog::with_persistence(path.clone());
        reloaded.record_session_submitted();
        assert_eq!(reloaded.stats().sessions_submitted, 2);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_summary_format() {
        let summary = AuditLog::new().summary();
        assert!(summary.contains("Frames analysed"));
        assert!(summary.contains("Fullscreen exits"));
        assert!(summary.contains("Retention"));
    }
}
