//! Exam results report.
//!
//! A report is built once when the attempt is submitted, optionally
//! enriched with the performance analyzer's feedback, and can be exported
//! as JSON.

use crate::collaborators::{PerformanceReport, PerformanceRequest, QuestionReview};
use crate::core::quiz::{score, AnswerSet, Quiz, QuizId, Score};
use crate::core::signals::{AdvisoryKind, ViolationRecord};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The current report format version.
pub const REPORT_VERSION: &str = "1.0";

/// The name of this producer.
pub const PRODUCER_NAME: &str = "exam-proctor";

/// Why the attempt was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    /// The student ended the exam
    UserEnded,
    /// The exam clock ran out
    TimeUp,
    /// The student did not return to fullscreen in time
    FullscreenTimeout,
}

impl std::fmt::Display for SubmitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitReason::UserEnded => write!(f, "ended by student"),
            SubmitReason::TimeUp => write!(f, "time up"),
            SubmitReason::FullscreenTimeout => write!(f, "fullscreen return timeout"),
        }
    }
}

/// Producer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: Uuid,
}

/// Results of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResults {
    pub report_version: String,
    pub producer: ReportProducer,
    pub attempt_id: Uuid,
    pub quiz_id: QuizId,
    pub topic: String,
    pub score: Score,
    pub review: Vec<QuestionReview>,
    pub submit_reason: SubmitReason,
    pub violations: Vec<ViolationRecord>,
    pub advisories: BTreeMap<AdvisoryKind, u32>,
    /// Feedback from the performance analyzer, when it succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PerformanceReport>,
    /// Why feedback is missing, when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    pub workstation: String,
    pub submitted_at: DateTime<Utc>,
    pub submitted_at_local: String,
    pub timezone: String,
}

impl ExamResults {
    /// Results without performance feedback.
    pub fn is_partial(&self) -> bool {
        self.analysis.is_none()
    }

    /// The request to send to the performance analyzer.
    pub fn performance_request(&self) -> PerformanceRequest {
        PerformanceRequest {
            topic: self.topic.clone(),
            questions: self.review.clone(),
        }
    }

    pub fn attach_analysis(&mut self, outcome: Result<PerformanceReport, String>) {
        match outcome {
            Ok(report) => {
                self.analysis = Some(report);
                self.analysis_error = None;
            }
            Err(e) => {
                self.analysis = None;
                self.analysis_error = Some(e);
            }
        }
    }

    /// Write the report as `attempt_<timestamp>_<id>.json` into `dir`.
    pub fn export(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "attempt_{}_{}.json",
            self.submitted_at.format("%Y%m%d_%H%M%S"),
            &self.attempt_id.to_string()[..8]
        ));
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let violations_secs: i64 = self.violations.iter().map(|v| v.duration_secs()).sum();
        let mut text = format!(
            "Results: {}\n\
             - Score: {:.1}% ({}/{} correct)\n\
             - Submitted: {} ({})\n\
             - Violations: {} ({}s paused)\n\
             - Advisories: {}",
            self.topic,
            self.score.percent,
            self.score.correct,
            self.score.total,
            self.submitted_at_local,
            self.submit_reason,
            self.violations.len(),
            violations_secs,
            self.advisories.values().sum::<u32>(),
        );
        match (&self.analysis, &self.analysis_error) {
            (Some(report), _) => {
                for s in &report.strengths {
                    text.push_str(&format!("\n  + {s}"));
                }
                for w in &report.weaknesses {
                    text.push_str(&format!("\n  - {w}"));
                }
                for s in &report.suggestions {
                    text.push_str(&format!("\n  > {s}"));
                }
            }
            (None, Some(e)) => text.push_str(&format!("\n- Feedback unavailable: {e}")),
            (None, None) => {}
        }
        text
    }
}

/// Everything frozen at submission time.
pub struct Submission<'a> {
    pub attempt_id: Uuid,
    pub quiz_id: QuizId,
    pub quiz: &'a Quiz,
    pub answers: &'a AnswerSet,
    pub reason: SubmitReason,
    pub violations: Vec<ViolationRecord>,
    pub advisories: &'a HashMap<AdvisoryKind, u32>,
}

/// Builder for results reports.
pub struct ResultsBuilder {
    instance_id: Uuid,
    timezone: Tz,
}

impl ResultsBuilder {
    /// Create a builder with a unique instance ID, reporting in UTC.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            timezone: Tz::UTC,
        }
    }

    /// Report local submission time in this timezone.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn build(&self, submission: Submission<'_>) -> ExamResults {
        let submitted_at = Utc::now();
        let review = PerformanceRequest::from_attempt(submission.quiz, submission.answers).questions;

        let workstation = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        ExamResults {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                instance_id: self.instance_id,
            },
            attempt_id: submission.attempt_id,
            quiz_id: submission.quiz_id,
            topic: submission.quiz.topic.clone(),
            score: score(submission.quiz, submission.answers),
            review,
            submit_reason: submission.reason,
            violations: submission.violations,
            advisories: submission
                .advisories
                .iter()
                .map(|(kind, count)| (*kind, *count))
                .collect(),
            analysis: None,
            analysis_error: None,
            workstation,
            submitted_at,
            submitted_at_local: submitted_at.with_timezone(&self.timezone).to_rfc3339(),
            timezone: self.timezone.to_string(),
        }
    }
}

impl Default for ResultsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(reason: SubmitReason) -> ExamResults {
        let quiz = Quiz::sample();
        let mut answers = AnswerSet::new(quiz.len());
        answers.select(0, Some(1));
        answers.select(4, Some(3));
        let advisories = HashMap::from([(AdvisoryKind::Phone, 2)]);

        ResultsBuilder::new()
            .with_timezone(chrono_tz::Europe::Berlin)
            .build(Submission {
                attempt_id: Uuid::new_v4(),
                quiz_id: QuizId::new(),
                quiz: &quiz,
                answers: &answers,
                reason,
                violations: Vec::new(),
                advisories: &advisories,
            })
    }

    #[test]
    fn test_results_score_and_metadata() {
        let results = build(SubmitReason::TimeUp);
        assert_eq!(results.score.correct, 2);
        assert!((results.score.percent - 40.0).abs() < 1e-9);
        assert_eq!(results.producer.name, PRODUCER_NAME);
        assert_eq!(results.timezone, "Europe/Berlin");
        assert_eq!(results.advisories[&AdvisoryKind::Phone], 2);
        assert!(results.is_partial());
    }

    #[test]
    fn test_results_json_serialization() {
        let mut results = build(SubmitReason::FullscreenTimeout);
        results.attach_analysis(Err("analyzer down".to_string()));

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["submit_reason"], "fullscreen_timeout");
        assert_eq!(json["analysis_error"], "analyzer down");
        assert!(json.get("analysis").is_none());
        assert_eq!(json["advisories"]["phone"], 2);
    }

    #[test]
    fn test_summary_mentions_missing_feedback() {
        let mut results = build(SubmitReason::UserEnded);
        results.attach_analysis(Err("timeout".to_string()));
        let summary = results.summary();
        assert!(summary.contains("Score: 40.0%"));
        assert!(summary.contains("Feedback unavailable"));
    }

    #[test]
    fn test_export_writes_file() {
        let results = build(SubmitReason::UserEnded);
        let dir = std::env::temp_dir().join(format!("exam-proctor-export-{}", results.attempt_id));
        let path = results.export(&dir).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: ExamResults = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.attempt_id, results.attempt_id);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
