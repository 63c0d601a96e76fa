//! Scripted collaborators for demos and tests.

use crate::collaborators::{
    CollaboratorError, PerformanceAnalyzer, PerformanceReport, PerformanceRequest, VisualAnalyzer,
};
use crate::core::signals::SampleResult;
use crate::device::Frame;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Visual analyzer replaying queued verdicts, then a fallback verdict.
#[derive(Debug)]
pub struct ScriptedVisualAnalyzer {
    replies: Mutex<VecDeque<Result<SampleResult, CollaboratorError>>>,
    fallback: Result<SampleResult, CollaboratorError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedVisualAnalyzer {
    /// Analyzer that reports every frame as `fallback` once the queue is empty.
    pub fn new(fallback: SampleResult) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(fallback),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Analyzer whose every call fails.
    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Build from a presence script such as `"absent,absent,present"`.
    ///
    /// Recognised entries: `present`, `absent`, `phone`, `book`, `away`,
    /// `error`. Unknown entries are treated as `present`.
    pub fn from_script(script: &str) -> Self {
        let analyzer = Self::new(SampleResult::present());
        for entry in script.split(',').map(|s| s.trim().to_lowercase()) {
            let reply = match entry.as_str() {
                "absent" => Ok(SampleResult::absent()),
                "phone" => Ok(SampleResult {
                    phone_detected: true,
                    ..SampleResult::present()
                }),
                "book" => Ok(SampleResult {
                    book_detected: true,
                    ..SampleResult::present()
                }),
                "away" => Ok(SampleResult {
                    looking_away: true,
                    ..SampleResult::present()
                }),
                "error" => Err(CollaboratorError::Network("scripted failure".to_string())),
                "" => continue,
                _ => Ok(SampleResult::present()),
            };
            analyzer.push(reply);
        }
        analyzer
    }

    /// Delay every reply, to simulate a slow classifier.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, reply: Result<SampleResult, CollaboratorError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Number of frames classified so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl VisualAnalyzer for ScriptedVisualAnalyzer {
    async fn classify(&self, _frame: &Frame) -> Result<SampleResult, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Performance analyzer returning a fixed reply.
#[derive(Debug)]
pub struct ScriptedPerformanceAnalyzer {
    reply: Result<PerformanceReport, CollaboratorError>,
    calls: AtomicUsize,
}

impl ScriptedPerformanceAnalyzer {
    pub fn new(report: PerformanceReport) -> Self {
        Self {
            reply: Ok(report),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: CollaboratorError) -> Self {
        Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply derived from the request: correct answers become strengths,
    /// wrong or skipped ones weaknesses.
    pub fn echo() -> Self {
        Self::new(PerformanceReport::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PerformanceAnalyzer for ScriptedPerformanceAnalyzer {
    async fn analyze(
        &self,
        request: &PerformanceRequest,
    ) -> Result<PerformanceReport, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let mut report = self.reply.clone()?;
        if report == PerformanceReport::default() {
            for question in &request.questions {
                if question.is_correct() {
                    report.strengths.push(question.prompt.clone());
                } else {
                    report.weaknesses.push(question.prompt.clone());
                }
            }
        }
        Ok(report)
    }
}
