//! Core proctoring components.
//!
//! This module contains:
//! - Environment sampling (camera frames, microphone activity)
//! - The fullscreen/tab-visibility guard
//! - Violation aggregation and the grace period
//! - The exam countdown
//! - Quiz answers, scoring and the results report

pub mod audio;
pub mod fullscreen;
pub mod quiz;
pub mod results;
pub mod sampler;
pub mod signals;
pub mod timer;
pub mod violations;

// Re-export commonly used types
pub use audio::MicActivityDetector;
pub use fullscreen::{FullscreenGuard, GuardEvent, GuardState};
pub use quiz::{score, AnswerSet, Question, Quiz, QuizId, Score};
pub use results::{ExamResults, ResultsBuilder, SubmitReason, PRODUCER_NAME, REPORT_VERSION};
pub use sampler::{AnalysisRequest, EnvironmentSampler, SamplerEvent, SuppressReason, TickOutcome};
pub use signals::{AdvisoryKind, Sample, SampleResult, ViolationKind, ViolationRecord};
pub use timer::{ExamTimer, TimeUp, TimerState};
pub use violations::{AggregatorEvent, ViolationAggregator};
