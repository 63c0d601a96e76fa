//! External collaborators consumed by the session controller.
//!
//! - **Visual anomaly classifier**: one base64 frame in, a [`SampleResult`] out
//! - **Quiz content store**: create/read quiz documents
//! - **Performance analyzer**: best-effort strengths/weaknesses feedback
//!
//! In-memory, file-backed and scripted implementations live here; HTTP
//! clients are available behind the `remote` feature.

mod memory;
mod scripted;

#[cfg(feature = "remote")]
pub mod remote;

pub use memory::{FileQuizStore, InMemoryQuizStore};
pub use scripted::{ScriptedPerformanceAnalyzer, ScriptedVisualAnalyzer};

#[cfg(feature = "remote")]
pub use remote::{
    RemoteConfig, RemotePerformanceAnalyzer, RemoteQuizStore, RemoteVisualAnalyzer,
};

use crate::core::quiz::{AnswerSet, Quiz, QuizId};
use crate::core::signals::SampleResult;
use crate::device::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Classifies a camera frame.
#[async_trait]
pub trait VisualAnalyzer: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<SampleResult, CollaboratorError>;
}

/// Stores and loads quiz documents.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn save(&self, draft: &Quiz) -> Result<QuizId, CollaboratorError>;

    /// # Errors
    ///
    /// Returns `CollaboratorError::NotFound` if no quiz has this id.
    async fn get(&self, id: QuizId) -> Result<Quiz, CollaboratorError>;
}

/// Produces feedback on a finished attempt.
#[async_trait]
pub trait PerformanceAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        request: &PerformanceRequest,
    ) -> Result<PerformanceReport, CollaboratorError>;
}

/// One question as seen by the performance analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub student_index: Option<usize>,
}

impl QuestionReview {
    pub fn is_correct(&self) -> bool {
        self.student_index == Some(self.correct_index)
    }
}

/// Input to the performance analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRequest {
    pub topic: String,
    pub questions: Vec<QuestionReview>,
}

impl PerformanceRequest {
    pub fn from_attempt(quiz: &Quiz, answers: &AnswerSet) -> Self {
        let questions = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionReview {
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                correct_index: q.correct_index,
                student_index: answers.get(i),
            })
            .collect();
        Self {
            topic: quiz.topic.clone(),
            questions,
        }
    }
}

/// Feedback produced by the performance analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub explanations: Vec<String>,
}

/// Collaborator error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// No quiz with this id
    NotFound(QuizId),
    /// Network/transport error
    Network(String),
    /// Collaborator returned an error response
    Server { status: u16, message: String },
    /// Payload could not be (de)serialized
    Serialization(String),
    /// The call did not complete in time
    Timeout,
    /// Local storage error
    Io(String),
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorError::NotFound(id) => write!(f, "Quiz {id} not found"),
            CollaboratorError::Network(msg) => write!(f, "Network error: {msg}"),
            CollaboratorError::Server { status, message } => {
                write!(f, "Server error ({status}): {message}")
            }
            CollaboratorError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            CollaboratorError::Timeout => write!(f, "Request timed out"),
            CollaboratorError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}
