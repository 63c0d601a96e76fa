//! HTTP clients for remote collaborators.
//!
//! All three collaborators share one base URL and bearer token:
//!
//! - `POST {base}/v1/vision/analyze` - `{ "image": "<base64>" }` in, [`SampleResult`] out
//! - `POST {base}/v1/quizzes` - quiz in, `{ "id": "<uuid>" }` out
//! - `GET  {base}/v1/quizzes/{id}` - quiz out, 404 when missing
//! - `POST {base}/v1/performance` - [`PerformanceRequest`] in, [`PerformanceReport`] out

use crate::collaborators::{
    CollaboratorError, PerformanceAnalyzer, PerformanceReport, PerformanceRequest, QuizStore,
    VisualAnalyzer,
};
use crate::core::quiz::{Quiz, QuizId};
use crate::core::signals::SampleResult;
use crate::device::Frame;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote collaborator configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `EXAM_PROCTOR_REMOTE_URL` and `EXAM_PROCTOR_REMOTE_TOKEN`.
    pub fn from_env() -> Result<Self, CollaboratorError> {
        let base_url = std::env::var("EXAM_PROCTOR_REMOTE_URL").map_err(|_| {
            CollaboratorError::Network("EXAM_PROCTOR_REMOTE_URL is not set".to_string())
        })?;
        let token = std::env::var("EXAM_PROCTOR_REMOTE_TOKEN").unwrap_or_default();
        Ok(Self::new(base_url, token))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn vision_url(&self) -> String {
        format!("{}/v1/vision/analyze", self.base_url)
    }

    pub fn quizzes_url(&self) -> String {
        format!("{}/v1/quizzes", self.base_url)
    }

    pub fn quiz_url(&self, id: QuizId) -> String {
        format!("{}/v1/quizzes/{id}", self.base_url)
    }

    pub fn performance_url(&self) -> String {
        format!("{}/v1/performance", self.base_url)
    }
}

/// Shared HTTP plumbing.
#[derive(Debug, Clone)]
struct RemoteClient {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl RemoteClient {
    fn new(config: RemoteConfig) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: String,
        body: &T,
    ) -> Result<R, CollaboratorError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;
        decode(response).await
    }

    async fn get<R: DeserializeOwned>(&self, url: String) -> Result<R, CollaboratorError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.config.token))
            .send()
            .await
            .map_err(map_transport)?;
        decode(response).await
    }
}

fn map_transport(e: reqwest::Error) -> CollaboratorError {
    if e.is_timeout() {
        CollaboratorError::Timeout
    } else {
        CollaboratorError::Network(e.to_string())
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, CollaboratorError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(CollaboratorError::Server {
            status: status.as_u16(),
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| CollaboratorError::Serialization(e.to_string()))
}

#[derive(Serialize)]
struct VisionRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct SavedQuiz {
    id: QuizId,
}

/// Visual anomaly classifier over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteVisualAnalyzer {
    inner: RemoteClient,
}

impl RemoteVisualAnalyzer {
    pub fn new(config: RemoteConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            inner: RemoteClient::new(config)?,
        })
    }
}

#[async_trait]
impl VisualAnalyzer for RemoteVisualAnalyzer {
    async fn classify(&self, frame: &Frame) -> Result<SampleResult, CollaboratorError> {
        let body = VisionRequest {
            image: &frame.image_base64,
        };
        self.inner.post(self.inner.config.vision_url(), &body).await
    }
}

/// Quiz content store over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteQuizStore {
    inner: RemoteClient,
}

impl RemoteQuizStore {
    pub fn new(config: RemoteConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            inner: RemoteClient::new(config)?,
        })
    }
}

#[async_trait]
impl QuizStore for RemoteQuizStore {
    async fn save(&self, draft: &Quiz) -> Result<QuizId, CollaboratorError> {
        let saved: SavedQuiz = self.inner.post(self.inner.config.quizzes_url(), draft).await?;
        Ok(saved.id)
    }

    async fn get(&self, id: QuizId) -> Result<Quiz, CollaboratorError> {
        match self.inner.get(self.inner.config.quiz_url(id)).await {
            Err(CollaboratorError::Server { status: 404, .. }) => Err(CollaboratorError::NotFound(id)),
            other => other,
        }
    }
}

/// Performance analyzer over HTTP.
#[derive(Debug, Clone)]
pub struct RemotePerformanceAnalyzer {
    inner: RemoteClient,
}

impl RemotePerformanceAnalyzer {
    pub fn new(config: RemoteConfig) -> Result<Self, CollaboratorError> {
        Ok(Self {
            inner: RemoteClient::new(config)?,
        })
    }
}

#[async_trait]
impl PerformanceAnalyzer for RemotePerformanceAnalyzer {
    async fn analyze(
        &self,
        request: &PerformanceRequest,
    ) -> Result<PerformanceReport, CollaboratorError> {
        self.inner
            .post(self.inner.config.performance_url(), request)
            .await
    }
}
