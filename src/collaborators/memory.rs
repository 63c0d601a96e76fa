//! Quiz stores backed by memory or by JSON files on disk.

use crate::collaborators::{CollaboratorError, QuizStore};
use crate::core::quiz::{Quiz, QuizId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Thread-safe in-memory quiz store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuizStore {
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.quizzes
            .lock()
            .map(|quizzes| quizzes.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QuizStore for InMemoryQuizStore {
    async fn save(&self, draft: &Quiz) -> Result<QuizId, CollaboratorError> {
        let id = QuizId::new();
        let mut quizzes = self
            .quizzes
            .lock()
            .map_err(|_| CollaboratorError::Io("quiz store lock poisoned".to_string()))?;
        quizzes.insert(id, draft.clone());
        Ok(id)
    }

    async fn get(&self, id: QuizId) -> Result<Quiz, CollaboratorError> {
        let quizzes = self
            .quizzes
            .lock()
            .map_err(|_| CollaboratorError::Io("quiz store lock poisoned".to_string()))?;
        quizzes.get(&id).cloned().ok_or(CollaboratorError::NotFound(id))
    }
}

/// Quiz store keeping one pretty-printed JSON document per quiz.
#[derive(Debug, Clone)]
pub struct FileQuizStore {
    dir: PathBuf,
}

impl FileQuizStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: QuizId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl QuizStore for FileQuizStore {
    async fn save(&self, draft: &Quiz) -> Result<QuizId, CollaboratorError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;

        let id = QuizId::new();
        let json = serde_json::to_string_pretty(draft)
            .map_err(|e| CollaboratorError::Serialization(e.to_string()))?;
        tokio::fs::write(self.path_for(id), json)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;
        Ok(id)
    }

    async fn get(&self, id: QuizId) -> Result<Quiz, CollaboratorError> {
        let content = match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CollaboratorError::NotFound(id))
            }
            Err(e) => return Err(CollaboratorError::Io(e.to_string())),
        };
        serde_json::from_str(&content).map_err(|e| CollaboratorError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip_and_not_found() {
        let store = InMemoryQuizStore::new();
        let id = store.save(&Quiz::sample()).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Quiz::sample());

        let missing = QuizId::new();
        assert_eq!(store.get(missing).await, Err(CollaboratorError::NotFound(missing)));
    }

    #[tokio::test]
    async fn test_file_store_persists_documents() {
        let dir = std::env::temp_dir().join(format!("exam-proctor-quizzes-{}", QuizId::new()));
        let store = FileQuizStore::new(&dir);

        let id = store.save(&Quiz::sample()).await.unwrap();
        assert!(dir.join(format!("{id}.json")).exists());

        // A fresh store over the same directory sees the document.
        let reopened = FileQuizStore::new(&dir);
        assert_eq!(reopened.get(id).await.unwrap().topic, "Rust ownership");
        assert!(matches!(
            reopened.get(QuizId::new()).await,
            Err(CollaboratorError::NotFound(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
