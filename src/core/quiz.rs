//! Quiz documents, answers and scoring.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a stored quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(Uuid);

impl QuizId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QuizId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A quiz as stored by the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub topic: String,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// A short built-in quiz used when no quiz file is supplied.
    pub fn sample() -> Self {
        let q = |prompt: &str, options: [&str; 4], correct_index: usize| Question {
            prompt: prompt.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_index,
            explanation: None,
        };
        Self {
            topic: "Rust ownership".to_string(),
            questions: vec![
                q("Which keyword moves a closure's captures by value?", ["ref", "move", "own", "take"], 1),
                q("How many mutable borrows may coexist?", ["0", "1", "2", "unlimited"], 1),
                q("Which trait runs code when a value goes out of scope?", ["Clone", "Copy", "Drop", "Deref"], 2),
                q("What does `?` do on an `Err`?", ["panics", "returns it", "ignores it", "logs it"], 1),
                q("Which type gives shared ownership across threads?", ["Rc", "Box", "Cell", "Arc"], 3),
            ],
        }
    }
}

/// Selected option per question; `None` means unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    selections: Vec<Option<usize>>,
    frozen: bool,
}

impl AnswerSet {
    pub fn new(question_count: usize) -> Self {
        Self {
            selections: vec![None; question_count],
            frozen: false,
        }
    }

    /// Record a selection. Returns `false` if frozen or out of range.
    pub fn select(&mut self, question: usize, option: Option<usize>) -> bool {
        if self.frozen {
            return false;
        }
        match self.selections.get_mut(question) {
            Some(slot) => {
                *slot = option;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, question: usize) -> Option<usize> {
        self.selections.get(question).copied().flatten()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn answered(&self) -> usize {
        self.selections.iter().filter(|s| s.is_some()).count()
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.selections
    }
}

/// Score summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    /// `correct / total * 100`, 0 for an empty quiz
    pub percent: f64,
}

/// Score an answer set against its quiz.
pub fn score(quiz: &Quiz, answers: &AnswerSet) -> Score {
    let total = quiz.len();
    let correct = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i) == Some(q.correct_index))
        .count();
    let percent = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    };
    Score {
        correct,
        total,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_with_skips() {
        let quiz = Quiz::sample();
        let mut answers = AnswerSet::new(quiz.len());
        answers.select(0, Some(1));
        answers.select(1, Some(1));
        answers.select(2, Some(2));

        let s = score(&quiz, &answers);
        assert_eq!(s.correct, 3);
        assert_eq!(s.total, 5);
        assert!((s.percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let quiz = Quiz {
            topic: "empty".to_string(),
            questions: Vec::new(),
        };
        assert_eq!(score(&quiz, &AnswerSet::new(0)).percent, 0.0);
    }

    #[test]
    fn test_frozen_answers_reject_changes() {
        let mut answers = AnswerSet::new(2);
        assert!(answers.select(0, Some(1)));
        answers.freeze();
        assert!(!answers.select(0, Some(0)));
        assert!(!answers.select(1, Some(0)));
        assert_eq!(answers.get(0), Some(1));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut answers = AnswerSet::new(1);
        assert!(!answers.select(3, Some(0)));
        assert!(answers.select(0, None));
        assert_eq!(answers.answered(), 0);
    }
}
