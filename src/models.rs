use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionType {
    SingleAnswer,
    MultipleChoice,
    TrueFalse,
    /// Any other label an author typed; kept verbatim.
    Other(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::SingleAnswer => "SingleAnswer",
            QuestionType::MultipleChoice => "MultipleChoice",
            QuestionType::TrueFalse => "TrueFalse",
            QuestionType::Other(label) => label,
        }
    }

    /// Instruction line shown when the author did not write one.
    pub fn default_instructions(question_type: Option<&QuestionType>) -> &'static str {
        match question_type {
            Some(QuestionType::MultipleChoice) => "Please select all that apply:",
            Some(QuestionType::SingleAnswer) | Some(QuestionType::TrueFalse) => {
                "Please select the correct answer:"
            }
            _ => "Please answer the question:",
        }
    }
}

impl From<String> for QuestionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SingleAnswer" => QuestionType::SingleAnswer,
            "MultipleChoice" => QuestionType::MultipleChoice,
            "TrueFalse" => QuestionType::TrueFalse,
            _ => QuestionType::Other(value),
        }
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        match value {
            QuestionType::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    #[serde(default)]
    pub question_num: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
    pub question: String,
    pub instructions: String,
    pub answers: Vec<String>,
    pub correct: Vec<u32>,
    #[serde(default)]
    pub selection: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// A validated quiz that has not been given an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewQuiz {
    pub title: String,
    pub questions: Vec<QuestionDefinition>,
}

impl NewQuiz {
    pub fn into_definition(self, id: u32) -> QuizDefinition {
        QuizDefinition {
            id,
            title: self.title,
            questions: self.questions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizDefinition {
    pub id: u32,
    pub title: String,
    pub questions: Vec<QuestionDefinition>,
}

impl QuizDefinition {
    /// Drops any test-taker state so the definition can be served or stored.
    pub fn cleared(mut self) -> Self {
        for question in &mut self.questions {
            question.selection.clear();
            question.is_correct = None;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: u32,
    pub title: String,
    pub question_count: usize,
}

impl From<&QuizDefinition> for QuizSummary {
    fn from(quiz: &QuizDefinition) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            question_count: quiz.questions.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_num: u32,
    pub selection: Vec<u32>,
    pub correct: Vec<u32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub quiz_id: u32,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub questions: Vec<QuestionResult>,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub grade: String,
    /// Seconds spent on the quiz, as reported by the session.
    pub duration: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
        }
    }

    /// Issue attributed to the question at 0-based `index`.
    pub fn question(index: usize, field: &str, issue: impl fmt::Display) -> Self {
        let field = if field.is_empty() {
            format!("questions[{index}]")
        } else {
            format!("questions[{index}].{field}")
        };
        Self {
            field,
            issue: format!("Question {}: {}", index + 1, issue),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.issue)
    }
}
