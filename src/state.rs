use crate::auth::Authenticator;
use crate::config::Config;
use crate::decoder::{decode, SourceFormat};
use crate::history::AttemptHistory;
use crate::models::{Attempt, NewQuiz, QuizDefinition, QuizSummary, ValidationIssue};
use crate::parser::{parse_quiz, ParseError, QuizDraft};
use crate::scoring::{score_attempt, unanswered_questions};
use crate::store::{QuizStore, StoreError};
use crate::{allocator, validation};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How often a create retries after losing an id to a concurrent writer.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("quiz validation failed")]
    Invalid(Vec<ValidationIssue>),
    #[error("A quiz with the title \"{title}\" already exists (ID: {existing_id})")]
    DuplicateTitle { title: String, existing_id: u32 },
    #[error("Quiz not found (ID: {0})")]
    NotFound(u32),
    #[error("could not claim a quiz id after {0} attempts")]
    AllocationExhausted(usize),
    #[error("failed to encode quiz draft: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            other => ServiceError::Store(other),
        }
    }
}

/// Result of parsing authoring text without storing anything.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub quiz: QuizDraft,
    pub issues: Vec<ValidationIssue>,
    pub proposed_quiz_id: u32,
    pub duplicate_of: Option<u32>,
}

#[derive(Clone)]
pub struct AppState {
    pub quizzes: Arc<dyn QuizStore>,
    pub history: Arc<dyn AttemptHistory>,
    pub auth: Arc<dyn Authenticator>,
    pub config: Arc<Config>,
    /// Serialises the title check, id choice and write of concurrent creates.
    create_guard: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        quizzes: Arc<dyn QuizStore>,
        history: Arc<dyn AttemptHistory>,
        auth: Arc<dyn Authenticator>,
        config: Config,
    ) -> Self {
        Self {
            quizzes,
            history,
            auth,
            config: Arc::new(config),
            create_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Id of a stored quiz whose title matches `title`, ignoring case.
    pub async fn find_title(&self, title: &str) -> Result<Option<u32>, ServiceError> {
        let wanted = title.trim().to_lowercase();
        for id in self.quizzes.list().await? {
            match self.quizzes.get(id).await {
                Ok(existing) if existing.title.trim().to_lowercase() == wanted => {
                    return Ok(Some(id));
                }
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(StoreError::Corrupt { location, source }) => {
                    warn!("skipping unreadable quiz {}: {}", location, source);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    /// Stores `quiz` under the lowest free id. Creates run one at a time and
    /// every retry repeats the title check.
    pub async fn create_quiz(&self, quiz: NewQuiz) -> Result<QuizDefinition, ServiceError> {
        let _guard = self.create_guard.lock().await;

        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            if let Some(existing_id) = self.find_title(&quiz.title).await? {
                return Err(ServiceError::DuplicateTitle {
                    title: quiz.title,
                    existing_id,
                });
            }

            let id = allocator::next_quiz_id(self.quizzes.list().await?);
            let definition = quiz.clone().into_definition(id);
            match self.quizzes.put(id, &definition).await {
                Ok(()) => {
                    info!("quiz created: {} (id {})", definition.title, id);
                    return Ok(definition);
                }
                Err(StoreError::Conflict(_)) => {
                    warn!("quiz id {} taken concurrently, retrying (attempt {})", id, attempt);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ServiceError::AllocationExhausted(MAX_ALLOCATION_ATTEMPTS))
    }

    /// JSON submission. Any `id` in the candidate is ignored; the store assigns one.
    pub async fn submit_candidate(&self, candidate: &Value) -> Result<QuizDefinition, ServiceError> {
        let quiz = validation::accept(candidate).map_err(ServiceError::Invalid)?;
        self.create_quiz(quiz).await
    }

    pub async fn submit_text(
        &self,
        raw: &str,
        format: SourceFormat,
    ) -> Result<QuizDefinition, ServiceError> {
        let draft = parse_quiz(&decode(raw, format))?;
        let quiz = validation::accept(&validation::draft_candidate(&draft)?)
            .map_err(ServiceError::Invalid)?;
        self.create_quiz(quiz).await
    }

    pub async fn preview_text(&self, raw: &str, format: SourceFormat) -> Result<Preview, ServiceError> {
        let draft = parse_quiz(&decode(raw, format))?;
        let issues = validation::validate_draft(&draft)?;
        let duplicate_of = self.find_title(&draft.title).await?;
        let proposed_quiz_id = allocator::next_quiz_id(self.quizzes.list().await?);
        Ok(Preview {
            quiz: draft,
            issues,
            proposed_quiz_id,
            duplicate_of,
        })
    }

    pub async fn get_quiz(&self, id: u32) -> Result<QuizDefinition, ServiceError> {
        Ok(self.quizzes.get(id).await?.cleared())
    }

    pub async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, ServiceError> {
        let mut summaries = Vec::new();
        for id in self.quizzes.list().await? {
            match self.quizzes.get(id).await {
                Ok(quiz) => summaries.push(QuizSummary::from(&quiz)),
                Err(StoreError::NotFound(_)) => {}
                Err(StoreError::Corrupt { location, source }) => {
                    warn!("skipping unreadable quiz {}: {}", location, source);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(summaries)
    }

    pub async fn delete_quiz(&self, id: u32) -> Result<(), ServiceError> {
        self.quizzes.delete(id).await?;
        info!("quiz deleted: id {}", id);
        Ok(())
    }

    /// Grades `submitted` against the stored definition and appends the attempt
    /// to `subject`'s history. Only the selections are taken from the
    /// submission; the answer key always comes from the store.
    pub async fn record_attempt(
        &self,
        subject: &str,
        submitted: &QuizDefinition,
        duration: u64,
    ) -> Result<Attempt, ServiceError> {
        let mut quiz = self.quizzes.get(submitted.id).await?.cleared();
        if quiz.questions.len() != submitted.questions.len() {
            return Err(ServiceError::Invalid(vec![ValidationIssue::new(
                "questions",
                format!(
                    "Quiz {} has {} questions but {} were submitted",
                    quiz.id,
                    quiz.questions.len(),
                    submitted.questions.len()
                ),
            )]));
        }
        for (question, answered) in quiz.questions.iter_mut().zip(&submitted.questions) {
            question.selection = answered.selection.clone();
        }

        let unanswered = unanswered_questions(&quiz);
        if !unanswered.is_empty() {
            return Err(ServiceError::Invalid(unanswered));
        }

        let attempt = score_attempt(&quiz, duration, Utc::now());
        self.history.append(subject, attempt.clone()).await?;
        info!(
            "attempt recorded for {}: quiz {} scored {}/{}",
            subject, attempt.quiz_id, attempt.score, attempt.total_questions
        );
        Ok(attempt)
    }

    pub async fn attempt_history(&self, subject: &str) -> Result<Vec<Attempt>, ServiceError> {
        Ok(self.history.list(subject).await?)
    }
}
